use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub public_dir: String,
    pub max_body_mb: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo/video upload and relay service")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_RELAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are stored (overrides PHOTO_RELAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory with the static web client (overrides PHOTO_RELAY_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<String>,

    /// Maximum request body size in MiB (overrides PHOTO_RELAY_MAX_BODY_MB)
    #[arg(long)]
    pub max_body_mb: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        let env_host = env::var("PHOTO_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("PHOTO_RELAY_PORT", 3000u16)?;
        let env_storage =
            env::var("PHOTO_RELAY_STORAGE_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_public = env::var("PHOTO_RELAY_PUBLIC_DIR").unwrap_or_else(|_| "./public".into());
        let env_body = parse_env("PHOTO_RELAY_MAX_BODY_MB", 50usize)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            public_dir: args.public_dir.unwrap_or(env_public),
            max_body_mb: args.max_body_mb.unwrap_or(env_body),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
