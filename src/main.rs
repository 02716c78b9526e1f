use anyhow::{Context, Result};
use std::{io::ErrorKind, path::Path};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-relay with config: {:?}", cfg);

    // --- Open storage directory (created if absent) ---
    let storage = services::storage_service::StorageService::open(&cfg.storage_dir)
        .await
        .with_context(|| format!("opening storage directory {}", cfg.storage_dir))?;
    tracing::info!("Storing uploads in {}", storage.base_path.display());

    if !Path::new(&cfg.public_dir).is_dir() {
        tracing::warn!(
            "Public directory {} does not exist; static client will 404",
            cfg.public_dir
        );
    }

    // --- Build router ---
    let app = routes::routes::app(
        state::AppState::new(storage),
        &cfg.public_dir,
        cfg.max_body_bytes(),
    );

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C so in-flight requests can finish.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
