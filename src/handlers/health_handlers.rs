//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks disk I/O in the storage directory

use crate::services::storage_service::{StorageService, TEMP_PREFIX};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe; never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Writes, reads back and removes a probe file under the storage directory.
/// HTTP 200 when the round trip succeeds, HTTP 503 otherwise.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let probe = service
        .base_path
        .join(format!("{}readyz-{}", TEMP_PREFIX, Uuid::new_v4()));
    let disk_check = match fs::write(&probe, b"readyz").await {
        Ok(_) => match fs::read(&probe).await {
            Ok(bytes) => {
                let _ = fs::remove_file(&probe).await;
                if bytes == b"readyz" {
                    CheckStatus::ok()
                } else {
                    CheckStatus::failed("file content mismatch")
                }
            }
            Err(e) => {
                let _ = fs::remove_file(&probe).await;
                tracing::warn!("readyz could not read probe file: {}", e);
                CheckStatus::failed("could not read probe file")
            }
        },
        Err(e) => {
            tracing::warn!("readyz could not write probe file: {}", e);
            CheckStatus::failed("could not write probe file")
        }
    };

    let ok = disk_check.ok;
    let mut checks = HashMap::new();
    checks.insert("disk", disk_check);

    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        checks,
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(msg: &str) -> Self {
        Self {
            ok: false,
            error: Some(msg.to_string()),
        }
    }
}
