//! HTTP handlers for uploading, listing, fetching and deleting stored files.
//! File bodies are streamed to and from disk; storage concerns live in
//! `StorageService`.

use crate::{
    errors::AppError,
    models::{
        file::FileEntry,
        upload::{DeleteResponse, UploadRequest, UploadResponse},
    },
    services::storage_service::{MAX_FILENAME_LEN, StorageService, decode_payload},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Name of the multipart field carrying the uploaded file.
const MULTIPART_FIELD: &str = "file";

/// POST `/api/upload` — store a base64 payload under a client-chosen name.
pub async fn upload_file(
    State(service): State<StorageService>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let Json(req) = payload.map_err(json_rejection)?;

    let (Some(filename), Some(data)) = (
        req.filename.filter(|f| !f.is_empty()),
        req.data.filter(|d| !d.is_empty()),
    ) else {
        return Err(AppError::bad_request("filename and data are required"));
    };

    service.resolve(&filename)?;
    let bytes = decode_payload(&data)?;
    let size = service.write_bytes(&filename, Bytes::from(bytes)).await?;
    info!("upload stored {} ({} bytes)", filename, size);

    Ok(Json(UploadResponse {
        success: true,
        message: format!("file {} uploaded", filename),
        filename,
    }))
}

/// POST `/api/upload/multipart` — store the `file` part as `<millis>-<original name>`.
pub async fn upload_multipart(
    State(service): State<StorageService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some(MULTIPART_FIELD) {
            continue;
        }

        let original = field
            .file_name()
            .and_then(original_file_name)
            .ok_or_else(|| AppError::bad_request("file part is missing a filename"))?;
        let prefix = format!("{}-", Utc::now().timestamp_millis());
        let filename = format!(
            "{}{}",
            prefix,
            fit_name(&original, MAX_FILENAME_LEN - prefix.len())
        );

        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        let size = service.write_stream(&filename, stream).await?;
        info!("multipart upload stored {} ({} bytes)", filename, size);

        return Ok(Json(UploadResponse {
            success: true,
            message: format!("file {} uploaded", filename),
            filename,
        }));
    }

    Err(AppError::bad_request(format!(
        "multipart field `{}` is required",
        MULTIPART_FIELD
    )))
}

/// GET `/api/files` — list stored files with their static URLs.
pub async fn list_files(
    State(service): State<StorageService>,
) -> Result<Json<Vec<FileEntry>>, AppError> {
    Ok(Json(service.list_files().await?))
}

/// GET `/api/file/{filename}` — stream one stored file.
pub async fn get_file(
    State(service): State<StorageService>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let stored = service.open_file(&filename).await?;
    let content_type = mime_guess::from_path(&stored.name).first_or_octet_stream();
    debug!("serving {} ({} bytes)", stored.path.display(), stored.size);

    let mut response = Response::new(Body::from_stream(ReaderStream::new(stored.file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.essence_str())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stored.size));

    Ok(response)
}

/// DELETE `/api/file/{filename}`
pub async fn delete_file(
    State(service): State<StorageService>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    service.delete_file(&filename).await?;
    info!("deleted {}", filename);

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("file {} deleted", filename),
    }))
}

/// Malformed JSON is a 400; other rejections (body too large, wrong
/// content type) keep their own status.
fn json_rejection(err: JsonRejection) -> AppError {
    match err {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            AppError::bad_request(err.body_text())
        }
        other => AppError::new(other.status(), other.body_text()),
    }
}

/// Shorten `name` to at most `max_len` bytes, keeping its extension.
fn fit_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 1 < max_len => (stem, ext),
        _ => (name, ""),
    };
    let budget = if ext.is_empty() {
        max_len
    } else {
        max_len - ext.len() - 1
    };
    let mut cut = budget.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    if ext.is_empty() {
        stem[..cut].to_string()
    } else {
        format!("{}.{}", &stem[..cut], ext)
    }
}

/// Final path component of a browser-supplied file name, or None if nothing
/// usable remains.
fn original_file_name(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    match name.as_str() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}
