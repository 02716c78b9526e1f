//! GET `/api/video` — serve the first stored video, whole or as a single
//! byte range so players can seek.

use crate::{
    errors::AppError,
    services::storage_service::{StorageError, StorageService},
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

pub async fn stream_video(
    State(service): State<StorageService>,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    let name = service
        .find_first_video()
        .await?
        .ok_or_else(|| AppError::not_found("no video found"))?;
    let stored = service.open_file(&name).await?;
    let file_size = stored.size;
    let content_type = mime_guess::from_path(&name).first_or_octet_stream();

    let range = parse_range(request_headers.get(header::RANGE), file_size)?;

    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.essence_str())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let Some((start, end)) = range else {
        debug!("video {} served in full ({} bytes)", name, file_size);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_size));
        *response.body_mut() = Body::from_stream(ReaderStream::new(stored.file));
        *response.status_mut() = StatusCode::OK;
        return Ok(response);
    };

    let length = end - start + 1;
    debug!("video {} range {}-{} ({} bytes)", name, start, end, length);
    let content_range = HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, file_size))
        .map_err(|_| AppError::internal("failed to build Content-Range header"))?;
    headers.insert(header::CONTENT_RANGE, content_range);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    let mut file = stored.file;
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(StorageError::from)?;
    *response.body_mut() = Body::from_stream(ReaderStream::new(file.take(length)));
    *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    Ok(response)
}

/// Parse a single `bytes=` range against a file of `file_size` bytes.
///
/// Returns the inclusive `(start, end)` span, or None when there is no
/// header. `end` past the file is clamped; `bytes=-N` selects the last N bytes.
pub fn parse_range(
    value: Option<&HeaderValue>,
    file_size: u64,
) -> Result<Option<(u64, u64)>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = || AppError::bad_request("invalid Range header");

    let value = value.to_str().map_err(|_| invalid())?;
    let range = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    if range.contains(',') {
        return Err(AppError::bad_request("multiple ranges not supported"));
    }
    let (start_part, end_part) = range.split_once('-').ok_or_else(invalid)?;
    let (start_part, end_part) = (start_part.trim(), end_part.trim());

    if file_size == 0 {
        return Err(AppError::range_not_satisfiable(file_size));
    }
    let last = file_size - 1;

    let (start, end) = if start_part.is_empty() {
        let suffix: u64 = end_part.parse().map_err(|_| invalid())?;
        if suffix == 0 {
            return Err(AppError::range_not_satisfiable(file_size));
        }
        (file_size.saturating_sub(suffix), last)
    } else {
        let start: u64 = start_part.parse().map_err(|_| invalid())?;
        let end: u64 = if end_part.is_empty() {
            last
        } else {
            end_part.parse().map_err(|_| invalid())?
        };
        (start, end.min(last))
    };

    if start > end || start >= file_size {
        return Err(AppError::range_not_satisfiable(file_size));
    }
    Ok(Some((start, end)))
}
