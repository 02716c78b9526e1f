//! Request and response bodies for the upload and delete endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/upload`.
///
/// Both fields are optional at the serde level so that a missing field is
/// reported as a 400 by the handler instead of a deserialization rejection.
#[derive(Deserialize, Debug, Default)]
pub struct UploadRequest {
    pub filename: Option<String>,

    /// Base64 payload, optionally prefixed with `data:<mime>;base64,`.
    pub data: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}
