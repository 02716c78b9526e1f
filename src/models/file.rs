//! Represents a stored file as seen by clients.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Route prefix under which stored files are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Bytes that must be escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One entry of the file listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, which is also its key on disk.
    pub name: String,

    /// URL the file can be fetched from, with the name percent-encoded.
    pub url: String,
}

impl FileEntry {
    pub fn new(name: String) -> Self {
        let url = format!(
            "{}/{}",
            UPLOADS_ROUTE,
            utf8_percent_encode(&name, PATH_SEGMENT)
        );
        Self { name, url }
    }
}
