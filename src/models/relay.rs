//! Frames exchanged on the relay socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event a client emits to share a photo.
pub const SEND_PHOTO: &str = "send-photo";

/// Event the server pushes to every other client.
pub const RECEIVE_PHOTO: &str = "receive-photo";

/// A named event with an arbitrary JSON payload, carried as a text frame.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelayEvent {
    pub event: String,

    #[serde(default)]
    pub data: Value,
}

impl RelayEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}
