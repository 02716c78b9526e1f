//! HTTP and WebSocket handlers.

pub mod file_handlers;
pub mod health_handlers;
pub mod relay_handlers;
pub mod video_handlers;
