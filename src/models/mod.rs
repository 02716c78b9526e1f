//! Data models for the photo relay service.
//!
//! Stored files have no metadata beyond their name; these types are the
//! JSON shapes exchanged with clients over HTTP and the relay socket.

pub mod file;
pub mod relay;
pub mod upload;
