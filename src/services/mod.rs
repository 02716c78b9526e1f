//! Core services: on-disk file storage and the live relay registry.

pub mod relay_service;
pub mod storage_service;
