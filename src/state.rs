//! Shared application state handed to every handler.

use crate::services::{relay_service::RelayHub, storage_service::StorageService};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub relay: RelayHub,
}

impl AppState {
    pub fn new(storage: StorageService) -> Self {
        Self {
            storage,
            relay: RelayHub::new(),
        }
    }
}

impl FromRef<AppState> for StorageService {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}

impl FromRef<AppState> for RelayHub {
    fn from_ref(state: &AppState) -> Self {
        state.relay.clone()
    }
}
