//! RelayHub — registry of live WebSocket clients.
//!
//! Each client registers an outbound channel. A broadcast enumerates the
//! registry minus the sender and pushes the frame to each channel; there is
//! no acknowledgment and nothing is buffered for clients that connect later.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

pub type ClientId = Uuid;

#[derive(Clone, Default)]
pub struct RelayHub {
    clients: Arc<RwLock<HashMap<ClientId, mpsc::UnboundedSender<String>>>>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and return its id plus the receiving half of
    /// its outbound channel.
    pub async fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().await.insert(id, tx);
        debug!("relay client {} registered", id);
        (id, rx)
    }

    pub async fn unregister(&self, id: ClientId) {
        if self.clients.write().await.remove(&id).is_some() {
            debug!("relay client {} unregistered", id);
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Send `frame` to every registered client except `from`.
    ///
    /// Clients whose channel is closed are dropped from the registry.
    /// Returns how many clients the frame was handed to.
    pub async fn broadcast(&self, from: ClientId, frame: &str) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();
        {
            let clients = self.clients.read().await;
            for (id, tx) in clients.iter() {
                if *id == from {
                    continue;
                }
                match tx.send(frame.to_string()) {
                    Ok(()) => delivered += 1,
                    Err(_) => stale.push(*id),
                }
            }
        }

        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for id in stale {
                clients.remove(&id);
                debug!("relay client {} dropped (channel closed)", id);
            }
        }

        delivered
    }
}
