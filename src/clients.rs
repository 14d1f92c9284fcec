//! Connected-client registry and broadcast fan-out.
//!
//! Each WebSocket connection registers an unbounded sender; the engine
//! pushes [`ServerMessage`]s through here. A failed delivery only evicts
//! the one dead subscriber, it never aborts delivery to the rest and never
//! surfaces to the engine.

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::ServerMessage;

pub type ClientId = String;

#[derive(Default)]
pub struct Clients {
    inner: RwLock<HashMap<ClientId, mpsc::UnboundedSender<ServerMessage>>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, returning its connection id.
    pub async fn register(&self, sender: mpsc::UnboundedSender<ServerMessage>) -> ClientId {
        let id = ulid::Ulid::new().to_string();
        self.inner.write().await.insert(id.clone(), sender);
        tracing::info!(client = %id, "client connected");
        id
    }

    /// Idempotent removal, also used when a send fails.
    pub async fn unregister(&self, id: &str) {
        if self.inner.write().await.remove(id).is_some() {
            tracing::info!(client = %id, "client disconnected");
        }
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Deliver to one subscriber. Evicts it on failure.
    pub async fn send_to(&self, id: &str, msg: ServerMessage) {
        let mut clients = self.inner.write().await;
        if let Some(sender) = clients.get(id) {
            if sender.send(msg).is_err() {
                tracing::warn!(client = %id, "dropping client with closed channel");
                clients.remove(id);
            }
        }
    }

    /// Deliver to every subscriber, evicting the ones that fail.
    pub async fn broadcast(&self, msg: ServerMessage) {
        let mut clients = self.inner.write().await;
        clients.retain(|id, sender| {
            if sender.send(msg.clone()).is_err() {
                tracing::warn!(client = %id, "dropping client with closed channel");
                false
            } else {
                true
            }
        });
    }
}
