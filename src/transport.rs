//! Outbound side of every connection
//!
//! The session core only needs to push a message at a connection id. Each
//! WebSocket registers an unbounded channel here on connect; the socket task
//! drains it. Pushing never blocks, so it is safe while a session lock is held.

use crate::protocol::ServerMessage;
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

/// A connected client's sender channel
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

pub trait Transport: Send + Sync {
    /// Push a message to one connection. Returns false if it is gone.
    fn send(&self, to: &str, message: ServerMessage) -> bool;

    /// Push a message to each recipient except `exclude`
    fn broadcast(
        &self,
        recipients: &[ConnectionId],
        message: &ServerMessage,
        exclude: Option<&str>,
    ) {
        for id in recipients {
            if exclude.is_some_and(|ex| ex == id) {
                continue;
            }
            self.send(id, message.clone());
        }
    }
}

/// Registry of live connections
#[derive(Debug, Default)]
pub struct ConnectionHub {
    senders: RwLock<HashMap<ConnectionId, ClientSender>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, ClientSender>> {
        match self.senders.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, ClientSender>> {
        match self.senders.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Allocate a channel for a new connection and return its receiving end
    pub fn register(&self, id: &str) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.write().insert(id.to_string(), tx);
        tracing::debug!(connection = id, "Connection registered");
        rx
    }

    pub fn unregister(&self, id: &str) {
        self.write().remove(id);
        tracing::debug!(connection = id, "Connection unregistered");
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for ConnectionHub {
    fn send(&self, to: &str, message: ServerMessage) -> bool {
        match self.read().get(to) {
            Some(sender) => sender.send(message).is_ok(),
            None => {
                tracing::debug!(connection = to, "Dropping message for unknown connection");
                false
            }
        }
    }
}
