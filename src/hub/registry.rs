//! The authoritative set of connected subscriber handles.
//!
//! The registry is plain data: every mutation and every read goes through
//! the single mutex owned by [`Hub`](super::Hub). Handles hold the sending
//! half of the client's outbound channel; the receiving half lives with the
//! connection task, so dropping a handle is what ends that client's
//! forwarding task and, with it, the connection.

use std::collections::HashMap;
use tokio::sync::mpsc;

/// Unique subscriber identifier, allocated at registration. Never reused.
pub type ClientId = u64;

/// Outbound path to one subscriber.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        ClientHandle { tx }
    }

    /// Queue one frame for delivery. Fails only when the connection side
    /// has gone away.
    pub fn deliver(&self, payload: String) -> Result<(), ()> {
        self.tx.send(payload).map_err(|_| ())
    }
}

/// Id-keyed handle set. Membership is the only state.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientHandle>,
    next_id: ClientId,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry {
            clients: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new handle and return its id.
    pub fn register(&mut self, handle: ClientHandle) -> ClientId {
        let id = self.next_id;
        self.next_id += 1;
        self.clients.insert(id, handle);
        id
    }

    /// Remove a handle. Idempotent: removing an absent id is a no-op.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterate current members. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &ClientHandle)> {
        self.clients.iter().map(|(id, handle)| (*id, handle))
    }
}
