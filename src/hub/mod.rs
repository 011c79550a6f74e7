//! The broadcast hub: registry ownership, value hand-off, fan-out workers.
//!
//! Three operations feed the hub: a client joined, a client left, a value to
//! broadcast. Join and leave mutate membership directly under the registry
//! mutex. Values queue on a bounded channel drained by a fixed pool of
//! workers; each worker performs one whole fan-out round (iterate the
//! registry, push the frame to every handle) inside the same mutex, so
//! membership can never change mid-round. Distinct values may be in flight
//! on distinct workers at once; rounds serialize only against each other
//! and against membership changes.

mod registry;

pub use registry::{ClientHandle, ClientId, ClientRegistry};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Coordination core for the subscriber set.
pub struct Hub {
    registry: Mutex<ClientRegistry>,
    metric_tx: mpsc::Sender<f64>,
}

impl Hub {
    /// Create a hub and the receiving half of its metric channel. Pass the
    /// receiver to [`spawn_workers`].
    pub fn new(metric_capacity: usize) -> (Arc<Self>, mpsc::Receiver<f64>) {
        let (metric_tx, metric_rx) = mpsc::channel(metric_capacity.max(1));
        let hub = Arc::new(Hub {
            registry: Mutex::new(ClientRegistry::new()),
            metric_tx,
        });
        (hub, metric_rx)
    }

    /// Register a subscriber's outbound channel. Cannot fail.
    pub fn join(&self, tx: mpsc::UnboundedSender<String>) -> ClientId {
        let id = self.registry.lock().register(ClientHandle::new(tx));
        tracing::info!(client = id, "client joined");
        id
    }

    /// Drop a subscriber from the registry. Idempotent.
    pub fn leave(&self, id: ClientId) {
        if self.registry.lock().remove(id) {
            tracing::info!(client = id, "client left");
        }
    }

    /// Queue one metric for fan-out. Blocks when the hand-off channel is
    /// full; errors only if every worker is gone, which has no recovery.
    pub async fn broadcast(&self, metric: f64) -> Result<(), BroadcastClosed> {
        self.metric_tx.send(metric).await.map_err(|_| BroadcastClosed)
    }

    /// One fan-out round: deliver `metric` to every currently registered
    /// handle. A failed delivery prunes that handle inside the same
    /// critical section and never stops the round for the rest.
    pub fn fan_out(&self, metric: f64) {
        let payload = match serde_json::to_string(&metric) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("unencodable metric {}: {}", metric, e);
                return;
            }
        };

        let mut registry = self.registry.lock();
        let mut dead = Vec::new();
        for (id, handle) in registry.iter() {
            if handle.deliver(payload.clone()).is_err() {
                tracing::warn!(client = id, "delivery failed, pruning client");
                dead.push(id);
            }
        }
        for id in dead {
            registry.remove(id);
        }
    }

    /// Number of currently registered subscribers.
    pub fn client_count(&self) -> usize {
        self.registry.lock().len()
    }
}

/// All fan-out workers have stopped; broadcast can no longer make progress.
#[derive(Debug, thiserror::Error)]
#[error("metric channel closed")]
pub struct BroadcastClosed;

/// Start `count` fan-out workers draining `metric_rx`. Workers share the
/// receiver behind an async mutex: the lock is held only while awaiting the
/// next value, so one worker can run a round while another dequeues.
pub fn spawn_workers(hub: Arc<Hub>, metric_rx: mpsc::Receiver<f64>, count: usize) {
    let metric_rx = Arc::new(tokio::sync::Mutex::new(metric_rx));

    for worker in 0..count.max(1) {
        let hub = Arc::clone(&hub);
        let metric_rx = Arc::clone(&metric_rx);

        tokio::spawn(async move {
            loop {
                let metric = { metric_rx.lock().await.recv().await };
                match metric {
                    Some(metric) => hub.fan_out(metric),
                    None => break,
                }
            }
            tracing::debug!(worker, "fan-out worker stopped");
        });
    }
}
