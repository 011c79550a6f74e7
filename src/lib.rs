//! Price Relay
//!
//! A live mean-price broadcaster: one upstream depth stream in, one number
//! out to every connected websocket subscriber.
//!
//! # Architecture
//!
//! - **depth / aggregate**: decode an upstream frame, reduce it to the
//!   unweighted mean of all bid and ask prices
//! - **hub**: the coordination core: client registry behind a single
//!   mutex, bounded metric channel, fixed fan-out worker pool
//! - **ingest**: the single upstream websocket connection feeding the hub
//! - **ws**: the axum endpoint turning each accepted subscriber into a
//!   registry entry plus a liveness read loop
//!
//! The system is entirely in-memory, best-effort, last-value-wins: no
//! history, no replay, no acknowledgments, no reconnection to the upstream.
//!
//! # Example
//!
//! ```ignore
//! use price_relay::{Relay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let relay = Relay::new(RelayConfig::default());
//!     relay.run().await.unwrap();
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod depth;
pub mod hub;
pub mod ingest;
pub mod ws;

pub use aggregate::mean_price;
pub use config::{ConfigError, RelayConfig};
pub use depth::DepthSnapshot;
pub use hub::{ClientId, ClientRegistry, Hub, spawn_workers};
pub use ingest::{IngestError, Ingester};
pub use ws::create_router;

use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// The assembled relay: configuration, hub, and the not-yet-started
/// metric channel receiver.
pub struct Relay {
    pub config: RelayConfig,
    hub: Arc<Hub>,
    metric_rx: mpsc::Receiver<f64>,
}

impl Relay {
    /// Wire up a relay from configuration. Nothing runs until [`run`].
    ///
    /// [`run`]: Relay::run
    pub fn new(config: RelayConfig) -> Self {
        let (hub, metric_rx) = Hub::new(config.metric_capacity);
        Relay {
            config,
            hub,
            metric_rx,
        }
    }

    /// The broadcast hub, for tests and embedders.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Build the subscriber router backed by this relay's hub.
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.hub))
    }

    /// Start the workers, dial the upstream, and serve subscribers.
    ///
    /// A failed upstream dial or a failed bind aborts startup. Once
    /// running, an upstream read failure only ends ingestion; the
    /// subscriber endpoint keeps serving already-connected clients.
    pub async fn run(self) -> Result<(), RelayError> {
        let Relay {
            config,
            hub,
            metric_rx,
        } = self;

        spawn_workers(Arc::clone(&hub), metric_rx, config.worker_count());

        // Dial before serving: initial upstream failure is fatal.
        let ingester = Ingester::connect(&config.upstream_url).await?;
        tokio::spawn(ingester.run(Arc::clone(&hub)));

        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.clone(),
                source,
            })?;

        tracing::info!("Relay listening on {}", addr);
        axum::serve(listener, create_router(hub)).await?;

        Ok(())
    }
}
