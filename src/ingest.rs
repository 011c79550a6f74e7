//! Upstream depth-stream ingestion.
//!
//! One connection, one loop: read a frame, decode it, reduce it to the
//! mean price, hand the value to the hub. The loop ends on the first
//! transport error or clean close and nothing restarts it; subscribers
//! simply stop receiving updates while their connections stay up.

use futures_util::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};

use crate::aggregate::mean_price;
use crate::depth::DepthSnapshot;
use crate::hub::Hub;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A live connection to the upstream depth feed.
pub struct Ingester {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl Ingester {
    /// Dial the upstream endpoint. A failure here is fatal to the caller;
    /// there is no retry.
    pub async fn connect(url: &str) -> Result<Self, IngestError> {
        tracing::info!("Connecting to upstream {}", url);
        let (stream, _) = connect_async(url).await?;
        Ok(Ingester {
            stream,
            url: url.to_string(),
        })
    }

    /// Read frames until the connection dies, broadcasting one metric per
    /// decodable frame.
    pub async fn run(mut self, hub: Arc<Hub>) {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let snapshot: DepthSnapshot = match serde_json::from_str(&text) {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            tracing::warn!("skipping undecodable upstream frame: {}", e);
                            continue;
                        }
                    };

                    let metric = mean_price(&snapshot);
                    tracing::debug!(
                        last_update_id = snapshot.last_update_id,
                        levels = snapshot.level_count(),
                        metric,
                        "depth frame aggregated"
                    );

                    if hub.broadcast(metric).await.is_err() {
                        tracing::error!("fan-out workers gone, stopping ingestion");
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Upstream {} closed the connection", self.url);
                    break;
                }
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Upstream read failed: {}", e);
                    break;
                }
            }
        }

        tracing::info!("Ingestion loop terminated; no further broadcasts will occur");
    }
}
