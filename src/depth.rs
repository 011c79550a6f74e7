//! Upstream depth-frame decoding.
//!
//! One frame of the Binance partial-depth stream decodes into a
//! [`DepthSnapshot`]. Level rows arrive as `["price", "qty", ...]` string
//! arrays; only the leading price is consumed downstream, so rows are kept
//! as-is and extra elements are tolerated.

use serde::Deserialize;

/// One decoded depth update. Lives only for the frame that produced it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshot {
    #[serde(default)]
    pub last_update_id: u64,
    /// Bid levels, best first. Each row's first element is the price string.
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    /// Ask levels, best first.
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
}

impl DepthSnapshot {
    /// Total number of levels across both sides.
    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}
