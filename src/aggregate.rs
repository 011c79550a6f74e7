//! Mean-price aggregation.
//!
//! Reduces one [`DepthSnapshot`] to a single scalar: the unweighted mean of
//! every parseable price across bids and asks combined. Not a midpoint and
//! not volume-weighted; both sides pool into one running sum.

use crate::depth::DepthSnapshot;

/// Compute the mean price across all levels of both sides.
///
/// Rows whose price does not parse as a decimal number are skipped.
/// Returns `0.0` when no row parses at all; callers must treat an exact
/// zero as "no valid data", not as a market price.
pub fn mean_price(snapshot: &DepthSnapshot) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u64;

    for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
        let Some(raw) = level.first() else {
            tracing::warn!("skipping empty depth level");
            continue;
        };
        match raw.parse::<f64>() {
            Ok(price) => {
                sum += price;
                count += 1;
            }
            Err(e) => {
                tracing::warn!(price = %raw, "skipping unparsable price: {}", e);
            }
        }
    }

    if count == 0 {
        tracing::warn!("no parseable bids or asks in snapshot");
        return 0.0;
    }

    sum / count as f64
}
