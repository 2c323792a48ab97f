// 4.0 oracle.rs: time-weighted price reads per asset pair. observations are pushed
// in by the registry owner (mocked feed); the vault manager reads TWAPs at expiry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{AssetId, Price, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No price available for {base}/{quote} at or before {at}")]
    NoPriceAvailable { base: AssetId, quote: AssetId, at: Timestamp },

    #[error("Observation at {got} is older than the latest at {latest}")]
    OutOfOrder { latest: Timestamp, got: Timestamp },

    #[error("Base and quote asset are identical: {0}")]
    SamePair(AssetId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: Timestamp,
    pub price: Price,
}

#[derive(Debug, Clone)]
pub struct TwapOracle {
    history: HashMap<(AssetId, AssetId), VecDeque<Observation>>,
    max_history: usize,
}

impl Default for TwapOracle {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TwapOracle {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: HashMap::new(),
            max_history,
        }
    }

    pub fn record(
        &mut self,
        base: AssetId,
        quote: AssetId,
        timestamp: Timestamp,
        price: Price,
    ) -> Result<(), OracleError> {
        if base == quote {
            return Err(OracleError::SamePair(base));
        }
        let samples = self.history.entry((base, quote)).or_default();
        if let Some(latest) = samples.back() {
            if timestamp < latest.timestamp {
                return Err(OracleError::OutOfOrder {
                    latest: latest.timestamp,
                    got: timestamp,
                });
            }
        }
        samples.push_back(Observation { timestamp, price });
        while samples.len() > self.max_history {
            samples.pop_front();
        }
        Ok(())
    }

    pub fn latest(&self, base: AssetId, quote: AssetId) -> Option<Observation> {
        self.history.get(&(base, quote)).and_then(|s| s.back().copied())
    }

    /// Time-weighted average price of `base` in `quote` over `[end - window, end]`.
    /// Falls back to the inverted reverse pair when only that one is observed.
    pub fn twap(
        &self,
        base: AssetId,
        quote: AssetId,
        end: Timestamp,
        window_secs: u64,
    ) -> Result<Price, OracleError> {
        if let Some(samples) = self.history.get(&(base, quote)) {
            if let Some(price) = time_weighted(samples, end, window_secs) {
                return Ok(price);
            }
        }
        if let Some(samples) = self.history.get(&(quote, base)) {
            if let Some(inverse) = time_weighted(samples, end, window_secs) {
                if let Some(price) = Decimal::ONE.checked_div(inverse.value()).and_then(Price::new) {
                    return Ok(price);
                }
            }
        }
        Err(OracleError::NoPriceAvailable { base, quote, at: end })
    }
}

fn time_weighted(samples: &VecDeque<Observation>, end: Timestamp, window_secs: u64) -> Option<Price> {
    let relevant: Vec<&Observation> = samples.iter().filter(|o| o.timestamp <= end).collect();
    let last = relevant.last()?;
    if window_secs == 0 {
        return Some(last.price);
    }

    let start = end.as_secs().saturating_sub(window_secs);
    // the observation standing at the start of the window, or the first one inside it
    let first_idx = relevant
        .iter()
        .rposition(|o| o.timestamp.as_secs() <= start)
        .unwrap_or(0);

    let mut weighted_sum = Decimal::ZERO;
    let mut total_time = Decimal::ZERO;

    for i in first_idx..relevant.len() {
        let seg_start = relevant[i].timestamp.as_secs().max(start);
        let seg_end = match relevant.get(i + 1) {
            Some(next) => next.timestamp.as_secs(),
            None => end.as_secs(),
        };
        let duration = Decimal::from(seg_end.saturating_sub(seg_start));
        weighted_sum += relevant[i].price.value() * duration;
        total_time += duration;
    }

    if total_time > Decimal::ZERO {
        Price::new(weighted_sum / total_time)
    } else {
        Some(last.price)
    }
}
