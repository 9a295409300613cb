use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::sleep;

use crate::errors::TaskError;

type Tally = HashMap<String, HashMap<String, u64>>;

/// Per-symbol directional tally of whale trades. Cloneable handle; every
/// watcher records into the same tally and a periodic loop drains it into a
/// digest line. Increments and the drain are each one critical section with
/// no await points, so counts never double-emit or tear.
#[derive(Clone, Default)]
pub struct SignalAggregator {
    tally: Arc<Mutex<Tally>>,
}

impl SignalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one whale trade. Unknown directions get their own bucket;
    /// fresh symbols pre-seed long/short at zero so digests always show both.
    pub fn record_whale_trade(&self, symbol: &str, size_usd: Decimal, direction: &str) {
        let mut tally = self.lock_tally();
        let by_direction = tally.entry(symbol.to_string()).or_insert_with(|| {
            HashMap::from([("long".to_string(), 0), ("short".to_string(), 0)])
        });
        *by_direction.entry(direction.to_string()).or_insert(0) += 1;

        tracing::debug!(symbol, size = %size_usd, direction, "Whale trade tallied");
    }

    /// Format the digest and clear the tally in the same critical section.
    /// Returns None when nothing was recorded since the last drain.
    pub fn drain_summary(&self) -> Option<String> {
        let mut tally = self.lock_tally();
        if tally.is_empty() {
            return None;
        }

        let mut symbols: Vec<&String> = tally.keys().collect();
        symbols.sort();

        let mut parts = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let by_direction = &tally[symbol];
            let mut directions: Vec<&String> = by_direction.keys().collect();
            directions.sort();

            let counts = directions
                .iter()
                .map(|d| format!("{d} x{}", by_direction[*d]))
                .collect::<Vec<_>>()
                .join(" ");
            parts.push(format!("{symbol} {counts}"));
        }

        tally.clear();
        Some(parts.join(" | "))
    }

    /// Periodic digest loop. Never fails; an empty period is simply skipped.
    pub async fn run_summary_loop(&self, period: Duration) -> Result<(), TaskError> {
        tracing::info!(period_secs = period.as_secs(), "Signal summary loop started");
        loop {
            sleep(period).await;
            if let Some(summary) = self.drain_summary() {
                tracing::info!(summary = %summary, "Whale trade summary");
            }
        }
    }

    fn lock_tally(&self) -> std::sync::MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
