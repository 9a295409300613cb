pub mod chain_watcher;
pub mod decoder;
pub mod poll_watcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::TradeEvent;

/// Raw log entry as delivered by the chain subscription: event topics, the
/// hex-encoded data blob, and the transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub topics: Vec<String>,
    pub data: String,
    pub tx_hash: String,
}

/// Per-trade capability injected into the stream watcher. The tracked-wallet
/// alert path implements this; the watcher itself stays wallet-agnostic.
#[async_trait]
pub trait TradeHook: Send + Sync {
    async fn on_trade(&self, event: &TradeEvent);
}
