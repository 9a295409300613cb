pub mod trade;
pub mod wallet;

pub use trade::WalletTrade;
pub use wallet::TrackedWallet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    /// Map an exchange side token onto a direction. Buy-like tokens go long,
    /// everything else goes short.
    pub fn from_side_token(side: &str) -> Self {
        match side.to_lowercase().as_str() {
            "buy" | "bid" | "b" => Direction::Long,
            _ => Direction::Short,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TradeAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Open,
    Close,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Open => "open",
            TradeAction::Close => "close",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TradeEvent — normalized pipeline message, transport-agnostic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub size_usd: Decimal,
    pub direction: Direction,
    pub leverage: Decimal,
    pub wallet: String,
    pub protocol: String,
    pub tx_hash: String,
    pub action: TradeAction,
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade: wallet={} protocol={} action={} symbol={} size={} direction={}",
            &self.wallet[..10.min(self.wallet.len())],
            self.protocol,
            self.action,
            self.symbol,
            self.size_usd,
            self.direction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_side_token() {
        assert_eq!(Direction::from_side_token("buy"), Direction::Long);
        assert_eq!(Direction::from_side_token("BUY"), Direction::Long);
        assert_eq!(Direction::from_side_token("sell"), Direction::Short);
        assert_eq!(Direction::from_side_token(""), Direction::Short);
    }

    #[test]
    fn test_action_strings() {
        assert_eq!(TradeAction::Open.as_str(), "open");
        assert_eq!(TradeAction::Close.to_string(), "close");
    }
}
