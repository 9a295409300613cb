use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the tracked_wallets table. Addresses are stored
/// lowercase-normalized; the address column carries a unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackedWallet {
    pub address: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub min_trade_size: Decimal,
    pub alert_direction: Option<String>,
    pub alert_interval_secs: Option<i64>,
    pub tracking_enabled: bool,
    pub last_activity: Option<DateTime<Utc>>,
}
