use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the wallet_trades table. A row is created on every
/// decoded position open; a close resolves the most recent open for the
/// wallet by attaching pnl and flipping action to 'close'.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTrade {
    pub id: Uuid,
    pub wallet_address: String,
    pub protocol: String,
    pub action: String,
    pub symbol: String,
    pub size_usd: Decimal,
    pub leverage: Decimal,
    pub direction: String,
    pub pnl: Option<Decimal>,
    pub tx_hash: String,
    pub traded_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}
