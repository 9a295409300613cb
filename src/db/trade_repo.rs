use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{TradeEvent, WalletTrade};

/// Insert a decoded trade. Duplicate transaction hashes are silently
/// ignored — the unique constraint on tx_hash makes re-delivered logs a
/// no-op rather than an error.
pub async fn insert_trade(pool: &PgPool, event: &TradeEvent) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_trades
            (wallet_address, protocol, action, symbol, size_usd, leverage, direction, tx_hash, traded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        ON CONFLICT (tx_hash) DO NOTHING
        "#,
    )
    .bind(&event.wallet)
    .bind(&event.protocol)
    .bind(event.action.as_str())
    .bind(&event.symbol)
    .bind(event.size_usd)
    .bind(event.leverage)
    .bind(event.direction.as_str())
    .bind(&event.tx_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find the most recent unresolved open position for a wallet. This is the
/// record the next close event for that wallet resolves.
pub async fn latest_unresolved_open(
    pool: &PgPool,
    wallet: &str,
) -> anyhow::Result<Option<WalletTrade>> {
    let trade = sqlx::query_as::<_, WalletTrade>(
        r#"
        SELECT * FROM wallet_trades
        WHERE wallet_address = $1 AND action = 'open'
        ORDER BY traded_at DESC
        LIMIT 1
        "#,
    )
    .bind(wallet)
    .fetch_optional(pool)
    .await?;

    Ok(trade)
}

/// Attach realized pnl to an open record and flip it to closed.
pub async fn resolve_trade(
    pool: &PgPool,
    trade_id: Uuid,
    pnl: rust_decimal::Decimal,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE wallet_trades SET pnl = $2, action = 'close' WHERE id = $1")
        .bind(trade_id)
        .bind(pnl)
        .execute(pool)
        .await?;

    Ok(())
}
