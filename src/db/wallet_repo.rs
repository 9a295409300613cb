use sqlx::PgPool;

use crate::models::TrackedWallet;

/// Fetch every wallet with tracking enabled. Loaded into the in-memory
/// registry at watcher start; edits made afterwards need a restart.
pub async fn get_tracked_wallets(pool: &PgPool) -> anyhow::Result<Vec<TrackedWallet>> {
    let wallets = sqlx::query_as::<_, TrackedWallet>(
        r#"
        SELECT address, label, category, min_trade_size,
               alert_direction, alert_interval_secs, tracking_enabled, last_activity
        FROM tracked_wallets
        WHERE tracking_enabled = true
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(wallets)
}

/// Update the last_activity timestamp for a tracked wallet.
pub async fn touch_last_activity(pool: &PgPool, address: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE tracked_wallets SET last_activity = NOW() WHERE address = $1")
        .bind(address.to_lowercase())
        .execute(pool)
        .await?;

    Ok(())
}
