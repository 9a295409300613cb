use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db::wallet_repo;
use crate::ingestion::TradeHook;
use crate::models::{Direction, TrackedWallet, TradeEvent};
use crate::services::notifier::AlertSink;

// ---------------------------------------------------------------------------
// Alert policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDirection {
    Long,
    Short,
    Both,
}

impl AlertDirection {
    fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("long") => AlertDirection::Long,
            Some("short") => AlertDirection::Short,
            _ => AlertDirection::Both,
        }
    }

    fn matches(&self, direction: Direction) -> bool {
        match self {
            AlertDirection::Both => true,
            AlertDirection::Long => direction == Direction::Long,
            AlertDirection::Short => direction == Direction::Short,
        }
    }
}

/// Per-wallet alert preferences, loaded from tracked_wallets at startup.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub label: String,
    pub min_trade_size: Decimal,
    pub direction: AlertDirection,
    pub cooldown: Duration,
}

impl From<&TrackedWallet> for AlertPolicy {
    fn from(w: &TrackedWallet) -> Self {
        Self {
            label: w.label.clone().unwrap_or_else(|| "Unknown".into()),
            min_trade_size: w.min_trade_size,
            direction: AlertDirection::from_db(w.alert_direction.as_deref()),
            cooldown: Duration::from_secs(w.alert_interval_secs.unwrap_or(0).max(0) as u64),
        }
    }
}

// ---------------------------------------------------------------------------
// Throttled per-wallet alert filter
// ---------------------------------------------------------------------------

/// Direction and cooldown gating for tracked-wallet alerts. Cooldown state
/// is process-local on purpose: a restart clears every cooldown instead of
/// risking a wallet stuck in "sent".
pub struct WalletAlertFilter {
    policies: HashMap<String, AlertPolicy>,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl WalletAlertFilter {
    pub fn new(wallets: &[TrackedWallet]) -> Self {
        let policies = wallets
            .iter()
            .map(|w| (w.address.to_lowercase(), AlertPolicy::from(w)))
            .collect();
        Self {
            policies,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Registry membership lookup; addresses compare lowercase.
    pub fn policy(&self, wallet: &str) -> Option<&AlertPolicy> {
        self.policies.get(&wallet.to_lowercase())
    }

    /// Decide whether to alert for a trade. Applies the direction preference,
    /// then the cooldown window, then formats the message and records the
    /// send time. Minimum-size gating happens in the caller. No await points
    /// while the cooldown map is locked.
    pub fn evaluate(
        &self,
        wallet: &str,
        direction: Direction,
        size_usd: Decimal,
        protocol: &str,
        now: Instant,
    ) -> Option<String> {
        let key = wallet.to_lowercase();
        let policy = self.policies.get(&key)?;

        if !policy.direction.matches(direction) {
            return None;
        }

        let mut last_sent = self
            .last_sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !policy.cooldown.is_zero() {
            if let Some(last) = last_sent.get(&key) {
                if now.duration_since(*last) < policy.cooldown {
                    return None;
                }
            }
        }

        let message = format!(
            "Tracked Wallet {} {} ${} on {}",
            policy.label,
            direction,
            format_usd(size_usd),
            protocol,
        );
        last_sent.insert(key, now);
        Some(message)
    }
}

/// Whole-dollar formatting with thousands separators: 15000 -> "15,000".
fn format_usd(size: Decimal) -> String {
    let rounded = size.round();
    let digits = rounded.abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{grouped}")
    } else {
        grouped
    }
}

// ---------------------------------------------------------------------------
// Tracked-wallet hook
// ---------------------------------------------------------------------------

/// The per-trade capability plugged into the stream watcher: membership
/// check, last-activity bookkeeping, minimum-size gate, then the throttled
/// alert path.
pub struct TrackedWalletHook {
    pool: PgPool,
    sink: Option<Arc<dyn AlertSink>>,
    filter: WalletAlertFilter,
}

impl TrackedWalletHook {
    /// Load the tracked-wallet registry from the database. Called once at
    /// startup; later edits require a restart to take effect.
    pub async fn load(pool: PgPool, sink: Option<Arc<dyn AlertSink>>) -> anyhow::Result<Self> {
        let wallets = wallet_repo::get_tracked_wallets(&pool).await?;
        tracing::info!(wallet_count = wallets.len(), "Loaded tracked wallets");
        Ok(Self::with_registry(pool, sink, &wallets))
    }

    pub fn with_registry(
        pool: PgPool,
        sink: Option<Arc<dyn AlertSink>>,
        wallets: &[TrackedWallet],
    ) -> Self {
        Self {
            pool,
            sink,
            filter: WalletAlertFilter::new(wallets),
        }
    }
}

#[async_trait]
impl TradeHook for TrackedWalletHook {
    async fn on_trade(&self, event: &TradeEvent) {
        let Some(policy) = self.filter.policy(&event.wallet) else {
            return;
        };
        let min_trade_size = policy.min_trade_size;

        if let Err(e) = wallet_repo::touch_last_activity(&self.pool, &event.wallet).await {
            tracing::warn!(error = %e, wallet = %event.wallet, "Failed to touch last_activity");
        }

        if event.size_usd < min_trade_size {
            return;
        }

        let Some(message) = self.filter.evaluate(
            &event.wallet,
            event.direction,
            event.size_usd,
            &event.protocol,
            Instant::now(),
        ) else {
            return;
        };

        match &self.sink {
            Some(sink) => sink.send(&message).await,
            None => tracing::info!(alert = %message, "Alert sink not configured"),
        }
    }
}
