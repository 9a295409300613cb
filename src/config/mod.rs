use std::env;
use std::time::Duration;

const DEFAULT_HYPERLIQUID_URL: &str = "https://api.hyperliquid.xyz/info";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,

    // Chain subscription (optional — watcher is disabled when unset)
    pub alchemy_ws_url: Option<String>,
    pub gmx_vault_address: Option<String>,

    // Telegram alert sink (optional)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Polled exchange source
    pub hyperliquid_api_url: String,
    pub hyperliquid_coin: String,
    pub hyperliquid_poll_secs: u64,

    // Signal digest cadence
    pub summary_interval_secs: u64,

    // Prometheus scrape listener (optional)
    pub metrics_addr: Option<String>,

    // Supervisor backoff tuning
    pub retry_base_secs: u64,
    pub retry_max_secs: u64,
    pub retry_reset_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,

            alchemy_ws_url: env::var("ALCHEMY_WS_URL").ok().filter(|s| !s.is_empty()),
            gmx_vault_address: env::var("GMX_VAULT_ADDRESS")
                .ok()
                .filter(|s| !s.is_empty()),

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID")
                .ok()
                .filter(|s| !s.is_empty()),

            hyperliquid_api_url: env::var("HYPERLIQUID_API_URL")
                .unwrap_or_else(|_| DEFAULT_HYPERLIQUID_URL.into()),
            hyperliquid_coin: env::var("HYPERLIQUID_COIN").unwrap_or_else(|_| "BTC".into()),
            hyperliquid_poll_secs: parse_env_u64("HYPERLIQUID_POLL_SECS", 30),

            summary_interval_secs: parse_env_u64("SUMMARY_INTERVAL_SECS", 60),

            metrics_addr: env::var("METRICS_ADDR").ok().filter(|s| !s.is_empty()),

            retry_base_secs: parse_env_u64("RETRY_BASE_SECS", 1),
            retry_max_secs: parse_env_u64("RETRY_MAX_SECS", 60),
            retry_reset_secs: parse_env_u64("RETRY_RESET_SECS", 300),
        })
    }

    /// Returns true if both Telegram credentials are configured.
    pub fn has_telegram(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    pub fn hyperliquid_poll_interval(&self) -> Duration {
        Duration::from_secs(self.hyperliquid_poll_secs)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
