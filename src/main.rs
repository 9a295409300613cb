use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use whalebot::config::AppConfig;
use whalebot::db;
use whalebot::errors::TaskError;
use whalebot::ingestion::chain_watcher::ChainWatcher;
use whalebot::ingestion::poll_watcher::{HyperliquidClient, PollWatcher};
use whalebot::ingestion::TradeHook;
use whalebot::metrics::init_metrics;
use whalebot::services::aggregator::SignalAggregator;
use whalebot::services::notifier::{AlertSink, TelegramNotifier};
use whalebot::services::supervisor::{run_with_retry, RetryPolicy};
use whalebot::services::wallet_alerts::TrackedWalletHook;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    if let Some(addr) = &config.metrics_addr {
        let addr: std::net::SocketAddr = addr.parse()?;
        init_metrics(addr)?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    let sink: Option<Arc<dyn AlertSink>> = if config.has_telegram() {
        Some(Arc::new(TelegramNotifier::new(
            config.telegram_bot_token.clone().unwrap(),
            config.telegram_chat_id.clone().unwrap(),
        )))
    } else {
        tracing::warn!("Telegram credentials not set - alerts will be logged only");
        None
    };

    let aggregator = SignalAggregator::new();
    let policy = RetryPolicy::new(
        Duration::from_secs(config.retry_base_secs),
        Duration::from_secs(config.retry_max_secs),
        Duration::from_secs(config.retry_reset_secs),
    );

    // Explicit task registry: every long-running loop is owned here, nothing
    // spawns siblings ad hoc.
    let mut tasks: JoinSet<TaskError> = JoinSet::new();

    match (&config.alchemy_ws_url, &config.gmx_vault_address) {
        (Some(ws_url), vault) if vault.is_some() => {
            let hook = TrackedWalletHook::load(pool.clone(), sink.clone()).await?;
            let watcher = Arc::new(ChainWatcher::new(
                ws_url.clone(),
                vault.clone(),
                pool.clone(),
                sink.clone(),
                aggregator.clone(),
                Some(Arc::new(hook) as Arc<dyn TradeHook>),
            ));
            tasks.spawn(async move {
                run_with_retry("chain-watcher", policy, || {
                    let watcher = Arc::clone(&watcher);
                    async move { watcher.run().await }
                })
                .await
            });
            tracing::info!("Chain watcher spawned");
        }
        (Some(_), _) => {
            tracing::warn!("GMX_VAULT_ADDRESS not set - chain watcher will not start");
        }
        (None, _) => {
            tracing::warn!("ALCHEMY_WS_URL not set - chain watcher will not start");
        }
    }

    let client = HyperliquidClient::new(
        config.hyperliquid_api_url.clone(),
        config.hyperliquid_coin.clone(),
    );
    let poller = Arc::new(PollWatcher::new(
        Box::new(client),
        aggregator.clone(),
        config.hyperliquid_poll_interval(),
    ));
    tasks.spawn(async move {
        run_with_retry("poll-watcher", policy, || {
            let poller = Arc::clone(&poller);
            async move { poller.run().await }
        })
        .await
    });

    let summary_aggregator = aggregator.clone();
    let summary_period = config.summary_interval();
    tasks.spawn(async move {
        run_with_retry("signal-summary", policy, move || {
            let aggregator = summary_aggregator.clone();
            async move { aggregator.run_summary_loop(summary_period).await }
        })
        .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(outcome) => {
                    tracing::info!(outcome = %outcome, "Supervised task stopped - shutting down");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Supervised task panicked - shutting down");
                }
            }
        }
    }

    tasks.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
