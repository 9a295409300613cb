use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::sleep;

use crate::errors::TaskError;
use crate::models::{Direction, TradeAction, TradeEvent};
use crate::services::aggregator::SignalAggregator;

const PROTOCOL: &str = "Hyperliquid";

/// One record from a polled trade feed, already in exchange-neutral string
/// form: price and amount as decimal strings, a side token, a slash-delimited
/// symbol, and an opaque id.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentTrade {
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub amount: String,
    #[serde(default)]
    pub hash: String,
}

/// Polling source seam. The watcher only sees bounded batches of
/// `RecentTrade` records per call.
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn recent_trades(&self) -> anyhow::Result<Vec<RecentTrade>>;
}

/// Native row shape of the Hyperliquid `recentTrades` info endpoint.
#[derive(Debug, Deserialize)]
struct HlTrade {
    coin: String,
    side: String,
    px: String,
    sz: String,
    #[serde(default)]
    hash: String,
}

/// REST client for Hyperliquid's public info API.
pub struct HyperliquidClient {
    http: reqwest::Client,
    base_url: String,
    coin: String,
}

impl HyperliquidClient {
    pub fn new(base_url: String, coin: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            coin,
        }
    }
}

#[async_trait]
impl TradeSource for HyperliquidClient {
    async fn recent_trades(&self) -> anyhow::Result<Vec<RecentTrade>> {
        let body = serde_json::json!({ "type": "recentTrades", "coin": self.coin });
        let rows: Vec<HlTrade> = self
            .http
            .post(&self.base_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rows.into_iter().map(normalize_native).collect())
    }
}

/// Hyperliquid reports sides as "B" (bid) / "A" (ask) and bare coin names.
fn normalize_native(t: HlTrade) -> RecentTrade {
    RecentTrade {
        symbol: format!("{}/USD", t.coin),
        side: if t.side.eq_ignore_ascii_case("b") {
            "buy".into()
        } else {
            "sell".into()
        },
        price: t.px,
        amount: t.sz,
        hash: t.hash,
    }
}

/// Periodic poller with the same downstream contract as the stream watcher:
/// everything it emits is a normalized `TradeEvent`.
pub struct PollWatcher {
    source: Box<dyn TradeSource>,
    aggregator: SignalAggregator,
    interval: Duration,
}

impl PollWatcher {
    pub fn new(
        source: Box<dyn TradeSource>,
        aggregator: SignalAggregator,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            aggregator,
            interval,
        }
    }

    pub async fn run(&self) -> Result<(), TaskError> {
        tracing::info!(interval_secs = self.interval.as_secs(), "Poll watcher started");

        loop {
            match self.source.recent_trades().await {
                Ok(trades) => self.process_trades(&trades),
                Err(e) => {
                    tracing::error!(error = %e, "Poll watcher: fetch failed");
                }
            }
            sleep(self.interval).await;
        }
    }

    fn process_trades(&self, trades: &[RecentTrade]) {
        for trade in trades {
            match convert_trade(trade) {
                Ok(event) => {
                    counter!("poll_trades_total").increment(1);
                    self.aggregator.record_whale_trade(
                        &event.symbol,
                        event.size_usd,
                        event.direction.as_str(),
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Dropping malformed polled trade");
                }
            }
        }
    }
}

/// Convert an exchange record to a normalized trade event. One bad record is
/// an error for that record only; the caller keeps going.
pub fn convert_trade(trade: &RecentTrade) -> anyhow::Result<TradeEvent> {
    let price: Decimal = trade
        .price
        .trim()
        .parse()
        .with_context(|| format!("bad price {:?}", trade.price))?;
    let amount: Decimal = trade
        .amount
        .trim()
        .parse()
        .with_context(|| format!("bad amount {:?}", trade.amount))?;

    Ok(TradeEvent {
        symbol: trade.symbol.replace('/', "-"),
        size_usd: price * amount,
        direction: Direction::from_side_token(&trade.side),
        leverage: Decimal::ONE,
        // Public trade feeds carry no wallet attribution.
        wallet: String::new(),
        protocol: PROTOCOL.into(),
        tx_hash: trade.hash.clone(),
        action: TradeAction::Open,
    })
}
