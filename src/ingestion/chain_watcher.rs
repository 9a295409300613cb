use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use sqlx::PgPool;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::db::trade_repo;
use crate::errors::TaskError;
use crate::ingestion::decoder::{
    checksum_address, decode_decrease, decode_increase, SIG_POSITION_CLOSE, SIG_POSITION_OPEN,
};
use crate::ingestion::{RawLog, TradeHook};
use crate::models::{TradeAction, TradeEvent};
use crate::services::aggregator::SignalAggregator;
use crate::services::notifier::AlertSink;

/// Pause between reconnect attempts after a transport error. Transient
/// stream failures are absorbed here, not escalated to the supervisor.
const STREAM_RETRY_DELAY: Duration = Duration::from_secs(1);

const PROTOCOL: &str = "GMX";

/// Live subscription to the vault contract's position events. Decodes each
/// log, persists opens, links closes to their open for realized pnl, and
/// forwards normalized trades downstream. Tracked-wallet behavior is
/// injected through the `TradeHook` seam.
pub struct ChainWatcher {
    ws_url: String,
    vault_address: Option<String>,
    pool: PgPool,
    sink: Option<Arc<dyn AlertSink>>,
    aggregator: SignalAggregator,
    hook: Option<Arc<dyn TradeHook>>,
}

impl ChainWatcher {
    pub fn new(
        ws_url: String,
        vault_address: Option<String>,
        pool: PgPool,
        sink: Option<Arc<dyn AlertSink>>,
        aggregator: SignalAggregator,
        hook: Option<Arc<dyn TradeHook>>,
    ) -> Self {
        Self {
            ws_url,
            vault_address,
            pool,
            sink,
            aggregator,
            hook,
        }
    }

    pub async fn run(&self) -> Result<(), TaskError> {
        let Some(vault) = self.vault_address.clone() else {
            tracing::warn!("GMX_VAULT_ADDRESS not set - disabling chain watcher");
            return Ok(());
        };

        loop {
            if let Err(e) = self.connect_and_listen(&vault).await {
                tracing::error!(error = %e, "Chain watcher: transport error");
            }
            sleep(STREAM_RETRY_DELAY).await;
        }
    }

    /// One subscription session: connect, subscribe, drain frames until the
    /// stream errors or closes. Per-log failures never end the session.
    async fn connect_and_listen(&self, vault: &str) -> anyhow::Result<()> {
        tracing::info!(url = %self.ws_url, "Chain watcher connecting to node WSS...");
        let (ws_stream, _response) = connect_async(&self.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe_msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["logs", {
                "address": vault,
                "topics": [[SIG_POSITION_OPEN.as_str(), SIG_POSITION_CLOSE.as_str()]]
            }]
        });
        write
            .send(Message::Text(subscribe_msg.to_string().into()))
            .await?;
        tracing::info!(vault = %vault, "Subscribed to position events");

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Some(log) = parse_subscription_log(text.as_ref()) {
                        self.process_log(&log).await;
                    }
                }
                Message::Ping(data) => {
                    write.send(Message::Pong(data)).await?;
                }
                Message::Close(_) => {
                    tracing::warn!("Chain watcher: server sent close frame");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }

    async fn process_log(&self, log: &RawLog) {
        counter!("logs_processed").increment(1);

        let Some(sig) = log.topics.first() else {
            return;
        };
        let Some(wallet) = log.topics.get(1).and_then(|t| checksum_address(t)) else {
            return;
        };

        if sig.eq_ignore_ascii_case(&SIG_POSITION_OPEN) {
            self.handle_open(&wallet, log).await;
        } else if sig.eq_ignore_ascii_case(&SIG_POSITION_CLOSE) {
            self.handle_close(&wallet, log).await;
        }
    }

    async fn handle_open(&self, wallet: &str, log: &RawLog) {
        let open = match decode_increase(log) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, tx = %log.tx_hash, "Skipping undecodable open log");
                return;
            }
        };

        let event = TradeEvent {
            symbol: open.symbol,
            size_usd: open.size_usd,
            direction: open.direction,
            leverage: open.leverage,
            wallet: wallet.to_string(),
            protocol: PROTOCOL.into(),
            tx_hash: open.tx_hash,
            action: TradeAction::Open,
        };

        match trade_repo::insert_trade(&self.pool, &event).await {
            Ok(()) => {
                counter!("trades_recorded").increment(1);
                tracing::info!(
                    wallet = %event.wallet,
                    size = %event.size_usd,
                    leverage = %event.leverage,
                    "Position open recorded"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, wallet = %event.wallet, "Failed to persist trade");
            }
        }
        counter!("trades_opened").increment(1);

        if let Some(sink) = &self.sink {
            let msg = format!(
                "🐋 Whale {} opened {:.2}$ {}",
                event.wallet, event.size_usd, event.direction
            );
            sink.send(&msg).await;
        }

        self.aggregator
            .record_whale_trade(&event.symbol, event.size_usd, event.direction.as_str());

        if let Some(hook) = &self.hook {
            hook.on_trade(&event).await;
        }
    }

    async fn handle_close(&self, wallet: &str, log: &RawLog) {
        let close = match decode_decrease(log) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, tx = %log.tx_hash, "Skipping undecodable close log");
                return;
            }
        };

        match trade_repo::latest_unresolved_open(&self.pool, wallet).await {
            Ok(Some(open_row)) => {
                tracing::info!(wallet = %wallet, pnl = %close.pnl, "Linking realized pnl");
                if let Err(e) = trade_repo::resolve_trade(&self.pool, open_row.id, close.pnl).await
                {
                    tracing::error!(error = %e, wallet = %wallet, "Failed to resolve trade");
                    return;
                }
                counter!("trades_closed").increment(1);
            }
            Ok(None) => {
                tracing::info!(
                    wallet = %wallet,
                    tx = %close.tx_hash,
                    "Close with no matching open - dropping"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, wallet = %wallet, "Open-position lookup failed");
            }
        }
    }
}

/// Parse an eth_subscription notification into a RawLog. Subscription
/// confirmations and anything else quietly return None.
pub fn parse_subscription_log(text: &str) -> Option<RawLog> {
    let msg: serde_json::Value = serde_json::from_str(text).ok()?;

    // Confirmations: {"jsonrpc":"2.0","id":1,"result":"0x..."}
    if msg.get("id").is_some() && msg.get("result").is_some() {
        tracing::debug!(result = %msg["result"], "Chain watcher: subscription confirmed");
        return None;
    }

    let result = msg.get("params")?.get("result")?;

    let topics = result
        .get("topics")?
        .as_array()?
        .iter()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect::<Vec<_>>();
    let data = result.get("data")?.as_str()?.to_string();
    let tx_hash = result
        .get("transactionHash")
        .and_then(|h| h.as_str())
        .unwrap_or_default()
        .to_string();

    Some(RawLog {
        topics,
        data,
        tx_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn word_hex(value: U256) -> String {
        format!("{value:064x}")
    }

    fn one_e30() -> U256 {
        U256::from(10u64).pow(U256::from(30u64))
    }

    #[test]
    fn test_parse_subscription_notification() {
        let text = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0x9cef478923ff08bf67fde6c64013158d",
                "result": {
                    "address": "0x489ee077994b6658eafa855c308275ead8097c4a",
                    "topics": [
                        SIG_POSITION_OPEN.as_str(),
                        "0x0000000000000000000000005aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
                    ],
                    "data": "0x1234",
                    "transactionHash": "0xfeed"
                }
            }
        })
        .to_string();

        let log = parse_subscription_log(&text).expect("should parse");
        assert_eq!(log.topics.len(), 2);
        assert_eq!(log.data, "0x1234");
        assert_eq!(log.tx_hash, "0xfeed");
    }

    #[test]
    fn test_parse_skips_confirmation() {
        let text = r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#;
        assert!(parse_subscription_log(text).is_none());
    }

    #[test]
    fn test_parse_skips_garbage() {
        assert!(parse_subscription_log("not json").is_none());
        assert!(parse_subscription_log(r#"{"params":{}}"#).is_none());
    }

    #[test]
    fn test_bad_log_does_not_block_batch() {
        // First log's data is too short, second is well-formed; decoding the
        // batch in order must still yield the second event.
        let bad = RawLog {
            topics: vec![SIG_POSITION_OPEN.clone()],
            data: "0x1234".into(),
            tx_hash: "0x01".into(),
        };
        let good = RawLog {
            topics: vec![SIG_POSITION_OPEN.clone()],
            data: format!(
                "0x{}{}",
                word_hex(U256::from(20_000u64) * one_e30()),
                word_hex(U256::from(5u64) * one_e30()),
            ),
            tx_hash: "0x02".into(),
        };

        let decoded: Vec<_> = [bad, good]
            .iter()
            .map(decode_increase)
            .filter_map(Result::ok)
            .collect();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].size_usd, rust_decimal::Decimal::from(20_000));
        assert_eq!(decoded[0].tx_hash, "0x02");
    }
}
