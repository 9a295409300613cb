use async_trait::async_trait;
use metrics::counter;
use serde_json::json;

/// Outbound alert seam. Delivery is fire-and-forget: implementations log
/// failures and never raise, so a dead sink cannot stall the pipeline.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &str);
}

/// Telegram notification sink.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn send(&self, message: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    counter!("alerts_sent").increment(1);
                } else {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}
