use async_trait::async_trait;
use hearth_core::{ChatId, ChatTransport, DeliveryError, DeliveryResult};
use teloxide::{
    payloads::{SendMessageSetters, SetWebhookSetters},
    requests::Requester,
    types::ParseMode,
    Bot,
};
use url::Url;

use crate::config::TelegramConfig;

#[derive(Clone)]
pub struct TeloxideProxy {
    bot: Bot,
}

impl TeloxideProxy {
    pub fn new(config: &TelegramConfig) -> Result<TeloxideProxy, String> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| format!("HTTP client cannot be created: {e}"))?;

        Ok(Self {
            bot: Bot::with_client(config.token.clone(), client),
        })
    }

    /// Points Telegram at our webhook; updates will carry `secret` in the
    /// `X-Telegram-Bot-Api-Secret-Token` header.
    pub async fn register_webhook(&self, raw_url: &str, secret: &str) -> Result<(), String> {
        let url = Url::parse(raw_url).map_err(|e| format!("Invalid webhook URL '{raw_url}': {e}"))?;

        self.bot
            .set_webhook(url)
            .secret_token(secret.to_owned())
            .await
            .map_err(|e| e.to_string())
            .map(|_| ())
    }
}

#[async_trait]
impl ChatTransport for TeloxideProxy {
    async fn send_message(&self, chat_id: ChatId, text: String) -> DeliveryResult {
        let outcome = self
            .bot
            .send_message(teloxide::types::ChatId(chat_id.0), text)
            .parse_mode(ParseMode::MarkdownV2)
            .await;

        match outcome {
            Ok(message) => {
                tracing::info!("Sent message {} to chat {chat_id}", message.id.0);
                Ok(())
            }
            Err(e) => Err(DeliveryError {
                chat_id,
                reason: e.to_string(),
            }),
        }
    }
}
