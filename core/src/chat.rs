use async_trait::async_trait;
use derive_more::Display;

use crate::model::ChatId;

#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(fmt = "unable to deliver message to chat {}: {}", chat_id, reason)]
pub struct DeliveryError {
    pub chat_id: ChatId,
    pub reason: String,
}

impl std::error::Error for DeliveryError {}

pub type DeliveryResult = Result<(), DeliveryError>;

/// Outbound half of the chat transport. Text is sent in MarkdownV2 mode and
/// must already be escaped.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: String) -> DeliveryResult;
}
