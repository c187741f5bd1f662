use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{routing::post, Router};
use hearth_core::{command_dispatcher, ChatId, IncomingMessage, Orchestrator};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::config::WebhookConfig;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

#[derive(Deserialize, Debug)]
// See https://core.telegram.org/bots/api#update
struct TelegramUpdate {
    pub message: TelegramMessage,
}

#[derive(Deserialize, Debug)]
struct TelegramMessage {
    pub chat: TelegramChat,
    pub from: TelegramSender,
    pub text: String,
}

#[derive(Deserialize, Debug)]
struct TelegramChat {
    pub id: i64,
}

#[derive(Deserialize, Debug)]
struct TelegramSender {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl From<TelegramMessage> for IncomingMessage {
    fn from(value: TelegramMessage) -> Self {
        let TelegramSender {
            id,
            username,
            first_name,
        } = value.from;

        IncomingMessage {
            chat_id: ChatId(value.chat.id),
            from_username: username
                .or(first_name)
                .unwrap_or_else(|| format!("user {id}")),
            text: value.text,
        }
    }
}

pub struct WebhookState {
    pub secret: String,
    pub orchestrator: Arc<Orchestrator>,
}

fn is_authentic(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|token| bool::from(token.as_bytes().ct_eq(secret.as_bytes())))
        .unwrap_or(false)
}

async fn receive_update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    if !is_authentic(&headers, &state.secret) {
        tracing::warn!("Rejecting update with a missing or wrong secret token");
        return (StatusCode::FORBIDDEN, "Forbidden");
    }

    let message: IncomingMessage = match serde_json::from_str::<TelegramUpdate>(&body) {
        Ok(update) => update.message.into(),
        Err(e) => {
            tracing::error!("Unable to parse update: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server failed");
        }
    };

    tracing::info!(
        "Handling message from {} (Message: {})",
        message.from_username,
        message.text
    );

    // The registry lives as long as this update.
    command_dispatcher(&state.orchestrator)
        .dispatch(&message)
        .await;

    (StatusCode::OK, "OK")
}

pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(receive_update))
        .with_state(Arc::new(state))
}

pub async fn run_webhook_listener(config: &WebhookConfig, state: WebhookState) -> Result<(), String> {
    let app = router(&config.path, state);

    tracing::info!("Listening for updates on {}{}", config.listen_addr, config.path);

    axum::Server::try_bind(&config.listen_addr)
        .map_err(|e| e.to_string())?
        .serve(app.into_make_service())
        .await
        .map_err(|e| e.to_string())?;

    Ok(())
}
