//! Telegram Bot API client.
//!
//! Thin JSON-over-HTTPS wrapper around the handful of Bot API methods the
//! queue and the broadcast engine need. Every failed call is classified into
//! a [`TransportError`] from the response's `error_code`, `description` and
//! `parameters.retry_after`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{Transport, TransportError};
use crate::model::message::Message;
use crate::model::work::JoinRequest;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot API client. Cheap to share behind an `Arc`.
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

/// Standard Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// The bot's own identity, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub chat_join_request: Option<ChatJoinRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl From<ChatJoinRequest> for JoinRequest {
    fn from(req: ChatJoinRequest) -> Self {
        JoinRequest {
            group_id: req.chat.id,
            subject_id: req.from.id,
            subject_name: req.from.first_name,
            group_title: req.chat.title.unwrap_or_default(),
        }
    }
}

/// Map a failed Bot API response onto the transport error taxonomy.
pub fn classify(code: u16, description: &str, retry_after: Option<u64>) -> TransportError {
    if code == 429 || retry_after.is_some() {
        return TransportError::RateLimited {
            retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
        };
    }

    let lower = description.to_ascii_lowercase();
    let unreachable = [
        "user_deactivated",
        "peer_id_invalid",
        "hide_requester_missing",
        "user not found",
        "chat not found",
        "bot was blocked by the user",
        "user is deactivated",
    ];
    if unreachable.iter().any(|needle| lower.contains(needle)) {
        return TransportError::SubjectUnreachable(description.to_string());
    }

    let forbidden = ["chat_admin_required", "not enough rights", "administrator rights"];
    if code == 403 || forbidden.iter().any(|needle| lower.contains(needle)) {
        return TransportError::Forbidden(description.to_string());
    }

    TransportError::Other(format!("{code}: {description}"))
}

impl TelegramApi {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Other(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.token.expose_secret(),
            method
        );
        debug!(method, "bot api call");

        // without_url keeps the token out of error messages.
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Other(format!("{method}: {}", e.without_url())))?;
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            TransportError::Other(format!("{method}: bad response: {}", e.without_url()))
        })?;

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| TransportError::Other(format!("{method}: missing result")));
        }

        Err(classify(
            envelope.error_code.unwrap_or(status),
            envelope.description.as_deref().unwrap_or("unknown error"),
            envelope.parameters.and_then(|p| p.retry_after),
        ))
    }

    pub async fn get_me(&self) -> Result<BotUser, TransportError> {
        self.call("getMe", json!({})).await
    }

    /// Long-poll for join requests after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["chat_join_request"],
            }),
        )
        .await
    }

    /// Send plain HTML text and return the new message's id.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<i64, TransportError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": text, "parse_mode": "HTML" }),
            )
            .await?;
        Ok(sent.message_id)
    }

    pub async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TransportError> {
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramApi {
    async fn approve(&self, group_id: i64, subject_id: i64) -> Result<(), TransportError> {
        let result: Result<bool, TransportError> = self
            .call(
                "approveChatJoinRequest",
                json!({ "chat_id": group_id, "user_id": subject_id }),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            // Approved by an earlier attempt whose acknowledgement was lost.
            Err(TransportError::Other(msg)) if msg.contains("USER_ALREADY_PARTICIPANT") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn send(&self, chat_id: i64, message: &Message) -> Result<(), TransportError> {
        let (method, body) = match message {
            Message::Text { text } => (
                "sendMessage",
                json!({ "chat_id": chat_id, "text": text, "parse_mode": "HTML" }),
            ),
            Message::Photo { url, caption } => (
                "sendPhoto",
                json!({
                    "chat_id": chat_id,
                    "photo": url,
                    "caption": caption,
                    "parse_mode": "HTML",
                }),
            ),
            Message::Copy {
                from_chat_id,
                message_id,
            } => (
                "copyMessage",
                json!({
                    "chat_id": chat_id,
                    "from_chat_id": from_chat_id,
                    "message_id": message_id,
                }),
            ),
        };
        let _: serde_json::Value = self.call(method, body).await?;
        Ok(())
    }
}
