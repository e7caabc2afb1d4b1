//! Telegram Bot API client
//!
//! Implements the messaging channel used for advisory delivery, operator
//! reports and chat bot replies.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use shared::ChatId;

use crate::error::{AppError, AppResult};

/// Why a message could not be delivered
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// The user blocked the bot or the account is deactivated
    #[error("recipient is unreachable: {0}")]
    Unreachable(String),

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("Bot API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Photo or document reference accepted by the Bot API
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputFile {
    /// file_id of a file already on Telegram's servers
    FileId(String),
    /// HTTP URL Telegram downloads itself
    Url(String),
}

/// Message payload
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    Text(String),
    Photo {
        photo: InputFile,
        caption: Option<String>,
    },
    Document {
        document: InputFile,
        caption: Option<String>,
    },
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingMessage::Text(text.into())
    }
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Identifier of a message the channel accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

/// Outbound messaging channel
pub trait MessagingChannel: Send + Sync {
    /// Send a text, photo or document, optionally with an inline keyboard
    fn send(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<SentMessage, DeliveryError>> + Send;

    /// Forward a message with its original attribution
    fn forward(
        &self,
        chat_id: ChatId,
        from_chat: ChatId,
        message_id: i64,
    ) -> impl Future<Output = Result<SentMessage, DeliveryError>> + Send;

    /// Copy a message without attribution
    fn copy(
        &self,
        chat_id: ChatId,
        from_chat: ChatId,
        message_id: i64,
    ) -> impl Future<Output = Result<SentMessage, DeliveryError>> + Send;

    fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> impl Future<Output = Result<SentMessage, DeliveryError>> + Send {
        async move {
            let message = OutgoingMessage::text(text);
            self.send(chat_id, &message, None).await
        }
    }
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct TelegramResponse<R> {
    ok: bool,
    result: Option<R>,
    error_code: Option<u16>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: ChatId,
    photo: &'a InputFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct SendDocumentRequest<'a> {
    chat_id: ChatId,
    document: &'a InputFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct RelayMessageRequest {
    chat_id: ChatId,
    from_chat_id: ChatId,
    message_id: i64,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl TelegramClient {
    /// Create a client with a per-request timeout
    pub fn new(bot_token: &str, api_base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), bot_token),
            timeout,
        })
    }

    /// Invoke a Bot API method
    async fn call<T, R>(&self, method: &str, body: &T) -> Result<R, DeliveryError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let envelope: TelegramResponse<R> = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("invalid Bot API response: {}", e)))?;

        match envelope {
            TelegramResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            TelegramResponse {
                error_code,
                description,
                ..
            } => Err(classify_api_error(
                error_code.unwrap_or(status),
                description.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }
}

/// Map a Bot API failure onto the delivery taxonomy
pub fn classify_api_error(code: u16, description: String) -> DeliveryError {
    match code {
        403 => DeliveryError::Unreachable(description),
        400 if description.to_lowercase().contains("chat not found") => {
            DeliveryError::ChatNotFound(description)
        }
        _ => DeliveryError::Api { code, description },
    }
}

impl MessagingChannel for TelegramClient {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, DeliveryError> {
        match message {
            OutgoingMessage::Text(text) => {
                self.call(
                    "sendMessage",
                    &SendMessageRequest {
                        chat_id,
                        text,
                        reply_markup: markup,
                    },
                )
                .await
            }
            OutgoingMessage::Photo { photo, caption } => {
                self.call(
                    "sendPhoto",
                    &SendPhotoRequest {
                        chat_id,
                        photo,
                        caption: caption.as_deref(),
                        reply_markup: markup,
                    },
                )
                .await
            }
            OutgoingMessage::Document { document, caption } => {
                self.call(
                    "sendDocument",
                    &SendDocumentRequest {
                        chat_id,
                        document,
                        caption: caption.as_deref(),
                        reply_markup: markup,
                    },
                )
                .await
            }
        }
    }

    async fn forward(
        &self,
        chat_id: ChatId,
        from_chat: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, DeliveryError> {
        self.call(
            "forwardMessage",
            &RelayMessageRequest {
                chat_id,
                from_chat_id: from_chat,
                message_id,
            },
        )
        .await
    }

    async fn copy(
        &self,
        chat_id: ChatId,
        from_chat: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, DeliveryError> {
        self.call(
            "copyMessage",
            &RelayMessageRequest {
                chat_id,
                from_chat_id: from_chat,
                message_id,
            },
        )
        .await
    }
}
