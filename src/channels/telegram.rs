//! Telegram channel — long-polls the Bot API for updates.
//!
//! Text and photo messages and inline-button presses become form events.
//! Replies go out as plain messages, messages with inline keyboards, edits
//! of the message that held the pressed buttons, and photos with captions.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{Channel, EventStream, InboundEvent};
use crate::error::ChannelError;
use crate::form::{Command, Event, ImageVariant, Keyboard, ParticipantId, Reply, Response};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for Telegram's sendPhoto API.
const TELEGRAM_MAX_CAPTION_LENGTH: usize = 1024;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const CHANNEL_NAME: &str = "telegram";

/// Telegram channel, connected to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, poll_timeout_secs: u64) -> Self {
        // The HTTP timeout has to outlast the long-poll.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs,
            client,
        }
    }

    /// Point the channel at another Bot API server (a local mock in tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST a Bot API method and return its `result`.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: {e}")))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("{method}: unreadable response ({status}): {e}")))?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(send_failed(format!("{method} failed ({status}): {description}")));
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a text message, splitting past Telegram's length limit. The
    /// keyboard goes with the last chunk.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let (true, Some(kb)) = (i == last, keyboard) {
                body["reply_markup"] = inline_keyboard(kb);
            }
            self.call("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Replace the text (and buttons) of an earlier bot message.
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = inline_keyboard(kb);
        }
        self.call("editMessageText", &body).await.map(|_| ())
    }

    /// Send an already-uploaded photo by its file id.
    pub async fn send_photo_by_id(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "photo": file_id,
        });
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }

        let resp = self
            .client
            .post(self.api_url("sendPhoto"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendPhoto failed: {err}");
        }

        tracing::info!(chat_id, "Telegram record photo sent");
        Ok(())
    }

    /// Stop the button spinner on the participant's side.
    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), ChannelError> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_query_id }),
        )
        .await
        .map(|_| ())
    }

    async fn deliver(
        &self,
        chat_id: i64,
        prompt_message_id: Option<i64>,
        response: &Response,
    ) -> Result<(), ChannelError> {
        match response {
            Response::TextReply { text, .. } => self.send_message(chat_id, text, None).await,
            Response::PromptWithChoices { text, keyboard, .. } => {
                self.send_message(chat_id, text, Some(keyboard)).await
            }
            Response::EditPreviousPrompt { text, keyboard, .. } => match prompt_message_id {
                Some(message_id) => {
                    self.edit_message(chat_id, message_id, text, keyboard.as_ref())
                        .await
                }
                None => self.send_message(chat_id, text, keyboard.as_ref()).await,
            },
            Response::RecordReply {
                image_retrieval_id,
                caption,
                ..
            } => {
                let fitting = photo_caption(caption);
                self.send_photo_by_id(chat_id, image_retrieval_id, fitting)
                    .await
                    .map_err(|e| send_failed(e.to_string()))?;
                // Too long to sit under the photo: the full text follows it.
                if fitting.is_none() {
                    self.send_message(chat_id, caption, None).await?;
                }
                Ok(())
            }
        }
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();
        let poll_timeout = self.poll_timeout_secs;

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": poll_timeout,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        tracing::debug!("Telegram: skipping unsupported update");
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(&self, event: &InboundEvent, reply: &Reply) -> Result<(), ChannelError> {
        let chat_id = event
            .meta_i64("chat_id")
            .ok_or_else(|| send_failed("No chat_id in event metadata".into()))?;

        if let Some(callback_id) = event.meta_str("callback_query_id") {
            if let Err(e) = self.answer_callback(callback_id).await {
                tracing::warn!(error = %e, "Telegram answerCallbackQuery failed");
            }
        }

        let prompt_message_id = event.meta_i64("prompt_message_id");
        for response in reply.responses() {
            self.deliver(chat_id, prompt_message_id, response).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.into(),
        reason,
    }
}

/// Turn one `getUpdates` entry into a form event.
///
/// Messages carry the chat id; button presses additionally carry the id of
/// the message holding the buttons (so the reply can edit it) and the
/// callback id to acknowledge.
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(callback) = update.get("callback_query") {
        let participant = callback.get("from")?.get("id")?.as_i64()?;
        let data = callback.get("data")?.as_str()?;
        let message = callback.get("message")?;
        let chat_id = message.get("chat")?.get("id")?.as_i64()?;
        let message_id = message.get("message_id").and_then(Value::as_i64);
        let callback_id = callback.get("id").and_then(Value::as_str);

        return Some(
            InboundEvent::new(CHANNEL_NAME, ParticipantId::from(participant), Event::choice(data))
                .with_metadata(json!({
                    "chat_id": chat_id,
                    "prompt_message_id": message_id,
                    "callback_query_id": callback_id,
                })),
        );
    }

    let message = update.get("message")?;
    let participant = message.get("from")?.get("id")?.as_i64()?;
    let chat_id = message.get("chat")?.get("id")?.as_i64()?;

    let event = if let Some(text) = message.get("text").and_then(Value::as_str) {
        match text.starts_with('/').then(|| Command::parse_slash(text)).flatten() {
            Some(command) => Event::command(command),
            None => Event::text(text),
        }
    } else if let Some(sizes) = message.get("photo").and_then(Value::as_array) {
        Event::images(sizes.iter().filter_map(parse_photo_size).collect())
    } else {
        // Stickers, documents and the like: whatever caption they carry is
        // treated as text so every step can answer it.
        let caption = message.get("caption").and_then(Value::as_str).unwrap_or("");
        Event::text(caption)
    };

    Some(
        InboundEvent::new(CHANNEL_NAME, ParticipantId::from(participant), event)
            .with_metadata(json!({ "chat_id": chat_id })),
    )
}

/// One `PhotoSize`. Byte size when reported, pixel count otherwise.
fn parse_photo_size(size: &Value) -> Option<ImageVariant> {
    let retrieval_id = size.get("file_id")?.as_str()?.to_string();
    let unique_id = size.get("file_unique_id")?.as_str()?.to_string();
    let bytes = size.get("file_size").and_then(Value::as_u64);
    let pixels = || {
        let w = size.get("width").and_then(Value::as_u64).unwrap_or(0);
        let h = size.get("height").and_then(Value::as_u64).unwrap_or(0);
        w * h
    };
    Some(ImageVariant {
        unique_id,
        retrieval_id,
        size: bytes.unwrap_or_else(pixels),
    })
}

/// `reply_markup` for an inline keyboard.
pub fn inline_keyboard(keyboard: &Keyboard) -> Value {
    let rows: Vec<Value> = keyboard
        .rows
        .iter()
        .map(|row| {
            Value::Array(
                row.iter()
                    .map(|c| json!({ "text": c.label, "callback_data": c.key }))
                    .collect(),
            )
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// The caption to put under a photo, or `None` when it exceeds Telegram's
/// caption limit and has to go out as a separate message.
fn photo_caption(caption: &str) -> Option<&str> {
    (caption.chars().count() <= TELEGRAM_MAX_CAPTION_LENGTH).then_some(caption)
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
