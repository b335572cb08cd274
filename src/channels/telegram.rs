//! Telegram channel: long-polls the Bot API for messages and button
//! presses, renders HTML messages with inline keyboards.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::channels::{EventKind, EventStream, IncomingEvent, Keyboard, MessageRef, UiChannel};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram channel, connected to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            base_url: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        method_url(&self.base_url, &self.bot_token, method)
    }

    /// Call a Bot API method and return its `result` payload.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        call_api(&self.client, &self.api_url(method), body)
            .await
            .map_err(|reason| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method}: {reason}"),
            })
    }

    async fn send_chunk(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = inline_markup(keyboard);
        }
        let sent = self.call("sendMessage", &body).await?;
        message_ref(&sent).ok_or_else(|| ChannelError::InvalidMessage(
            "sendMessage returned no message id".into(),
        ))
    }
}

fn method_url(base: &str, token: &SecretString, method: &str) -> String {
    format!("{base}/bot{}/{method}", token.expose_secret())
}

async fn call_api(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value, String> {
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = resp.status();
    let data: Value = resp.json().await.map_err(|e| e.to_string())?;

    if data.get("ok").and_then(Value::as_bool) == Some(true) {
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    } else {
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        Err(format!("HTTP {status}: {description}"))
    }
}

// ── UiChannel trait implementation ──────────────────────────────────

#[async_trait]
impl UiChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let me = self.call("getMe", &json!({})).await.map_err(|e| {
            ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            }
        })?;
        let username = me
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(bot = username, "Telegram bot authorized");

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let updates_url = self.api_url("getUpdates");
        let answer_url = self.api_url("answerCallbackQuery");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let updates = match call_api(&client, &updates_url, &body).await {
                    Ok(Value::Array(updates)) => updates,
                    Ok(other) => {
                        tracing::warn!("Telegram getUpdates returned {other}");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in &updates {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    // Stop the client-side spinner on the pressed button.
                    if let Some(query_id) = update
                        .get("callback_query")
                        .and_then(|q| q.get("id"))
                        .and_then(Value::as_str)
                    {
                        let answer = json!({ "callback_query_id": query_id });
                        if let Err(e) = call_api(&client, &answer_url, &answer).await {
                            tracing::debug!("answerCallbackQuery failed: {e}");
                        }
                    }

                    let Some(event) = parse_update(update) else {
                        tracing::debug!("Ignoring unsupported Telegram update");
                        continue;
                    };
                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn render(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        let mut sent = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let buttons = if i == last { keyboard } else { None };
            sent = Some(self.send_chunk(user_id, chunk, buttons).await?);
        }
        sent.ok_or_else(|| ChannelError::InvalidMessage("empty message".into()))
    }

    async fn edit_buttons(
        &self,
        message: &MessageRef,
        keyboard: &Keyboard,
    ) -> Result<(), ChannelError> {
        self.call(
            "editMessageReplyMarkup",
            &json!({
                "chat_id": message.chat_id,
                "message_id": message.message_id,
                "reply_markup": inline_markup(keyboard),
            }),
        )
        .await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = inline_markup(keyboard);
        }
        self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn delete(&self, message: &MessageRef) -> Result<(), ChannelError> {
        self.call(
            "deleteMessage",
            &json!({
                "chat_id": message.chat_id,
                "message_id": message.message_id,
            }),
        )
        .await?;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// `reply_markup` payload for an inline keyboard.
fn inline_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Value> = keyboard
        .iter()
        .map(|row| {
            Value::Array(
                row.iter()
                    .map(|b| json!({ "text": b.text, "callback_data": b.action }))
                    .collect(),
            )
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

fn message_ref(message: &Value) -> Option<MessageRef> {
    Some(MessageRef {
        chat_id: message.get("chat")?.get("id")?.as_i64()?,
        message_id: message.get("message_id")?.as_i64()?,
    })
}

/// Turn a raw update into an event. Non-text messages and updates without
/// a sender are dropped.
fn parse_update(update: &Value) -> Option<IncomingEvent> {
    if let Some(query) = update.get("callback_query") {
        let from = query.get("from")?;
        return Some(IncomingEvent {
            user_id: from.get("id")?.as_i64()?,
            language_code: language_code(from),
            kind: EventKind::Action {
                data: query.get("data")?.as_str()?.to_string(),
                message: query.get("message").and_then(message_ref),
            },
        });
    }

    let message = update.get("message")?;
    let from = message.get("from")?;
    let text = message.get("text")?.as_str()?.trim();
    let kind = match text.strip_prefix('/') {
        Some(command) => {
            let name = command.split_whitespace().next().unwrap_or_default();
            // `/start@my_bot` in group chats
            let name = name.split('@').next().unwrap_or_default();
            EventKind::Command(name.to_string())
        }
        None => EventKind::Text(text.to_string()),
    };
    Some(IncomingEvent {
        user_id: from.get("id")?.as_i64()?,
        language_code: language_code(from),
        kind,
    })
}

fn language_code(from: &Value) -> Option<String> {
    from.get("language_code")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
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

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
