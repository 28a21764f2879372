//! Telegram channel — Bot API over reqwest.
//!
//! Outbound messages go through `sendMessage` with reply keyboards. Inbound
//! updates arrive either through the webhook (see `crate::webhook`) or through
//! `getUpdates` long-polling via [`TelegramChannel::updates`].

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::channels::telegram_types::{ApiResponse, Update, reply_markup_json};
use crate::channels::{MessageChannel, OutgoingMessage, ParseMode};
use crate::config::RetryPolicy;
use crate::error::ChannelError;
use crate::retry::with_retry;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Default bound on a single `sendMessage` attempt.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Stream of inbound updates from long-polling.
pub type UpdateStream = Pin<Box<dyn Stream<Item = Update> + Send>>;

/// Telegram channel — talks to the Bot API.
#[derive(Clone)]
pub struct TelegramChannel {
    bot_token: SecretString,
    api_url: String,
    client: reqwest::Client,
    /// Applied to each message chunk on its own.
    retry: RetryPolicy,
    send_timeout: Duration,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_url: DEFAULT_API_URL.to_string(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Timeout and retry policy for each outgoing message chunk.
    pub fn with_send_policy(mut self, retry: RetryPolicy, timeout: Duration) -> Self {
        self.retry = retry;
        self.send_timeout = timeout;
        self
    }

    /// Point the channel at a different Bot API server (self-hosted or a test double).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_url,
            self.bot_token.expose_secret()
        )
    }

    fn api_error(method: &str, reason: impl Into<String>) -> ChannelError {
        ChannelError::ApiFailed {
            name: "telegram".into(),
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Call a Bot API method and return the raw JSON response.
    pub async fn call_raw(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| Self::api_error(method, e.to_string()))?;

        resp.json()
            .await
            .map_err(|e| Self::api_error(method, format!("invalid response: {e}")))
    }

    /// Call a Bot API method and unwrap its `result`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, ChannelError> {
        let raw = self.call_raw(method, body).await?;
        let resp: ApiResponse<T> = serde_json::from_value(raw)
            .map_err(|e| Self::api_error(method, format!("unexpected response shape: {e}")))?;

        if !resp.ok {
            return Err(Self::api_error(
                method,
                resp.description.unwrap_or_else(|| "ok=false".to_string()),
            ));
        }
        resp.result
            .ok_or_else(|| Self::api_error(method, "response has no result"))
    }

    /// Register `url` as the webhook. Returns Telegram's response verbatim.
    pub async fn set_webhook(&self, url: &str) -> Result<serde_json::Value, ChannelError> {
        let resp = self
            .call_raw("setWebhook", &serde_json::json!({ "url": url }))
            .await?;
        tracing::info!(url, ok = ?resp.get("ok"), "Telegram webhook registered");
        Ok(resp)
    }

    /// Remove the webhook so `getUpdates` can be used.
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        let _: bool = self
            .call("deleteWebhook", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Current webhook status. Returns Telegram's response verbatim.
    pub async fn webhook_info(&self) -> Result<serde_json::Value, ChannelError> {
        self.call_raw("getWebhookInfo", &serde_json::json!({})).await
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        self.call::<serde_json::Value>("getMe", &serde_json::json!({}))
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })
    }

    /// Fetch one batch of updates starting at `offset`.
    pub async fn poll(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ChannelError> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"]
            }),
        )
        .await
    }

    /// Long-poll `getUpdates` forever, yielding updates in arrival order.
    pub fn updates(&self) -> UpdateStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let updates = match channel.poll(offset, POLL_TIMEOUT_SECS).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in updates {
                    // Advance offset past this update
                    offset = offset.max(update.update_id + 1);
                    if tx.send(update).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|update| (update, rx))
        });

        Box::pin(stream)
    }

    async fn post_message(&self, body: &serde_json::Value) -> Result<reqwest::Response, ChannelError> {
        self.client
            .post(self.api_url("sendMessage"))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })
    }

    /// Send a single message chunk (≤4096 chars). Markdown chunks fall back to
    /// plain text when Telegram rejects the markup.
    async fn send_message_chunk(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
        reply_markup: Option<&serde_json::Value>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup.clone();
        }

        if parse_mode == ParseMode::Plain {
            let resp = self.post_message(&body).await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage failed ({status}): {err}"),
                });
            }
            return Ok(());
        }

        // Try Markdown first
        let mut markdown_body = body.clone();
        markdown_body["parse_mode"] = serde_json::Value::String("Markdown".into());

        let markdown_resp = self.post_message(&markdown_body).await?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            chat_id,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        // Unbalanced `*` or `_` make Telegram reject the entities; send as plain text.
        let plain_resp = self.post_message(&body).await?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Send a message, splitting past Telegram's 4096 char limit. The reply
    /// markup rides on the last chunk. Each chunk is timed out and retried on
    /// its own, so a failed chunk never resends the ones before it.
    async fn send(&self, chat_id: i64, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let chunks = split_message(&message.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let markup = reply_markup_json(&message.markup);
        let last = chunks.len().saturating_sub(1);
        let timeout = self.send_timeout;

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_markup = if i == last { markup.as_ref() } else { None };
            with_retry(
                self.retry,
                timeout,
                "sendMessage",
                || self.send_message_chunk(chat_id, chunk, message.parse_mode, chunk_markup),
                || ChannelError::Timeout {
                    name: "telegram".into(),
                    timeout,
                },
            )
            .await?;
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

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

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
