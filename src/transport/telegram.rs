//! Telegram transport — long-polls the Bot API for updates.
//!
//! Produces the inbound [`InboundEvent`] stream (text messages, inline-button
//! callback queries, voice notes) and implements the outbound [`Transport`]
//! surface with inline keyboards and voice uploads.

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::multipart::{Form, Part};

use crate::error::TransportError;
use crate::event::{Button, ButtonAction, ButtonMenu, InboundEvent};
use crate::transport::{EventSource, Transport};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram transport — connects to the Bot API via long-polling.
pub struct TelegramTransport {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Verify the token against getMe before polling.
    pub async fn health_check(&self) -> Result<(), TransportError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::PollFailed(format!(
                "getMe returned {}",
                resp.status()
            )))
        }
    }

    /// Show the typing indicator while a reply is being generated.
    pub async fn send_typing(&self, user_id: &str) {
        let _ = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&serde_json::json!({
                "chat_id": user_id,
                "action": "typing"
            }))
            .send()
            .await;
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with
    /// plain-text fallback, optionally with an inline keyboard.
    async fn send_chunk(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&serde_json::Value>,
    ) -> Result<(), TransportError> {
        let mut markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });
        if let Some(kb) = keyboard {
            markdown_body["reply_markup"] = kb.clone();
        }

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                user_id: chat_id.into(),
                reason: e.to_string(),
            })?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        let _markdown_err = markdown_resp.text().await.unwrap_or_default();
        tracing::warn!(
            status = ?markdown_status,
            "sendMessage with Markdown failed; retrying without parse_mode"
        );

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            plain_body["reply_markup"] = kb.clone();
        }
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                user_id: chat_id.into(),
                reason: e.to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed {
                user_id: chat_id.into(),
                reason: format!(
                    "sendMessage failed (markdown: {markdown_status}, plain: {plain_err})"
                ),
            });
        }

        Ok(())
    }

    /// Acknowledge a callback query so the client stops its spinner.
    async fn answer_callback(&self, callback_query_id: &str) {
        let _ = self
            .client
            .post(self.api_url("answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": callback_query_id }))
            .send()
            .await;
    }
}

/// Inline keyboard wire format for reply_markup.
fn keyboard_json(menu: &ButtonMenu) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = menu
        .rows
        .iter()
        .map(|row| row.iter().map(button_json).collect())
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

fn button_json(button: &Button) -> serde_json::Value {
    match &button.action {
        ButtonAction::Callback(data) => serde_json::json!({
            "text": button.label,
            "callback_data": data,
        }),
        ButtonAction::Url(url) => serde_json::json!({
            "text": button.label,
            "url": url,
        }),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, user_id: &str, text: &str) -> Result<(), TransportError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(user_id, &chunk, None).await?;
        }
        Ok(())
    }

    async fn send_menu(
        &self,
        user_id: &str,
        text: &str,
        menu: &ButtonMenu,
    ) -> Result<(), TransportError> {
        let keyboard = keyboard_json(menu);
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len() - 1;
        // The keyboard rides on the final chunk only.
        for (i, chunk) in chunks.iter().enumerate() {
            let kb = (i == last).then_some(&keyboard);
            self.send_chunk(user_id, chunk, kb).await?;
        }
        Ok(())
    }

    async fn send_voice(
        &self,
        user_id: &str,
        audio: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        let part = Part::bytes(audio).file_name("voice.mp3".to_string());
        let mut form = Form::new()
            .text("chat_id", user_id.to_string())
            .part("voice", part);
        if !caption.is_empty() {
            form = form.text("caption", caption.to_string());
        }

        let resp = self
            .client
            .post(self.api_url("sendVoice"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                user_id: user_id.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed {
                user_id: user_id.into(),
                reason: format!("sendVoice failed: {err}"),
            });
        }

        tracing::info!(user_id, "voice message sent");
        Ok(())
    }
}

impl EventSource for TelegramTransport {
    fn start(&self) -> BoxStream<'static, InboundEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("telegram transport listening for updates");

            loop {
                let url = format!("https://api.telegram.org/bot{bot_token}/getUpdates");
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                    for update in results {
                        if let Some(uid) =
                            update.get("update_id").and_then(serde_json::Value::as_i64)
                        {
                            offset = uid + 1;
                        }

                        // Acknowledge callbacks inline; the event itself is
                        // routed like any other.
                        if let Some(query_id) = update
                            .get("callback_query")
                            .and_then(|q| q.get("id"))
                            .and_then(serde_json::Value::as_str)
                        {
                            let transport = TelegramTransport {
                                bot_token: bot_token.clone(),
                                client: client.clone(),
                            };
                            transport.answer_callback(query_id).await;
                        }

                        let Some(event) = parse_update(update) else {
                            continue;
                        };

                        if tx.send(event).is_err() {
                            tracing::info!("telegram listener channel closed");
                            return;
                        }
                    }
                }
            }
        });

        let stream =
            futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) });

        Box::pin(stream)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Turn one getUpdates entry into an event, if it carries anything we route.
fn parse_update(update: &serde_json::Value) -> Option<InboundEvent> {
    if let Some(query) = update.get("callback_query") {
        let user_id = query
            .get("from")
            .and_then(|f| f.get("id"))
            .and_then(serde_json::Value::as_i64)?
            .to_string();
        let data = query.get("data").and_then(serde_json::Value::as_str)?;

        let mut event = InboundEvent::button(user_id, data);
        if let Some(name) = query
            .get("from")
            .and_then(|f| f.get("first_name"))
            .and_then(serde_json::Value::as_str)
        {
            event = event.with_user_name(name);
        }
        return Some(event);
    }

    let message = update.get("message")?;
    let user_id = message
        .get("from")
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)?
        .to_string();
    let first_name = message
        .get("from")
        .and_then(|f| f.get("first_name"))
        .and_then(serde_json::Value::as_str);

    let mut event = if let Some(text) = message.get("text").and_then(serde_json::Value::as_str) {
        InboundEvent::text(user_id, text)
    } else if let Some(file_id) = message
        .get("voice")
        .and_then(|v| v.get("file_id"))
        .and_then(serde_json::Value::as_str)
    {
        InboundEvent {
            user_id,
            user_name: None,
            kind: crate::event::EventKind::Voice(file_id.to_string()),
        }
    } else {
        return None;
    };

    if let Some(name) = first_name {
        event = event.with_user_name(name);
    }
    Some(event)
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

        // Floor the cut to a UTF-8 boundary; Cyrillic text is two bytes
        // per character and a mid-character slice panics.
        let mut cut = max_len;
        while cut > 0 && !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // Limit smaller than the first character: take it whole.
            cut = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn api_url_formats_token() {
        let transport = TelegramTransport::new("123:ABC".into());
        assert_eq!(
            transport.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_text_message() {
        let update = serde_json::json!({
            "update_id": 10,
            "message": {
                "from": { "id": 42, "first_name": "Anna" },
                "chat": { "id": 42 },
                "text": "hello"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.user_id, "42");
        assert_eq!(event.user_name.as_deref(), Some("Anna"));
        assert_eq!(event.kind, EventKind::Text("hello".into()));
    }

    #[test]
    fn parse_callback_query() {
        let update = serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 42 },
                "data": "answer_0_a"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.kind, EventKind::Button("answer_0_a".into()));
    }

    #[test]
    fn parse_voice_note() {
        let update = serde_json::json!({
            "update_id": 12,
            "message": {
                "from": { "id": 42 },
                "voice": { "file_id": "file-abc", "duration": 3 }
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.kind, EventKind::Voice("file-abc".into()));
    }

    #[test]
    fn parse_ignores_stickers() {
        let update = serde_json::json!({
            "update_id": 13,
            "message": {
                "from": { "id": 42 },
                "sticker": { "file_id": "sticker-1" }
            }
        });
        assert!(parse_update(&update).is_none());
    }

    // ── Keyboard wire format ────────────────────────────────────────

    #[test]
    fn keyboard_json_callback_and_url() {
        let menu = ButtonMenu::rows(vec![vec![
            Button::callback("Yes", "yes"),
            Button::url("Pay", "https://pay.example/1"),
        ]]);
        let kb = keyboard_json(&menu);
        assert_eq!(kb["inline_keyboard"][0][0]["callback_data"], "yes");
        assert_eq!(kb["inline_keyboard"][0][1]["url"], "https://pay.example/1");
        assert!(kb["inline_keyboard"][0][1].get("callback_data").is_none());
    }

    // ── Message splitting ───────────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_multibyte_no_split_point() {
        // One ASCII char pushes every following two-byte character off the
        // byte grid, so a naive byte-offset cut lands mid-character.
        let msg = format!("a{}", "ж".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 4096);
        }
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn split_message_floors_cut_to_char_boundary() {
        assert_eq!(split_message("жж", 3), vec!["ж", "ж"]);
        assert_eq!(split_message("привет мир", 12), vec!["привет", "мир"]);
    }

    #[test]
    fn split_message_never_exceeds_limit() {
        let msg = "word ".repeat(3000);
        for chunk in split_message(&msg, 4096) {
            assert!(chunk.len() <= 4096);
        }
    }
}
