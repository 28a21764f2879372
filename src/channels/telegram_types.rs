//! Telegram Bot API payload types (only the fields the bot reads).

use serde::{Deserialize, Serialize};

use super::channel::{IncomingMessage, ReplyMarkup};

/// One inbound update, as delivered by `getUpdates` or the webhook.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// The conversational part of the update, if it has one.
    ///
    /// Updates without a message (edits, callbacks, …) yield `None`. Channel
    /// posts have no sender; the chat id stands in for the user id.
    pub fn incoming(&self) -> Option<IncomingMessage> {
        let message = self.message.as_ref()?;
        let user_id = message.from.as_ref().map_or(message.chat.id, |u| u.id);
        let mut incoming = IncomingMessage::new(user_id, message.chat.id, message.text.as_deref());
        let name = message
            .from
            .as_ref()
            .and_then(|u| u.first_name.as_deref().or(u.username.as_deref()));
        if let Some(name) = name {
            incoming = incoming.with_user_name(name);
        }
        Some(incoming)
    }
}

/// Generic Bot API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// Render a reply markup as the Bot API's `reply_markup` object.
pub fn reply_markup_json(markup: &ReplyMarkup) -> Option<serde_json::Value> {
    match markup {
        ReplyMarkup::None => None,
        ReplyMarkup::Keyboard(buttons) => {
            let rows: Vec<serde_json::Value> = buttons
                .iter()
                .map(|text| serde_json::json!([{ "text": text }]))
                .collect();
            Some(serde_json::json!({
                "keyboard": rows,
                "resize_keyboard": true
            }))
        }
        ReplyMarkup::RemoveKeyboard => Some(serde_json::json!({ "remove_keyboard": true })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": {"id": 42, "is_bot": false, "first_name": "Jane", "username": "jdoe"},
                "chat": {"id": 4242, "type": "private"},
                "date": 1760000000,
                "text": "/start"
            }
        }))
        .unwrap();

        let incoming = update.incoming().unwrap();
        assert_eq!(incoming.user_id, 42);
        assert_eq!(incoming.chat_id, 4242);
        assert_eq!(incoming.text.as_deref(), Some("/start"));
        assert_eq!(incoming.user_name.as_deref(), Some("Jane"));
    }

    #[test]
    fn photo_update_has_no_text() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "from": {"id": 42, "username": "jdoe"},
                "chat": {"id": 4242},
                "photo": [{"file_id": "abc", "width": 90, "height": 90}]
            }
        }))
        .unwrap();

        let incoming = update.incoming().unwrap();
        assert_eq!(incoming.text, None);
        assert_eq!(incoming.user_name.as_deref(), Some("jdoe"));
    }

    #[test]
    fn update_without_message_is_ignored() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 12,
            "edited_message": {"message_id": 3, "chat": {"id": 1}, "text": "x"}
        }))
        .unwrap();
        assert!(update.incoming().is_none());
    }

    #[test]
    fn sender_falls_back_to_chat() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 13,
            "message": {"message_id": 4, "chat": {"id": -100}, "text": "hi"}
        }))
        .unwrap();
        let incoming = update.incoming().unwrap();
        assert_eq!(incoming.user_id, -100);
        assert_eq!(incoming.user_name, None);
    }

    #[test]
    fn keyboard_markup_json() {
        let json = reply_markup_json(&ReplyMarkup::keyboard(["Skip"])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"keyboard": [[{"text": "Skip"}]], "resize_keyboard": true})
        );
        assert_eq!(
            reply_markup_json(&ReplyMarkup::RemoveKeyboard).unwrap(),
            serde_json::json!({"remove_keyboard": true})
        );
        assert!(reply_markup_json(&ReplyMarkup::None).is_none());
    }

    #[test]
    fn api_error_envelope() {
        let resp: ApiResponse<bool> = serde_json::from_value(serde_json::json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        }))
        .unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.description.as_deref(), Some("Unauthorized"));
    }
}
