//! Telegram Bot API payload types delivered to consumers.
//!
//! Only the fields courier itself reads are typed; everything else is kept
//! in `extra` so handlers see the full object the API sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound unit from the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Present for polled updates; webhook pushes may omit it.
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// Chat type: "private", "group", "supergroup", or "channel".
    #[serde(default, rename = "type")]
    pub chat_type: String,
}

/// The authenticated bot, as reported by `getMe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}

impl BotIdentity {
    /// Build from a `getMe` result. Bots always carry a username.
    pub fn from_user(user: &User) -> Option<Self> {
        user.username.as_ref().map(|username| Self {
            id: user.id,
            username: username.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_with_message() {
        let json = r#"{
            "update_id": 7,
            "message": {
                "message_id": 1,
                "from": {"id": 5, "is_bot": false, "first_name": "Ann", "username": "ann"},
                "chat": {"id": 100, "type": "private"},
                "date": 1700000000,
                "text": "hi"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, Some(7));
        let msg = update.message.unwrap();
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.chat.chat_type, "private");
        assert_eq!(msg.extra["date"], 1700000000);
        assert!(update.inline_query.is_none());
    }

    #[test]
    fn test_update_with_inline_query() {
        let json = r#"{
            "update_id": 8,
            "inline_query": {"id": "q1", "from": {"id": 5, "first_name": "Ann"}, "query": "cats", "offset": ""}
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let query = update.inline_query.unwrap();
        assert_eq!(query.id, "q1");
        assert_eq!(query.query, "cats");
        assert!(update.message.is_none());
    }

    #[test]
    fn test_webhook_update_without_id() {
        let update: Update = serde_json::from_str("{}").unwrap();
        assert!(update.update_id.is_none());
        assert!(update.message.is_none());
    }

    #[test]
    fn test_unknown_update_kinds_kept_in_extra() {
        let json = r#"{"update_id": 9, "callback_query": {"id": "c"}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.extra.contains_key("callback_query"));
    }

    #[test]
    fn test_identity_from_user() {
        let user: User =
            serde_json::from_str(r#"{"id": 1, "is_bot": true, "first_name": "B", "username": "mybot"}"#)
                .unwrap();
        let identity = BotIdentity::from_user(&user).unwrap();
        assert_eq!(identity.username, "mybot");

        let anon: User = serde_json::from_str(r#"{"id": 2, "first_name": "X"}"#).unwrap();
        assert!(BotIdentity::from_user(&anon).is_none());
    }
}
