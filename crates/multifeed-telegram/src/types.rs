//! Serde types for the Telegram Bot API.
//!
//! Only the fields this crate needs are deserialized; unknown fields are
//! ignored via `Option` and `#[serde(default)]`.

use serde::Deserialize;

/// Generic Telegram API response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub description: Option<String>,
    pub result: Option<T>,
}

/// A Telegram Update object from `getUpdates`.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// A Telegram Message.
#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

/// A Telegram User.
#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// A Telegram Chat. Covers both private chats (sender side) and channels
/// (resolution side).
#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// A chat member record from `getChatMember`.
#[derive(Debug, Deserialize)]
pub struct ChatMember {
    pub status: String,
    #[serde(default)]
    pub can_post_messages: Option<bool>,
}

impl ChatMember {
    /// Whether this member may post to the channel right now.
    ///
    /// Creators always can; administrators only with the explicit
    /// `can_post_messages` right. Every other status cannot post to a
    /// channel.
    pub fn may_post(&self) -> bool {
        match self.status.as_str() {
            "creator" => true,
            "administrator" => self.can_post_messages.unwrap_or(false),
            _ => false,
        }
    }
}

/// Sent message result (only message_id is used).
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}
