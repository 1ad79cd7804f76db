//! Raw HTTP calls to the Telegram Bot API.
//!
//! Wraps reqwest for `sendMessage`, `getUpdates`, `getChat`, and
//! `getChatMember`. All methods return typed responses.

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::types::{ApiResponse, Chat, ChatMember, SentMessage, Update};

/// Errors from Telegram API calls.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    Api(String),
}

/// Low-level Telegram Bot API client.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    /// Create a new API client for the given bot token.
    pub fn new(bot_token: &str) -> Self {
        Self::with_base_url(bot_token, "https://api.telegram.org")
    }

    /// Create a new API client with a custom base URL (for testing).
    pub fn with_base_url(bot_token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", base_url.trim_end_matches('/'), bot_token),
        }
    }

    /// Send a text message to a chat.
    ///
    /// Returns the sent message's ID on success.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<i64, TelegramError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode);
        }

        debug!("sendMessage to chat_id={chat_id}");

        let resp = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&body)
            .send()
            .await?;

        let api_resp: ApiResponse<SentMessage> = resp.json().await?;
        if !api_resp.ok {
            let desc = api_resp.description.unwrap_or_default();
            warn!("sendMessage failed: {desc}");
            return Err(TelegramError::Api(desc));
        }

        Ok(api_resp.result.map(|m| m.message_id).unwrap_or(0))
    }

    /// Long-poll for new updates.
    ///
    /// `offset` should be set to `last_update_id + 1` to acknowledge
    /// previously received updates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout,
            "allowed_updates": ["message"],
        });
        if let Some(off) = offset {
            body["offset"] = json!(off);
        }

        let resp = self
            .client
            .post(format!("{}/getUpdates", self.base_url))
            .json(&body)
            .send()
            .await?;

        let api_resp: ApiResponse<Vec<Update>> = resp.json().await?;
        if !api_resp.ok {
            let desc = api_resp.description.unwrap_or_default();
            return Err(TelegramError::Api(desc));
        }

        Ok(api_resp.result.unwrap_or_default())
    }

    /// Resolve a chat by `@username` reference.
    pub async fn get_chat(&self, reference: &str) -> Result<Chat, TelegramError> {
        let resp = self
            .client
            .post(format!("{}/getChat", self.base_url))
            .json(&json!({ "chat_id": reference }))
            .send()
            .await?;

        let api_resp: ApiResponse<Chat> = resp.json().await?;
        if !api_resp.ok {
            let desc = api_resp.description.unwrap_or_default();
            warn!("getChat {reference} failed: {desc}");
            return Err(TelegramError::Api(desc));
        }

        api_resp
            .result
            .ok_or_else(|| TelegramError::Api("getChat returned no result".into()))
    }

    /// Fetch one member's standing in a chat.
    pub async fn get_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<ChatMember, TelegramError> {
        let resp = self
            .client
            .post(format!("{}/getChatMember", self.base_url))
            .json(&json!({ "chat_id": chat_id, "user_id": user_id }))
            .send()
            .await?;

        let api_resp: ApiResponse<ChatMember> = resp.json().await?;
        if !api_resp.ok {
            let desc = api_resp.description.unwrap_or_default();
            return Err(TelegramError::Api(desc));
        }

        api_resp
            .result
            .ok_or_else(|| TelegramError::Api("getChatMember returned no result".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn send_message_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path_regex(r"/bot.*/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 777}
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_base_url("test-token", &server.uri());
        let id = api.send_message(42, "hello", Some("HTML")).await.unwrap();
        assert_eq!(id, 777);
    }

    #[tokio::test]
    async fn send_message_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path_regex(r"/bot.*/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_base_url("test-token", &server.uri());
        match api.send_message(42, "hello", None).await {
            Err(TelegramError::Api(desc)) => assert!(desc.contains("blocked")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_updates_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path_regex(r"/bot.*/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 5,
                    "message": {
                        "message_id": 1,
                        "chat": {"id": 42, "type": "private"},
                        "text": "/list"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_base_url("test-token", &server.uri());
        let updates = api.get_updates(None, 0).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 5);
    }

    #[tokio::test]
    async fn get_chat_resolves_channel() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path_regex(r"/bot.*/getChat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": -1001234, "type": "channel", "title": "My Channel"}
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_base_url("test-token", &server.uri());
        let chat = api.get_chat("@my_channel").await.unwrap();
        assert_eq!(chat.id, -1001234);
        assert_eq!(chat.title.unwrap(), "My Channel");
    }

    #[tokio::test]
    async fn get_chat_member_maps_admin_rights() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path_regex(r"/bot.*/getChatMember"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"status": "administrator", "can_post_messages": true}
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_base_url("test-token", &server.uri());
        let member = api.get_chat_member(-1001234, 42).await.unwrap();
        assert!(member.may_post());
    }
}
