//! [`Transport`] implementation backed by the live Telegram Bot API.

use std::sync::Arc;

use async_trait::async_trait;

use multifeed_core::{Reply, ReplyMode, Transport, TransportError};
use multifeed_types::{ChannelRef, OwnerId};

use crate::api::{TelegramApi, TelegramError};

/// Telegram-backed transport: channel resolution via `getChat`, permission
/// checks via `getChatMember`, reply delivery via `sendMessage`.
///
/// Shares the API client with the poll loop.
pub struct TelegramTransport {
    api: Arc<TelegramApi>,
}

impl TelegramTransport {
    pub fn new(api: Arc<TelegramApi>) -> Self {
        Self { api }
    }
}

fn map_error(reference: Option<&str>, error: TelegramError) -> TransportError {
    match error {
        TelegramError::Http(e) => TransportError::Network(e.to_string()),
        TelegramError::Api(desc) => {
            // Telegram reports unknown chats as "Bad Request: chat not found".
            if let Some(reference) = reference {
                if desc.contains("chat not found") {
                    return TransportError::ChannelNotFound(reference.to_string());
                }
            }
            TransportError::Api(desc)
        }
    }
}

fn parse_mode(mode: ReplyMode) -> Option<&'static str> {
    match mode {
        ReplyMode::Plain => None,
        ReplyMode::Markdown => Some("Markdown"),
        ReplyMode::Html => Some("HTML"),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn resolve_channel(&self, reference: &str) -> Result<ChannelRef, TransportError> {
        let chat = self
            .api
            .get_chat(reference)
            .await
            .map_err(|e| map_error(Some(reference), e))?;

        let title = chat
            .title
            .or(chat.username)
            .unwrap_or_else(|| reference.trim_start_matches('@').to_string());

        Ok(ChannelRef {
            chat_id: chat.id,
            reference: reference.to_string(),
            title,
        })
    }

    async fn can_post(
        &self,
        channel_chat_id: i64,
        actor: OwnerId,
    ) -> Result<bool, TransportError> {
        match self.api.get_chat_member(channel_chat_id, actor.as_i64()).await {
            Ok(member) => Ok(member.may_post()),
            // An actor Telegram cannot find in the channel has no rights there.
            Err(TelegramError::Api(desc)) if desc.contains("not found") => Ok(false),
            Err(e) => Err(map_error(None, e)),
        }
    }

    async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<(), TransportError> {
        self.api
            .send_message(chat_id, &reply.text, parse_mode(reply.mode))
            .await
            .map_err(|e| map_error(None, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    async fn transport_for(server: &MockServer) -> TelegramTransport {
        TelegramTransport::new(Arc::new(TelegramApi::with_base_url(
            "test-token",
            &server.uri(),
        )))
    }

    #[tokio::test]
    async fn resolve_channel_builds_channel_ref() {
        let server = MockServer::start().await;
        Mock::given(matchers::path_regex(r"/bot.*/getChat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": -1009, "type": "channel", "title": "News Feed", "username": "news_feed"}
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let channel = transport.resolve_channel("@news_feed").await.unwrap();
        assert_eq!(channel.chat_id, -1009);
        assert_eq!(channel.reference, "@news_feed");
        assert_eq!(channel.title, "News Feed");
    }

    #[tokio::test]
    async fn unknown_chat_maps_to_channel_not_found() {
        let server = MockServer::start().await;
        Mock::given(matchers::path_regex(r"/bot.*/getChat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        match transport.resolve_channel("@missing_chan").await {
            Err(TransportError::ChannelNotFound(reference)) => {
                assert_eq!(reference, "@missing_chan");
            }
            other => panic!("expected ChannelNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn can_post_consults_member_status() {
        let server = MockServer::start().await;
        Mock::given(matchers::path_regex(r"/bot.*/getChatMember"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"status": "administrator", "can_post_messages": false}
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let allowed = transport.can_post(-1009, OwnerId::new(42)).await.unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn absent_member_cannot_post() {
        let server = MockServer::start().await;
        Mock::given(matchers::path_regex(r"/bot.*/getChatMember"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: user not found"
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let allowed = transport.can_post(-1009, OwnerId::new(42)).await.unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn send_reply_passes_parse_mode() {
        let server = MockServer::start().await;
        Mock::given(matchers::path_regex(r"/bot.*/sendMessage"))
            .and(matchers::body_partial_json(json!({"parse_mode": "HTML"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let reply = Reply::html("<code>[1]</code>");
        transport.send_reply(42, &reply).await.unwrap();
    }
}
