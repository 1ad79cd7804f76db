//! The chat-platform contract consumed by the lifecycle and the dispatch
//! loop's caller.
//!
//! Implementations live outside this crate (Telegram in
//! `multifeed-telegram`); tests use in-process fakes.

use async_trait::async_trait;
use thiserror::Error;

use multifeed_types::{ChannelRef, OwnerId};

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("channel {0} not found")]
    ChannelNotFound(String),
}

/// Trait for the chat platform the bot runs on.
///
/// `can_post` answers for the current moment; callers must not cache the
/// result across operations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve a syntactic channel reference (`@username`) to its canonical
    /// chat id and title.
    async fn resolve_channel(&self, reference: &str) -> Result<ChannelRef, TransportError>;

    /// Whether `actor` currently holds posting permission in the channel.
    async fn can_post(&self, channel_chat_id: i64, actor: OwnerId) -> Result<bool, TransportError>;

    /// Deliver a reply to a chat. Fire-and-forget from the core's
    /// perspective; the caller logs failures and never retries.
    async fn send_reply(
        &self,
        chat_id: i64,
        reply: &crate::format::Reply,
    ) -> Result<(), TransportError>;
}
