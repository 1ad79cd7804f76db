//! Telegram Bot API transport for the MultiFeed bot.
//!
//! Provides the HTTP client ([`TelegramApi`]), the [`Transport`]
//! implementation used by the command lifecycle, and the long-polling
//! loop that feeds inbound messages to the dispatcher.
//!
//! [`Transport`]: multifeed_core::Transport

pub mod api;
pub mod poller;
pub mod transport;
pub mod types;

pub use api::{TelegramApi, TelegramError};
pub use poller::poll_loop;
pub use transport::TelegramTransport;
