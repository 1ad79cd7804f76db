//! Command interpretation and redirection lifecycle for the MultiFeed bot.
//!
//! Inbound text flows through the crate as a pure pipeline:
//!
//! ```text
//! text -> command::classify/parse -> dispatch::CommandDispatcher
//!      -> lifecycle::RedirectionLifecycle -> RedirectionStore / Transport
//!      -> format::Reply
//! ```
//!
//! # Architecture
//!
//! - [`command`]: the command vocabulary, classification, and argument parsing
//! - [`lifecycle`]: the create/activate/deactivate/remove state machine
//! - [`dispatch`]: routes parsed commands and converts every outcome to a reply
//! - [`format`]: reply payloads and user-facing text
//! - [`transport`]: the chat-platform contract consumed by lifecycle and caller

pub mod command;
pub mod dispatch;
pub mod format;
pub mod lifecycle;
pub mod testing;
pub mod transport;

pub use command::{classify, Command, CommandError, CommandSpec};
pub use dispatch::{CommandDispatcher, SenderContext};
pub use format::{Reply, ReplyMode};
pub use lifecycle::{LifecycleError, RedirectionLifecycle};
pub use transport::{Transport, TransportError};
