//! Shared types for the MultiFeed redirection bot.
//!
//! Holds the data model ([`Redirection`] and its extension data), the
//! strongly-typed identifiers, and configuration loading. No I/O beyond
//! reading the config file.

pub mod config;
pub mod ids;
pub mod redirection;

pub use config::{BotConfig, ConfigError};
pub use ids::{OwnerId, RedirectionId};
pub use redirection::{ChannelRef, FilterPolicy, Redirection, Transformation};
