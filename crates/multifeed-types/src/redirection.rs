//! The redirection data model.
//!
//! A [`Redirection`] is a configured one-way relay from a source channel to
//! a destination channel, exclusively owned by the store. The lifecycle
//! component holds a record only for the duration of one operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{OwnerId, RedirectionId};

/// A channel reference resolved to its canonical chat id.
///
/// `reference` keeps the handle the operator typed (normalized to
/// `@username` form); `title` is the display name captured at resolution
/// time for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub chat_id: i64,
    pub reference: String,
    pub title: String,
}

/// Per-kind relay filter attached to a redirection.
///
/// Extension point for the forwarding pipeline: the pipeline (not part of
/// this crate) consults these flags to decide which messages to relay.
/// Nothing in the command core evaluates them yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPolicy {
    pub audio: bool,
    pub video: bool,
    pub photo: bool,
    pub sticker: bool,
    pub document: bool,
    pub hashtag: bool,
    pub link: bool,
    /// Relay only messages containing one of these words. Empty means no
    /// constraint.
    pub contain: Vec<String>,
    /// Drop messages containing any of these words.
    pub not_contain: Vec<String>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            photo: true,
            sticker: true,
            document: true,
            hashtag: true,
            link: true,
            contain: Vec::new(),
            not_contain: Vec::new(),
        }
    }
}

/// An ordered phrase rewrite applied by the forwarding pipeline.
///
/// `rank` orders transformations within one redirection; ranks are swappable
/// without rewriting the records. Same extension-point status as
/// [`FilterPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub id: i64,
    pub rank: i64,
    pub old_phrase: String,
    pub new_phrase: String,
}

/// A configured one-way relay from `source` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirection {
    pub id: RedirectionId,
    pub owner: OwnerId,
    pub source: ChannelRef,
    pub destination: ChannelRef,
    /// Whether the relay is currently forwarding. Defaults to `false` at
    /// creation; only flipped on through a verified permission check.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,
}
