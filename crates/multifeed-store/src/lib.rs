//! Persistence layer for the MultiFeed redirection bot.
//!
//! [`RedirectionStore`] is the contract the command core drives; records are
//! keyed by owner and id. Two implementations:
//!
//! - [`SqliteStore`]: durable, WAL-mode SQLite
//! - [`MemoryStore`]: in-process, used by tests and token-less dev runs

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use multifeed_types::{ChannelRef, OwnerId, Redirection, RedirectionId};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("redirection {0} vanished mid-operation")]
    Gone(RedirectionId),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Durable record of users and redirections.
///
/// Implementations must assign unique, never-reused redirection ids and
/// return listings in ascending id order. All redirection lookups are
/// owner-scoped: a record owned by another operator is absent from the
/// caller's view.
pub trait RedirectionStore: Send + Sync {
    /// Register (or refresh) a user record. Called on `/start`.
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        referral_seed: i64,
    ) -> Result<(), StoreError>;

    /// Persist a new inactive redirection and return it with its assigned id.
    fn create_redirection(
        &self,
        owner: OwnerId,
        source: &ChannelRef,
        destination: &ChannelRef,
    ) -> Result<Redirection, StoreError>;

    /// Look up a redirection by owner and id.
    fn find_redirection(
        &self,
        owner: OwnerId,
        id: RedirectionId,
    ) -> Result<Option<Redirection>, StoreError>;

    /// Find a non-removed redirection with the same owner and channel pair.
    fn find_duplicate(
        &self,
        owner: OwnerId,
        source_chat: i64,
        destination_chat: i64,
    ) -> Result<Option<Redirection>, StoreError>;

    /// Flip the active flag of an existing redirection.
    fn set_active(&self, id: RedirectionId, active: bool) -> Result<(), StoreError>;

    /// Delete a redirection record permanently, with its extension data.
    fn delete_redirection(&self, id: RedirectionId) -> Result<(), StoreError>;

    /// All redirections of an owner, ascending by id. May be empty.
    fn list_redirections(&self, owner: OwnerId) -> Result<Vec<Redirection>, StoreError>;
}
