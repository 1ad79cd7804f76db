//! In-process redirection store.
//!
//! Backs tests and token-less dev runs. Matches the SQLite store's
//! semantics: monotonic never-reused ids, owner-scoped lookups, ascending
//! listings.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::Utc;

use multifeed_types::{ChannelRef, OwnerId, Redirection, RedirectionId};

use crate::{RedirectionStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    redirections: BTreeMap<i64, Redirection>,
    users: HashMap<i64, (Option<String>, i64)>,
}

/// A [`RedirectionStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("store mutex poisoned".into()))
    }

    /// Number of registered users. Test helper.
    pub fn user_count(&self) -> usize {
        self.inner.lock().map(|i| i.users.len()).unwrap_or(0)
    }
}

impl RedirectionStore for MemoryStore {
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        referral_seed: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner()?;
        inner
            .users
            .insert(chat_id, (username.map(str::to_string), referral_seed));
        Ok(())
    }

    fn create_redirection(
        &self,
        owner: OwnerId,
        source: &ChannelRef,
        destination: &ChannelRef,
    ) -> Result<Redirection, StoreError> {
        let mut inner = self.inner()?;
        inner.next_id += 1;
        let id = RedirectionId::new(inner.next_id);

        let redirection = Redirection {
            id,
            owner,
            source: source.clone(),
            destination: destination.clone(),
            active: false,
            created_at: Utc::now(),
            filter: None,
            transformations: Vec::new(),
        };
        inner.redirections.insert(id.as_i64(), redirection.clone());
        Ok(redirection)
    }

    fn find_redirection(
        &self,
        owner: OwnerId,
        id: RedirectionId,
    ) -> Result<Option<Redirection>, StoreError> {
        let inner = self.inner()?;
        Ok(inner
            .redirections
            .get(&id.as_i64())
            .filter(|r| r.owner == owner)
            .cloned())
    }

    fn find_duplicate(
        &self,
        owner: OwnerId,
        source_chat: i64,
        destination_chat: i64,
    ) -> Result<Option<Redirection>, StoreError> {
        let inner = self.inner()?;
        Ok(inner
            .redirections
            .values()
            .find(|r| {
                r.owner == owner
                    && r.source.chat_id == source_chat
                    && r.destination.chat_id == destination_chat
            })
            .cloned())
    }

    fn set_active(&self, id: RedirectionId, active: bool) -> Result<(), StoreError> {
        let mut inner = self.inner()?;
        match inner.redirections.get_mut(&id.as_i64()) {
            Some(r) => {
                r.active = active;
                Ok(())
            }
            None => Err(StoreError::Gone(id)),
        }
    }

    fn delete_redirection(&self, id: RedirectionId) -> Result<(), StoreError> {
        let mut inner = self.inner()?;
        inner.redirections.remove(&id.as_i64());
        Ok(())
    }

    fn list_redirections(&self, owner: OwnerId) -> Result<Vec<Redirection>, StoreError> {
        let inner = self.inner()?;
        // BTreeMap iteration order gives ascending ids.
        Ok(inner
            .redirections
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(chat_id: i64, reference: &str) -> ChannelRef {
        ChannelRef {
            chat_id,
            reference: reference.into(),
            title: reference.trim_start_matches('@').into(),
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let store = MemoryStore::new();
        let owner = OwnerId::new(42);

        let first = store
            .create_redirection(owner, &channel(-1, "@a"), &channel(-2, "@b"))
            .unwrap();
        store.delete_redirection(first.id).unwrap();
        let second = store
            .create_redirection(owner, &channel(-1, "@a"), &channel(-2, "@b"))
            .unwrap();

        assert!(second.id > first.id);
    }

    #[test]
    fn find_hides_foreign_records() {
        let store = MemoryStore::new();
        let created = store
            .create_redirection(OwnerId::new(42), &channel(-1, "@a"), &channel(-2, "@b"))
            .unwrap();

        assert!(store
            .find_redirection(OwnerId::new(7), created.id)
            .unwrap()
            .is_none());
        assert!(store
            .find_redirection(OwnerId::new(42), created.id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn list_ascending_by_id() {
        let store = MemoryStore::new();
        let owner = OwnerId::new(42);
        for i in 0..3 {
            store
                .create_redirection(
                    owner,
                    &channel(-10 - i, "@source"),
                    &channel(-20 - i, "@dest"),
                )
                .unwrap();
        }

        let ids: Vec<i64> = store
            .list_redirections(owner)
            .unwrap()
            .iter()
            .map(|r| r.id.as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn create_user_upserts() {
        let store = MemoryStore::new();
        store.create_user(42, Some("alice"), 1).unwrap();
        store.create_user(42, Some("alice2"), 2).unwrap();
        assert_eq!(store.user_count(), 1);
    }
}
