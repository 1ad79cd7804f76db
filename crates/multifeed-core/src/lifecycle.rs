//! The redirection lifecycle state machine.
//!
//! Per redirection: `Created(inactive) -> Active <-> Inactive`, and both
//! states reach the terminal removal (absence from the store IS the terminal
//! state). All operations are owner-scoped; the uniqueness and permission
//! invariants are enforced here, under a key-scoped lock so the
//! read-then-write pair observes store state no older than the start of the
//! operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use multifeed_store::{RedirectionStore, StoreError};
use multifeed_types::{OwnerId, Redirection, RedirectionId};

use crate::transport::{Transport, TransportError};

/// Errors from lifecycle operations.
///
/// The first three variants are operator-recoverable and map to their own
/// reply text; `Store` and `Transport` degrade to a generic reply at the
/// dispatcher boundary.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("redirection already exists with id {existing}")]
    Duplicate { existing: RedirectionId },

    #[error("redirection {0} not found")]
    NotFound(RedirectionId),

    #[error("no posting permission in {destination}")]
    Permission { destination: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Async locks scoped to a string key.
///
/// Guards the read-then-write sequences in `add`, `activate`, `deactivate`
/// and `remove`. Guards release on drop, so every exit path (including
/// failure) unlocks. Entries are kept for the process lifetime; the map is
/// bounded by the set of distinct keys seen.
#[derive(Default)]
struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = match self.inner.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}

/// Drives redirections through create/activate/deactivate/remove.
///
/// Holds no redirection state across calls; the store exclusively owns the
/// records.
pub struct RedirectionLifecycle {
    store: Arc<dyn RedirectionStore>,
    transport: Arc<dyn Transport>,
    locks: KeyLocks,
}

impl RedirectionLifecycle {
    pub fn new(store: Arc<dyn RedirectionStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            locks: KeyLocks::default(),
        }
    }

    /// Create a new inactive redirection.
    ///
    /// Resolves both references through the transport, then -- under the
    /// pair lock -- checks for a duplicate and performs exactly one store
    /// write. The source channel deliberately requires no admin rights;
    /// only activation gates on destination permission.
    pub async fn add(
        &self,
        owner: OwnerId,
        source_ref: &str,
        destination_ref: &str,
    ) -> Result<Redirection, LifecycleError> {
        let source = self.transport.resolve_channel(source_ref).await?;
        let destination = self.transport.resolve_channel(destination_ref).await?;

        let _guard = self
            .locks
            .acquire(format!(
                "pair:{owner}:{}:{}",
                source.chat_id, destination.chat_id
            ))
            .await;

        if let Some(existing) = self
            .store
            .find_duplicate(owner, source.chat_id, destination.chat_id)?
        {
            return Err(LifecycleError::Duplicate {
                existing: existing.id,
            });
        }

        let created = self.store.create_redirection(owner, &source, &destination)?;
        info!(
            owner = %owner,
            id = %created.id,
            source = %created.source.reference,
            destination = %created.destination.reference,
            "redirection created"
        );
        Ok(created)
    }

    /// Enable a redirection, gated on a fresh destination permission check.
    ///
    /// The check is re-evaluated on every call; a prior activation proves
    /// nothing about the current permission state.
    pub async fn activate(
        &self,
        owner: OwnerId,
        id: RedirectionId,
    ) -> Result<(), LifecycleError> {
        let _guard = self.locks.acquire(format!("id:{owner}:{id}")).await;

        let redirection = self
            .store
            .find_redirection(owner, id)?
            .ok_or(LifecycleError::NotFound(id))?;

        let granted = self
            .transport
            .can_post(redirection.destination.chat_id, owner)
            .await?;
        if !granted {
            warn!(owner = %owner, id = %id, "activation denied: no posting permission");
            return Err(LifecycleError::Permission {
                destination: redirection.destination.title,
            });
        }

        self.store.set_active(id, true)?;
        info!(owner = %owner, id = %id, "redirection activated");
        Ok(())
    }

    /// Disable a redirection. No permission check is needed to turn a relay
    /// off. Idempotent: deactivating an inactive redirection succeeds.
    pub async fn deactivate(
        &self,
        owner: OwnerId,
        id: RedirectionId,
    ) -> Result<(), LifecycleError> {
        let _guard = self.locks.acquire(format!("id:{owner}:{id}")).await;

        self.store
            .find_redirection(owner, id)?
            .ok_or(LifecycleError::NotFound(id))?;

        self.store.set_active(id, false)?;
        info!(owner = %owner, id = %id, "redirection deactivated");
        Ok(())
    }

    /// Delete a redirection permanently.
    ///
    /// Not idempotent: a second remove surfaces `NotFound` so the caller
    /// knows no further action occurred.
    pub async fn remove(&self, owner: OwnerId, id: RedirectionId) -> Result<(), LifecycleError> {
        let _guard = self.locks.acquire(format!("id:{owner}:{id}")).await;

        self.store
            .find_redirection(owner, id)?
            .ok_or(LifecycleError::NotFound(id))?;

        self.store.delete_redirection(id)?;
        info!(owner = %owner, id = %id, "redirection removed");
        Ok(())
    }

    /// All redirections of the owner, ascending by id.
    pub fn list(&self, owner: OwnerId) -> Result<Vec<Redirection>, LifecycleError> {
        Ok(self.store.list_redirections(owner)?)
    }

    pub(crate) fn store(&self) -> &Arc<dyn RedirectionStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GrantMode, StubTransport};
    use multifeed_store::MemoryStore;

    fn lifecycle(grant: GrantMode) -> RedirectionLifecycle {
        RedirectionLifecycle::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StubTransport::new(grant)),
        )
    }

    const OWNER: OwnerId = OwnerId::new(42);

    #[tokio::test]
    async fn add_creates_inactive_redirection() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        assert!(!created.active);
        assert_eq!(created.source.reference, "@source_chan");
        assert_eq!(created.destination.reference, "@dest_chan");
        assert!(!created.source.title.is_empty());
    }

    #[tokio::test]
    async fn add_twice_yields_one_record_and_one_duplicate() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        match lifecycle.add(OWNER, "@source_chan", "@dest_chan").await {
            Err(LifecycleError::Duplicate { existing }) => assert_eq!(existing, created.id),
            other => panic!("expected Duplicate, got {other:?}"),
        }

        assert_eq!(lifecycle.list(OWNER).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_pair_different_owner_is_not_a_duplicate() {
        let lifecycle = lifecycle(GrantMode::Granted);
        lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();
        lifecycle
            .add(OwnerId::new(7), "@source_chan", "@dest_chan")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn activate_with_permission_granted() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        lifecycle.activate(OWNER, created.id).await.unwrap();
        let listed = lifecycle.list(OWNER).unwrap();
        assert!(listed[0].active);
    }

    #[tokio::test]
    async fn activate_denied_leaves_inactive() {
        let lifecycle = lifecycle(GrantMode::Denied);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        match lifecycle.activate(OWNER, created.id).await {
            Err(LifecycleError::Permission { destination }) => {
                assert_eq!(destination, "dest_chan");
            }
            other => panic!("expected Permission, got {other:?}"),
        }
        assert!(!lifecycle.list(OWNER).unwrap()[0].active);
    }

    #[tokio::test]
    async fn permission_is_reevaluated_every_activation() {
        let transport = Arc::new(StubTransport::new(GrantMode::Granted));
        let lifecycle = RedirectionLifecycle::new(Arc::new(MemoryStore::new()), transport.clone());
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        lifecycle.activate(OWNER, created.id).await.unwrap();
        lifecycle.deactivate(OWNER, created.id).await.unwrap();

        // Permission revoked between activations.
        transport.set_grant(GrantMode::Denied);
        assert!(matches!(
            lifecycle.activate(OWNER, created.id).await,
            Err(LifecycleError::Permission { .. })
        ));
        assert_eq!(transport.permission_checks(), 2);
    }

    #[tokio::test]
    async fn activate_unknown_id_is_not_found() {
        let lifecycle = lifecycle(GrantMode::Granted);
        assert!(matches!(
            lifecycle.activate(OWNER, RedirectionId::new(9)).await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn foreign_redirection_is_not_found() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        let stranger = OwnerId::new(7);
        assert!(matches!(
            lifecycle.activate(stranger, created.id).await,
            Err(LifecycleError::NotFound(_))
        ));
        assert!(matches!(
            lifecycle.remove(stranger, created.id).await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        lifecycle.deactivate(OWNER, created.id).await.unwrap();
        lifecycle.deactivate(OWNER, created.id).await.unwrap();
        assert!(!lifecycle.list(OWNER).unwrap()[0].active);
    }

    #[tokio::test]
    async fn remove_is_terminal_and_not_idempotent() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let created = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();

        lifecycle.remove(OWNER, created.id).await.unwrap();

        for result in [
            lifecycle.remove(OWNER, created.id).await,
            lifecycle.activate(OWNER, created.id).await,
            lifecycle.deactivate(OWNER, created.id).await,
        ] {
            assert!(matches!(result, Err(LifecycleError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn removed_pair_can_be_added_again_with_new_id() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let first = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();
        lifecycle.remove(OWNER, first.id).await.unwrap();

        let second = lifecycle.add(OWNER, "@source_chan", "@dest_chan").await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn list_is_ordered_and_scoped() {
        let lifecycle = lifecycle(GrantMode::Granted);
        let a = lifecycle.add(OWNER, "@chan_aa", "@chan_bb").await.unwrap();
        let b = lifecycle.add(OWNER, "@chan_cc", "@chan_dd").await.unwrap();
        lifecycle
            .add(OwnerId::new(7), "@chan_ee", "@chan_ff")
            .await
            .unwrap();

        let ids: Vec<RedirectionId> = lifecycle.list(OWNER).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        assert!(lifecycle.list(OwnerId::new(1)).unwrap().is_empty());
    }
}
