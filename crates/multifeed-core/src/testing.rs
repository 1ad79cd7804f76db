//! In-process test doubles for the transport and store contracts.
//!
//! Used by this crate's unit and integration tests; kept public so
//! downstream crates can drive the dispatcher without a live platform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use multifeed_store::{MemoryStore, RedirectionStore, StoreError};
use multifeed_types::{ChannelRef, OwnerId, Redirection, RedirectionId};

use crate::format::Reply;
use crate::transport::{Transport, TransportError};

/// Whether the stub transport grants posting permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantMode {
    Granted,
    Denied,
}

#[derive(Default)]
struct StubState {
    channels: HashMap<String, i64>,
    next_chat_id: i64,
    replies: Vec<(i64, Reply)>,
}

/// A [`Transport`] fake: resolves any well-formed reference to a stable
/// synthetic chat id, answers permission checks from a switchable grant
/// mode, and records every reply sent through it.
pub struct StubTransport {
    grant: Mutex<GrantMode>,
    state: Mutex<StubState>,
    permission_checks: AtomicUsize,
}

impl StubTransport {
    pub fn new(grant: GrantMode) -> Self {
        Self {
            grant: Mutex::new(grant),
            state: Mutex::new(StubState::default()),
            permission_checks: AtomicUsize::new(0),
        }
    }

    /// Flip the permission answer for subsequent `can_post` calls.
    pub fn set_grant(&self, grant: GrantMode) {
        if let Ok(mut g) = self.grant.lock() {
            *g = grant;
        }
    }

    /// How many times `can_post` was consulted.
    pub fn permission_checks(&self) -> usize {
        self.permission_checks.load(Ordering::SeqCst)
    }

    /// Every reply sent through this transport, in order.
    pub fn sent_replies(&self) -> Vec<(i64, Reply)> {
        self.state.lock().map(|s| s.replies.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn resolve_channel(&self, reference: &str) -> Result<ChannelRef, TransportError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransportError::Api("stub state poisoned".into()))?;

        let chat_id = match state.channels.get(reference) {
            Some(id) => *id,
            None => {
                state.next_chat_id -= 1;
                let id = -1_000_000 + state.next_chat_id;
                state.channels.insert(reference.to_string(), id);
                id
            }
        };

        Ok(ChannelRef {
            chat_id,
            reference: reference.to_string(),
            title: reference.trim_start_matches('@').to_string(),
        })
    }

    async fn can_post(&self, _channel_chat_id: i64, _actor: OwnerId) -> Result<bool, TransportError> {
        self.permission_checks.fetch_add(1, Ordering::SeqCst);
        let granted = self
            .grant
            .lock()
            .map(|g| *g == GrantMode::Granted)
            .unwrap_or(false);
        Ok(granted)
    }

    async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<(), TransportError> {
        if let Ok(mut state) = self.state.lock() {
            state.replies.push((chat_id, reply.clone()));
        }
        Ok(())
    }
}

/// Wraps a [`MemoryStore`] and counts every store call, for assertions that
/// parse failures never reach storage.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total store calls across all operations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl RedirectionStore for CountingStore {
    fn create_user(
        &self,
        chat_id: i64,
        username: Option<&str>,
        referral_seed: i64,
    ) -> Result<(), StoreError> {
        self.count();
        self.inner.create_user(chat_id, username, referral_seed)
    }

    fn create_redirection(
        &self,
        owner: OwnerId,
        source: &ChannelRef,
        destination: &ChannelRef,
    ) -> Result<Redirection, StoreError> {
        self.count();
        self.inner.create_redirection(owner, source, destination)
    }

    fn find_redirection(
        &self,
        owner: OwnerId,
        id: RedirectionId,
    ) -> Result<Option<Redirection>, StoreError> {
        self.count();
        self.inner.find_redirection(owner, id)
    }

    fn find_duplicate(
        &self,
        owner: OwnerId,
        source_chat: i64,
        destination_chat: i64,
    ) -> Result<Option<Redirection>, StoreError> {
        self.count();
        self.inner.find_duplicate(owner, source_chat, destination_chat)
    }

    fn set_active(&self, id: RedirectionId, active: bool) -> Result<(), StoreError> {
        self.count();
        self.inner.set_active(id, active)
    }

    fn delete_redirection(&self, id: RedirectionId) -> Result<(), StoreError> {
        self.count();
        self.inner.delete_redirection(id)
    }

    fn list_redirections(&self, owner: OwnerId) -> Result<Vec<Redirection>, StoreError> {
        self.count();
        self.inner.list_redirections(owner)
    }
}

/// A store where every operation fails, for dispatcher degradation tests.
#[derive(Default)]
pub struct FailingStore;

impl FailingStore {
    fn fail<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Database("simulated outage".into()))
    }
}

impl RedirectionStore for FailingStore {
    fn create_user(&self, _: i64, _: Option<&str>, _: i64) -> Result<(), StoreError> {
        self.fail()
    }

    fn create_redirection(
        &self,
        _: OwnerId,
        _: &ChannelRef,
        _: &ChannelRef,
    ) -> Result<Redirection, StoreError> {
        self.fail()
    }

    fn find_redirection(
        &self,
        _: OwnerId,
        _: RedirectionId,
    ) -> Result<Option<Redirection>, StoreError> {
        self.fail()
    }

    fn find_duplicate(
        &self,
        _: OwnerId,
        _: i64,
        _: i64,
    ) -> Result<Option<Redirection>, StoreError> {
        self.fail()
    }

    fn set_active(&self, _: RedirectionId, _: bool) -> Result<(), StoreError> {
        self.fail()
    }

    fn delete_redirection(&self, _: RedirectionId) -> Result<(), StoreError> {
        self.fail()
    }

    fn list_redirections(&self, _: OwnerId) -> Result<Vec<Redirection>, StoreError> {
        self.fail()
    }
}
