use crate::error::{Error, Result};
use crate::session::{SessionId, SessionRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// What happened to a session save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// The record held an expired token state and was not persisted
    Skipped,
}

/// Storage abstraction for host sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a session record by its ID
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Persist a session record under its ID
    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<SaveOutcome>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        (**self).load(id).await
    }

    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<SaveOutcome> {
        (**self).save(id, record).await
    }
}

/// Session store decorator that refuses to persist expired token states.
///
/// Two requests sharing a session can both start from the same token state.
/// When one of them refreshes and saves first, the other still holds the old
/// copy, which has expired by the time it saves. Dropping that write keeps the
/// refreshed state in the store. Every session save in the process must go
/// through this guard, so the host wraps its store once at construction.
#[derive(Debug, Clone)]
pub struct ExpiryGuard<S> {
    inner: S,
}

impl<S: SessionStore> ExpiryGuard<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for ExpiryGuard<S> {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        self.inner.load(id).await
    }

    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<SaveOutcome> {
        if record.has_expired_fuel() {
            tracing::warn!(
                session = %id,
                "did not store session because it contains an expired fuel token state"
            );
            return Ok(SaveOutcome::Skipped);
        }

        self.inner.save(id, record).await
    }
}

/// Process-local session store.
///
/// Records are kept until the process exits; nothing is evicted. Hosts that
/// serve many clients should put sessions in a store with its own expiry.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(sessions.get(id).cloned())
    }

    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<SaveOutcome> {
        self.sessions
            .write()
            .map_err(|e| Error::Storage(e.to_string()))?
            .insert(id.clone(), record.clone());
        Ok(SaveOutcome::Written)
    }
}
