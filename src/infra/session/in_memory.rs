// In-memory implementation of SessionStore.
//
// Sessions only live as long as the process, which is exactly what the
// summarizer wants: credentials and selections are never written anywhere
// except the transient key file owned by the session itself.

use crate::core::session::{SessionState, SessionStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;

/// Maps Discord user id -> that user's form state.
///
/// DashMap lets concurrent commands from different users proceed without a
/// global lock.
pub struct InMemorySessionStore {
    sessions: DashMap<u64, SessionState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, user_id: u64) -> Result<SessionState, StoreError> {
        Ok(self
            .sessions
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn update<F, T>(&self, user_id: u64, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SessionState) -> T + Send,
        T: Send,
    {
        // The entry guard locks the user's shard until the change is applied
        let mut entry = self.sessions.entry(user_id).or_default();
        Ok(change(entry.value_mut()))
    }

    async fn clear(&self, user_id: u64) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(&user_id).is_some())
    }
}
