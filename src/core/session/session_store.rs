use super::session_models::SessionState;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
#[allow(dead_code)] // The in-memory store never fails
pub enum StoreError {
    #[error("Session storage unavailable: {0}")]
    Unavailable(String),
}

/// Per-user session persistence. Users without a stored session get the
/// default state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, user_id: u64) -> Result<SessionState, StoreError>;
    /// Applies `change` to the user's session as one step, starting from the
    /// default state when the user has none. Concurrent updates for the same
    /// user never overwrite each other.
    async fn update<F, T>(&self, user_id: u64, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SessionState) -> T + Send,
        T: Send;
    /// Returns whether a session existed.
    async fn clear(&self, user_id: u64) -> Result<bool, StoreError>;
}
