pub mod session_models;
pub mod session_service;
pub mod session_store;

pub use session_models::SessionState;
pub use session_service::{SessionError, SessionService};
pub use session_store::{SessionStore, StoreError};
