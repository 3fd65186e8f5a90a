// Google OAuth2 helpers shared by the Google API clients.

pub mod service_account;

pub use service_account::{ServiceAccountAuth, STORAGE_READ_ONLY_SCOPE};
