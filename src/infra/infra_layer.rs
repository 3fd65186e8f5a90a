// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "google_auth/mod.rs"]
pub mod google_auth;

#[path = "session/mod.rs"]
pub mod session;

#[path = "storage/mod.rs"]
pub mod storage;

#[cfg(test)]
#[path = "test_http.rs"]
pub mod test_http;
