// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "session/mod.rs"]
pub mod session;

#[path = "storage/mod.rs"]
pub mod storage;

#[path = "summaries/mod.rs"]
pub mod summaries;
