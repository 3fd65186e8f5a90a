// Discord commands module.
// Each feature gets its own command file.

pub mod summarizer;

// Bot presence management
pub mod presence;

use crate::core::session::SessionService;
use crate::core::summaries::SummaryService;
use crate::infra::ai::GeminiClient;
use crate::infra::session::InMemorySessionStore;
use crate::infra::storage::GcsClient;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
/// This is where we store our services and configuration.
pub struct Data {
    pub sessions: Arc<SessionService<InMemorySessionStore>>,
    pub summaries: Arc<SummaryService<GcsClient, GeminiClient>>,
}
