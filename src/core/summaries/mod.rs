pub mod summary_models;
pub mod summary_provider;
pub mod summary_service;

pub use summary_models::SummaryStyle;
pub use summary_provider::{ProviderError, SummaryProvider};
pub use summary_service::{SummaryError, SummaryService};
