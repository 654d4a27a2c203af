//! Research: questions become tasks, tasks walk the search providers, and
//! validated sources are aggregated per template.
//!
//! - [`task`]: the per-question state machine
//! - [`sources`]: source documents, URL normalisation and de-duplication
//! - [`orchestrator`]: bounded concurrent execution with fallback and timeout

pub mod orchestrator;
pub mod sources;
pub mod task;

pub use orchestrator::{
    NoOpResearchCallback, ResearchCallback, ResearchOrchestrator, ResearchOutcome,
    TemplateResearch,
};
pub use sources::{SourceAggregator, SourceDocument, normalize_url};
pub use task::{AttemptOutcome, ProviderAttempt, ResearchTask, TaskState, UnresolvedReason};
