//! # Pitchcraft Core
//!
//! Research-backed proposal drafting. Turns plain RFP text plus consultant
//! preferences into an ordered, slot-filled slide draft: requirements are
//! extracted, matched to a fixed template catalog, researched across search
//! providers with validation and fallback, and composed into slides whose
//! gaps are reported rather than hidden.

pub mod composer;
pub mod config;
pub mod error;
pub mod extractor;
pub mod persistence;
pub mod pipeline;
pub mod providers;
pub mod questions;
pub mod research;
pub mod templates;
pub mod text;
pub mod types;

// Re-export commonly used types at the crate root.
pub use composer::{
    DraftComposer, DraftSlide, ProposalDraft, SlideStatus, SlotValue, UNRESOLVED_MARKER,
};
pub use config::{PipelineConfig, load_config};
pub use error::{ExtractionError, ModelError, PitchcraftError, ProviderError, Result};
pub use extractor::RequirementExtractor;
pub use pipeline::{NoOpCallback, PipelineCallback, PipelineStage, ProposalPipeline};
pub use providers::{LanguageModel, SearchHit, SearchProvider};
pub use questions::{QuestionGenerator, ResearchQuestion};
pub use research::{ResearchOrchestrator, ResearchOutcome, ResearchTask, SourceDocument, TaskState};
pub use templates::{TemplateKind, TemplateMatcher, TemplateSelection};
pub use types::{
    Branding, ClientPreferences, DepthTier, RequirementCategory, RequirementItem, RfpInput, Tone,
};
