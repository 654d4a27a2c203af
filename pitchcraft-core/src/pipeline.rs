//! Proposal pipeline: the sequential flow from RFP text to draft.
//!
//! Extractor → Matcher → Question Generator → Research Orchestrator →
//! Draft Composer. Only extraction can fail the run; everything downstream
//! records its failures in the draft.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::composer::{DraftComposer, ProposalDraft};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, Result};
use crate::extractor::RequirementExtractor;
use crate::providers::{self, LanguageModel, SearchProvider};
use crate::questions::{QuestionGenerator, ResearchQuestion};
use crate::research::{ResearchCallback, ResearchOrchestrator};
use crate::templates::{TemplateMatcher, TemplateSelection};
use crate::types::{ClientPreferences, RequirementItem, RfpInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Extracting,
    Matching,
    GeneratingQuestions,
    Researching,
    Composing,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Extracting => "extracting requirements",
            Self::Matching => "matching templates",
            Self::GeneratingQuestions => "generating research questions",
            Self::Researching => "researching",
            Self::Composing => "composing draft",
        };
        f.write_str(s)
    }
}

/// Progress notifications for a pipeline run. All methods default to no-ops.
pub trait PipelineCallback: ResearchCallback {
    fn on_stage(&self, _stage: PipelineStage) {}

    fn on_requirements(&self, _requirements: &[RequirementItem]) {}

    fn on_selection(&self, _selection: &TemplateSelection) {}

    fn on_questions(&self, _questions: &[ResearchQuestion]) {}
}

/// A [`PipelineCallback`] that ignores everything.
pub struct NoOpCallback;

impl ResearchCallback for NoOpCallback {}
impl PipelineCallback for NoOpCallback {}

pub struct ProposalPipeline {
    extractor: RequirementExtractor,
    matcher: TemplateMatcher,
    generator: QuestionGenerator,
    orchestrator: ResearchOrchestrator,
    composer: DraftComposer,
}

impl ProposalPipeline {
    /// Wire a pipeline from explicit providers. The same model validates
    /// research and writes narrative.
    ///
    /// Rate limits in `config.providers.search` apply to `search_providers`
    /// by position.
    pub fn new(
        config: PipelineConfig,
        search_providers: Vec<Arc<dyn SearchProvider>>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let orchestrator = ResearchOrchestrator::new(
            search_providers,
            &config.providers.search,
            model.clone(),
            config.research.clone(),
        );
        Self {
            extractor: RequirementExtractor::new(config.extraction.clone()),
            matcher: TemplateMatcher::new(config.matching.clone()),
            generator: QuestionGenerator::new(config.questions.clone()),
            orchestrator,
            composer: DraftComposer::new(config.composition.clone(), model),
        }
    }

    /// Validate `config` and build the providers it names.
    pub fn from_config(config: PipelineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let search = providers::build_search_providers(
            &config.providers.search,
            config.research.provider_timeout(),
        )?;
        let model = providers::build_language_model(&config.providers.model)?;
        Ok(Self::new(config, search, model))
    }

    pub async fn run(
        &self,
        input: &RfpInput,
        preferences: &ClientPreferences,
        cancel: &CancellationToken,
    ) -> Result<ProposalDraft> {
        self.run_with_callback(input, preferences, cancel, &NoOpCallback)
            .await
    }

    pub async fn run_with_callback(
        &self,
        input: &RfpInput,
        preferences: &ClientPreferences,
        cancel: &CancellationToken,
        callback: &dyn PipelineCallback,
    ) -> Result<ProposalDraft> {
        let started = Instant::now();
        info!(
            client = %preferences.client_name,
            tier = %input.depth_tier,
            providers = ?self.orchestrator.provider_ids(),
            "Starting proposal run"
        );

        callback.on_stage(PipelineStage::Extracting);
        let requirements = self
            .extractor
            .extract(&input.text, input.summary.as_deref())?;
        callback.on_requirements(&requirements);

        callback.on_stage(PipelineStage::Matching);
        let selection = self.matcher.assign(&requirements);
        callback.on_selection(&selection);

        callback.on_stage(PipelineStage::GeneratingQuestions);
        let questions = self
            .generator
            .generate(&selection, &requirements, input.depth_tier);
        callback.on_questions(&questions);

        callback.on_stage(PipelineStage::Researching);
        let requirement_texts: HashMap<String, String> = requirements
            .iter()
            .map(|r| (r.id.clone(), r.text.clone()))
            .collect();
        let research = self
            .orchestrator
            .run(questions, &requirement_texts, cancel, callback)
            .await;

        callback.on_stage(PipelineStage::Composing);
        let draft = self
            .composer
            .compose(
                &requirements,
                &selection,
                &research,
                preferences,
                input.depth_tier,
            )
            .await;

        info!(
            run_id = %draft.run_id,
            slides = draft.slides.len(),
            unresolved = draft.unresolved.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Proposal run finished"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, PitchcraftError};
    use crate::providers::{MockLanguageModel, MockSearchProvider};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<PipelineStage>>,
        tasks: Mutex<usize>,
    }

    impl ResearchCallback for Recorder {
        fn on_task_complete(
            &self,
            _task: &crate::research::ResearchTask,
            _done: usize,
            _total: usize,
        ) {
            *self.tasks.lock().unwrap() += 1;
        }
    }

    impl PipelineCallback for Recorder {
        fn on_stage(&self, stage: PipelineStage) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    fn pipeline() -> ProposalPipeline {
        let mut config = PipelineConfig::default();
        config.providers.search.clear();
        ProposalPipeline::new(
            config,
            vec![Arc::new(MockSearchProvider::with_hits("primary", vec![]))],
            Arc::new(MockLanguageModel::new(0.9)),
        )
    }

    #[tokio::test]
    async fn test_extraction_error_aborts() {
        let err = pipeline()
            .run(
                &RfpInput::new(""),
                &ClientPreferences::new("Acme", "Project"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PitchcraftError::Extraction(ExtractionError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_stages_reported_in_order() {
        let recorder = Recorder::default();
        let input = RfpInput::new(
            "The vendor must migrate the dispatch platform to a managed cloud environment.\n\
             The total cost must not exceed $450,000 including licences.",
        );
        let draft = pipeline()
            .run_with_callback(
                &input,
                &ClientPreferences::new("Acme", "Dispatch"),
                &CancellationToken::new(),
                &recorder,
            )
            .await
            .unwrap();
        assert_eq!(
            *recorder.stages.lock().unwrap(),
            vec![
                PipelineStage::Extracting,
                PipelineStage::Matching,
                PipelineStage::GeneratingQuestions,
                PipelineStage::Researching,
                PipelineStage::Composing,
            ]
        );
        assert!(*recorder.tasks.lock().unwrap() > 0);
        assert_eq!(draft.requirements.len(), 2);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = PipelineConfig::default();
        config.research.validation_threshold = 1.5;
        assert!(ProposalPipeline::from_config(config).is_err());
    }

    #[test]
    fn test_from_config_default_builds() {
        assert!(ProposalPipeline::from_config(PipelineConfig::default()).is_ok());
    }
}
