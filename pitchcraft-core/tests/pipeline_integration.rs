//! End-to-end tests for the proposal pipeline.
//!
//! Every run uses the scripted providers from `providers::mock`; nothing
//! touches the network.

use pitchcraft_core::config::{PipelineConfig, ResearchConfig};
use pitchcraft_core::providers::{MockBehavior, MockLanguageModel, MockSearchProvider};
use pitchcraft_core::questions::QuestionIntent;
use pitchcraft_core::research::{
    NoOpResearchCallback, ResearchCallback, ResearchOrchestrator, ResearchTask, UnresolvedReason,
};
use pitchcraft_core::templates::{TemplateKind, TemplateMatcher};
use pitchcraft_core::{
    ClientPreferences, DepthTier, PipelineCallback, ProposalPipeline, RequirementExtractor,
    ResearchQuestion, RfpInput, SearchHit, SearchProvider, SlideStatus, SlotValue, Tone,
    UNRESOLVED_MARKER,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const RFP: &str = "\
BACKGROUND
Acme Logistics currently runs its dispatch system on ageing on-premise servers.

Scope of Work
- The vendor must migrate the dispatch platform to a managed cloud environment.
- The solution must comply with GDPR and SOC 2 requirements.
- The vendor should provide monthly progress reports to the steering committee.
- Training for 40 dispatch operators may be included as an option.

Timeline:
Go-live is expected within 6 months of contract signature.

Budget: The total cost must not exceed $450,000 including licences.

Evaluation Criteria
1. Proposals will be evaluated on relevant experience (40%) and price (30%).
";

/// Records every finished task and the generated questions.
#[derive(Default)]
struct Recorder {
    tasks: Mutex<Vec<ResearchTask>>,
    questions: Mutex<usize>,
}

impl ResearchCallback for Recorder {
    fn on_task_complete(&self, task: &ResearchTask, _done: usize, _total: usize) {
        self.tasks.lock().unwrap().push(task.clone());
    }
}

impl PipelineCallback for Recorder {
    fn on_questions(&self, questions: &[ResearchQuestion]) {
        *self.questions.lock().unwrap() = questions.len();
    }
}

fn hits() -> Vec<SearchHit> {
    vec![
        SearchHit::new(
            "https://research.example/cloud-dispatch?utm_source=feed",
            "Cloud dispatch benchmarks",
            "Fleet operators cut dispatch costs by 18% after moving to managed cloud platforms.",
        ),
        SearchHit::new(
            "https://www.research.example/cloud-dispatch/",
            "Cloud dispatch benchmarks (mirror)",
            "Fleet operators cut dispatch costs by 18% after moving to managed cloud platforms.",
        ),
        SearchHit::new(
            "https://standards.example/gdpr-soc2",
            "GDPR and SOC 2 for logistics",
            "Most logistics vendors certify SOC 2 Type II within 12 months.",
        ),
    ]
}

fn prefs() -> ClientPreferences {
    ClientPreferences::new("Acme Logistics", "Dispatch Cloud Migration")
        .with_tone(Tone::Consultative)
        .with_keywords(["resilience", "compliance"])
}

/// Default configuration without per-provider throttling.
fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.providers.search.clear();
    config
}

fn pipeline(
    config: PipelineConfig,
    providers: Vec<Arc<dyn SearchProvider>>,
    model: MockLanguageModel,
) -> ProposalPipeline {
    ProposalPipeline::new(config, providers, Arc::new(model))
}

fn healthy_pipeline() -> ProposalPipeline {
    pipeline(
        config(),
        vec![
            Arc::new(MockSearchProvider::with_hits("primary", hits())),
            Arc::new(MockSearchProvider::with_hits("fallback", hits())),
        ],
        MockLanguageModel::new(0.9),
    )
}

fn question(template: TemplateKind, query: &str) -> ResearchQuestion {
    ResearchQuestion {
        id: Uuid::new_v4(),
        requirement_id: "REQ-001".into(),
        template,
        text: format!("What is known about {query}?"),
        query: query.into(),
        intent: QuestionIntent::Overview,
        depth_tier: DepthTier::Default,
    }
}

#[tokio::test]
async fn test_mandatory_templates_present_once() {
    let draft = healthy_pipeline()
        .run(&RfpInput::new(RFP), &prefs(), &CancellationToken::new())
        .await
        .unwrap();

    let kinds: Vec<TemplateKind> = draft.slides.iter().map(|s| s.template).collect();
    let unique: HashSet<TemplateKind> = kinds.iter().copied().collect();
    assert_eq!(unique.len(), kinds.len(), "duplicate template in {kinds:?}");
    for mandatory in TemplateKind::MANDATORY {
        assert!(unique.contains(&mandatory), "missing {mandatory}");
    }
    assert_eq!(kinds.first(), Some(&TemplateKind::Cover));
    assert_eq!(kinds[1], TemplateKind::TableOfContents);
    assert_eq!(kinds.last(), Some(&TemplateKind::QAndA));
    assert_eq!(kinds[kinds.len() - 2], TemplateKind::ClosingSummary);
    assert!(kinds.len() <= 20);
}

#[tokio::test]
async fn test_every_requirement_reaches_a_slide() {
    let draft = healthy_pipeline()
        .run(&RfpInput::new(RFP), &prefs(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!draft.requirements.is_empty());
    for row in draft.summary_rows() {
        assert!(!row.templates.is_empty(), "{} drove no slide", row.requirement_id);
    }
}

#[tokio::test]
async fn test_every_task_terminal_and_slides_complete() {
    let recorder = Recorder::default();
    let draft = healthy_pipeline()
        .run_with_callback(&RfpInput::new(RFP), &prefs(), &CancellationToken::new(), &recorder)
        .await
        .unwrap();

    let tasks = recorder.tasks.lock().unwrap();
    assert!(!tasks.is_empty());
    assert_eq!(tasks.len(), *recorder.questions.lock().unwrap());
    assert!(tasks.iter().all(ResearchTask::is_terminal));
    assert!(tasks.iter().all(ResearchTask::is_resolved));

    for slide in draft.slides.iter().filter(|s| s.research_required) {
        assert_eq!(slide.status, SlideStatus::Complete, "{}", slide.template);
        assert!(!slide.source_refs.is_empty());
    }
}

#[tokio::test]
async fn test_sources_deduplicated_per_slide() {
    let draft = healthy_pipeline()
        .run(&RfpInput::new(RFP), &prefs(), &CancellationToken::new())
        .await
        .unwrap();
    for slide in draft.slides.iter().filter(|s| s.research_required) {
        let urls: Vec<&str> = slide
            .source_refs
            .iter()
            .map(|id| draft.source(*id).unwrap().normalized_url.as_str())
            .collect();
        let unique: HashSet<&str> = urls.iter().copied().collect();
        assert_eq!(urls.len(), unique.len());
        // The tracking-parameter and www. variants collapse into one.
        assert_eq!(urls.len(), 2, "{}: {urls:?}", slide.template);
    }
}

#[test]
fn test_matcher_is_idempotent() {
    let requirements = RequirementExtractor::new(Default::default())
        .extract(RFP, None)
        .unwrap();
    let matcher = TemplateMatcher::new(Default::default());
    assert_eq!(matcher.assign(&requirements), matcher.assign(&requirements));
}

#[tokio::test]
async fn test_fallback_provider_resolves_after_primary_failure() {
    let primary = Arc::new(MockSearchProvider::unavailable("primary"));
    let fallback = Arc::new(MockSearchProvider::with_hits(
        "fallback",
        vec![SearchHit::new(
            "https://costs.example/benchmark",
            "Dispatch cost benchmark",
            "Managed dispatch platforms cost $300,000 on average.",
        )],
    ));
    let model = MockLanguageModel::new(0.1).with_score_for("benchmark", 0.8);
    let orchestrator = ResearchOrchestrator::new(
        vec![primary.clone(), fallback.clone()],
        &[],
        Arc::new(model),
        ResearchConfig::default(),
    );

    let outcome = orchestrator
        .run(
            vec![question(TemplateKind::Budget, "dispatch platform cost")],
            &HashMap::new(),
            &CancellationToken::new(),
            &NoOpResearchCallback,
        )
        .await;

    let budget = outcome.get(TemplateKind::Budget).unwrap();
    let task = &budget.tasks[0];
    assert!(task.is_resolved());
    assert_eq!(task.attempts.len(), 2);
    assert_eq!(budget.sources.len(), 1);
    assert_eq!(budget.sources[0].retrieved_via, "fallback");
    assert!((budget.sources[0].confidence_score - 0.8).abs() < 1e-9);
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_total_provider_failure_marks_slides_unresolved() {
    let pipeline = pipeline(
        config(),
        vec![
            Arc::new(MockSearchProvider::unavailable("primary")),
            Arc::new(MockSearchProvider::unavailable("fallback")),
        ],
        MockLanguageModel::new(0.9),
    );
    let draft = pipeline
        .run(&RfpInput::new(RFP), &prefs(), &CancellationToken::new())
        .await
        .unwrap();

    let research_slides: Vec<_> = draft.slides.iter().filter(|s| s.research_required).collect();
    assert!(!research_slides.is_empty());
    for slide in &research_slides {
        assert_eq!(slide.status, SlideStatus::Unresolved);
        assert!(slide.source_refs.is_empty());
        for spec in slide.template.template().slots.iter().filter(|s| s.is_narrative()) {
            let value = slide.slot(spec.name).unwrap();
            assert_eq!(value.display_text(), UNRESOLVED_MARKER);
        }
        assert!(
            draft
                .unresolved_manifest()
                .iter()
                .any(|e| e.template == slide.template
                    && e.reason.contains("all search providers failed"))
        );
    }

    // Slides that need no research are still written.
    let cover = draft.slide(TemplateKind::Cover).unwrap();
    assert_eq!(cover.status, SlideStatus::Complete);
    assert!(matches!(cover.slot("subtitle"), Some(SlotValue::Text { .. })));
}

#[tokio::test]
async fn test_advanced_tier_asks_more_questions() {
    let default = Recorder::default();
    let advanced = Recorder::default();
    let pipeline = healthy_pipeline();
    pipeline
        .run_with_callback(&RfpInput::new(RFP), &prefs(), &CancellationToken::new(), &default)
        .await
        .unwrap();
    pipeline
        .run_with_callback(
            &RfpInput::new(RFP).with_tier(DepthTier::Advanced),
            &prefs(),
            &CancellationToken::new(),
            &advanced,
        )
        .await
        .unwrap();
    let default = *default.questions.lock().unwrap();
    let advanced = *advanced.questions.lock().unwrap();
    assert!(default > 0);
    assert!(advanced > default, "advanced {advanced} <= default {default}");
}

#[tokio::test]
async fn test_run_timeout_keeps_resolved_work() {
    let primary = Arc::new(
        MockSearchProvider::with_hits("primary", hits())
            .with_override("stalled", MockBehavior::Hang),
    );
    let config = ResearchConfig {
        run_timeout_ms: 200,
        ..ResearchConfig::default()
    };
    let orchestrator = ResearchOrchestrator::new(
        vec![primary],
        &[],
        Arc::new(MockLanguageModel::new(0.9)),
        config,
    );

    let started = Instant::now();
    let outcome = orchestrator
        .run(
            vec![
                question(TemplateKind::Budget, "dispatch cost"),
                question(TemplateKind::Budget, "stalled vendor quotes"),
                question(TemplateKind::Compliance, "stalled audit"),
            ],
            &HashMap::new(),
            &CancellationToken::new(),
            &NoOpResearchCallback,
        )
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.timed_out);

    let budget = outcome.get(TemplateKind::Budget).unwrap();
    assert_eq!(budget.resolved_count(), 1);
    assert_eq!(budget.status(), SlideStatus::Partial);
    assert!(!budget.sources.is_empty());

    let compliance = outcome.get(TemplateKind::Compliance).unwrap();
    assert_eq!(
        compliance.tasks[0].unresolved_reason(),
        Some(UnresolvedReason::Cancelled)
    );
    assert!(outcome.tasks().all(ResearchTask::is_terminal));
}

#[tokio::test]
async fn test_pipeline_timeout_still_yields_draft() {
    let mut config = config();
    config.research.run_timeout_ms = 150;
    let pipeline = pipeline(
        config,
        vec![Arc::new(MockSearchProvider::hanging("primary"))],
        MockLanguageModel::new(0.9),
    );
    let draft = pipeline
        .run(&RfpInput::new(RFP), &prefs(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(draft.research_timed_out);
    assert!(
        draft
            .slides
            .iter()
            .filter(|s| s.research_required)
            .all(|s| s.status == SlideStatus::Unresolved)
    );
    assert!(!draft.unresolved_manifest().is_empty());
}

#[tokio::test]
async fn test_draft_checkpoint_roundtrip() {
    let draft = healthy_pipeline()
        .run(&RfpInput::new(RFP), &prefs(), &CancellationToken::new())
        .await
        .unwrap();
    let dir = tempfile::TempDir::new().unwrap();
    let path = pitchcraft_core::persistence::draft_path(dir.path(), draft.run_id);
    draft.save(&path).unwrap();
    let loaded = pitchcraft_core::ProposalDraft::load(&path).unwrap();
    pretty_assertions::assert_eq!(loaded, draft);
}
