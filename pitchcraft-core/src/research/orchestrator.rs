//! Research Orchestrator: runs every research task through the providers.
//!
//! Tasks run concurrently, bounded by a semaphore of `max_concurrent_tasks`
//! permits. Each template's tasks are joined before its sources are
//! aggregated, so aggregation only ever sees terminal tasks and no state is
//! shared across templates. Per-provider rate limiters and circuit breakers
//! live on the provider slots and are independent of the concurrency bound.
//!
//! A run-level timeout (or the caller's cancellation token) cancels every
//! task still waiting on a permit, a rate-limit slot, a search or a score.
//! Cancelled tasks end `Unresolved(Cancelled)`; resolved tasks are kept.

use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sources::{SourceAggregator, SourceDocument};
use super::task::{AttemptOutcome, ResearchTask, TaskState, UnresolvedReason};
use crate::composer::draft::SlideStatus;
use crate::config::{ResearchConfig, SearchProviderConfig};
use crate::error::{ProviderError, TaskError};
use crate::providers::{
    CircuitBreaker, LanguageModel, RateLimiter, SearchHit, SearchProvider,
};
use crate::questions::ResearchQuestion;
use crate::templates::TemplateKind;

/// Receives research progress. All methods default to no-ops.
pub trait ResearchCallback: Send + Sync {
    /// A task reached a terminal state.
    fn on_task_complete(&self, _task: &ResearchTask, _completed: usize, _total: usize) {}

    /// The run-level timeout fired.
    fn on_timeout(&self) {}
}

/// A [`ResearchCallback`] that ignores everything.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {}

/// A search provider with its throttle, breaker and priority.
struct ProviderSlot {
    /// Unique within the orchestrator; repeated provider ids get a `#n` suffix.
    id: String,
    provider: Arc<dyn SearchProvider>,
    rank: usize,
    limiter: Mutex<RateLimiter>,
    breaker: Mutex<CircuitBreaker>,
}

impl ProviderSlot {
    fn id(&self) -> &str {
        &self.id
    }
}

enum SearchOutcome {
    Hits(Vec<SearchHit>),
    Failed(ProviderError),
    Cancelled,
}

/// All research for one template, after its barrier.
#[derive(Debug, Clone)]
pub struct TemplateResearch {
    pub template: TemplateKind,
    pub tasks: Vec<ResearchTask>,
    /// Aggregated validated sources, best first, unique by normalized URL.
    pub sources: Vec<SourceDocument>,
}

impl TemplateResearch {
    pub fn resolved_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_resolved()).count()
    }

    /// Complete iff every task resolved, partial iff some did, else unresolved.
    pub fn status(&self) -> SlideStatus {
        SlideStatus::from_counts(self.resolved_count(), self.tasks.len())
    }

    /// Most common reason among unresolved tasks, if any.
    pub fn dominant_reason(&self) -> Option<UnresolvedReason> {
        let mut counts: Vec<(UnresolvedReason, usize)> = Vec::new();
        for reason in self.tasks.iter().filter_map(ResearchTask::unresolved_reason) {
            match counts.iter_mut().find(|(r, _)| *r == reason) {
                Some((_, n)) => *n += 1,
                None => counts.push((reason, 1)),
            }
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp_rank().cmp(&a.0.cmp_rank())))
            .map(|(r, _)| r)
    }
}

impl UnresolvedReason {
    /// Tie-break order for [`TemplateResearch::dominant_reason`].
    fn cmp_rank(self) -> u8 {
        match self {
            Self::Cancelled => 0,
            Self::NoProviders => 1,
            Self::ProvidersExhausted => 2,
            Self::LowConfidence => 3,
        }
    }
}

/// Result of a research run.
#[derive(Debug, Clone, Default)]
pub struct ResearchOutcome {
    pub templates: BTreeMap<TemplateKind, TemplateResearch>,
    /// Whether the run-level timeout fired.
    pub timed_out: bool,
}

impl ResearchOutcome {
    pub fn get(&self, template: TemplateKind) -> Option<&TemplateResearch> {
        self.templates.get(&template)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &ResearchTask> {
        self.templates.values().flat_map(|t| t.tasks.iter())
    }

    pub fn resolved_count(&self) -> usize {
        self.tasks().filter(|t| t.is_resolved()).count()
    }
}

pub struct ResearchOrchestrator {
    slots: Vec<ProviderSlot>,
    validator: Arc<dyn LanguageModel>,
    config: ResearchConfig,
}

impl ResearchOrchestrator {
    /// Create an orchestrator over `providers`, tried in the order given.
    ///
    /// `limits` supplies per-provider throttles by position; providers
    /// without an entry are not throttled.
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        limits: &[SearchProviderConfig],
        validator: Arc<dyn LanguageModel>,
        config: ResearchConfig,
    ) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let slots = providers
            .into_iter()
            .enumerate()
            .map(|(rank, provider)| {
                let count = seen.entry(provider.id().to_string()).or_default();
                *count += 1;
                let id = if *count == 1 {
                    provider.id().to_string()
                } else {
                    let id = format!("{}#{count}", provider.id());
                    warn!(provider = provider.id(), slot = %id, "Duplicate search provider id");
                    id
                };
                let limiter = limits.get(rank).map_or_else(RateLimiter::unlimited, |l| {
                    RateLimiter::new(
                        l.requests_per_minute,
                        std::time::Duration::from_millis(l.min_interval_ms),
                    )
                });
                let breaker = CircuitBreaker::new(
                    &id,
                    config.circuit_failure_threshold,
                    config.circuit_recovery(),
                );
                ProviderSlot {
                    id,
                    provider,
                    rank,
                    limiter: Mutex::new(limiter),
                    breaker: Mutex::new(breaker),
                }
            })
            .collect();

        Self {
            slots,
            validator,
            config,
        }
    }

    /// Provider identifiers in priority order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.id().to_string()).collect()
    }

    /// Research every question. Never fails: provider and model errors end
    /// up as task outcomes.
    ///
    /// `requirement_texts` maps requirement ids to their text, which is
    /// handed to the validator alongside each question.
    pub async fn run(
        &self,
        questions: Vec<ResearchQuestion>,
        requirement_texts: &HashMap<String, String>,
        cancel: &CancellationToken,
        callback: &dyn ResearchCallback,
    ) -> ResearchOutcome {
        let total = questions.len();
        let mut grouped: BTreeMap<TemplateKind, Vec<ResearchQuestion>> = BTreeMap::new();
        for q in questions {
            grouped.entry(q.template).or_default().push(q);
        }
        info!(
            tasks = total,
            templates = grouped.len(),
            providers = self.slots.len(),
            concurrency = self.config.max_concurrent_tasks,
            "Starting research"
        );

        let token = cancel.child_token();
        let semaphore = Semaphore::new(self.config.max_concurrent_tasks.max(1));
        let completed = AtomicUsize::new(0);
        let progress = Progress {
            completed: &completed,
            total,
            callback,
        };

        let work = join_all(grouped.into_iter().map(|(template, questions)| {
            self.run_template(template, questions, requirement_texts, &token, &semaphore, &progress)
        }));
        tokio::pin!(work);

        let mut timed_out = false;
        let results = tokio::select! {
            results = &mut work => results,
            _ = tokio::time::sleep(self.config.run_timeout()) => {
                warn!(
                    timeout_ms = self.config.run_timeout_ms,
                    "Research run timed out; cancelling in-flight tasks"
                );
                timed_out = true;
                callback.on_timeout();
                token.cancel();
                work.await
            }
        };

        let outcome = ResearchOutcome {
            templates: results.into_iter().map(|r| (r.template, r)).collect(),
            timed_out,
        };
        info!(
            resolved = outcome.resolved_count(),
            tasks = total,
            timed_out,
            "Research finished"
        );
        outcome
    }

    async fn run_template(
        &self,
        template: TemplateKind,
        questions: Vec<ResearchQuestion>,
        requirement_texts: &HashMap<String, String>,
        token: &CancellationToken,
        semaphore: &Semaphore,
        progress: &Progress<'_>,
    ) -> TemplateResearch {
        let tasks = join_all(questions.into_iter().map(|question| {
            let requirement = requirement_texts
                .get(&question.requirement_id)
                .map(String::as_str)
                .unwrap_or("");
            self.run_task(question, requirement, token, semaphore, progress)
        }))
        .await;

        let mut aggregator = SourceAggregator::new();
        for source in tasks.iter().flat_map(|t| t.sources.iter()) {
            aggregator.add(source.clone());
        }
        let sources = aggregator.into_sorted();
        debug!(
            template = %template,
            tasks = tasks.len(),
            sources = sources.len(),
            "Template research joined"
        );

        TemplateResearch {
            template,
            tasks,
            sources,
        }
    }

    async fn run_task(
        &self,
        question: ResearchQuestion,
        requirement: &str,
        token: &CancellationToken,
        semaphore: &Semaphore,
        progress: &Progress<'_>,
    ) -> ResearchTask {
        let mut task = ResearchTask::new(question);

        if self.slots.is_empty() {
            task.mark_unresolved(UnresolvedReason::NoProviders);
        } else {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = semaphore.acquire() => permit.ok(),
            };
            match permit {
                Some(_permit) => {
                    if let Err(e) = self.drive(&mut task, requirement, token).await {
                        warn!(
                            question_id = %task.question.id,
                            error = %e,
                            "Task state machine rejected a transition"
                        );
                        task.mark_unresolved(UnresolvedReason::ProvidersExhausted);
                    }
                }
                None => task.mark_unresolved(UnresolvedReason::Cancelled),
            }
        }

        progress.task_done(&task);
        task
    }

    /// Walk the providers in priority order until one yields a validated source.
    async fn drive(
        &self,
        task: &mut ResearchTask,
        requirement: &str,
        token: &CancellationToken,
    ) -> Result<(), TaskError> {
        let validation_question = if requirement.is_empty() {
            task.question.text.clone()
        } else {
            format!("{} (requirement: {requirement})", task.question.text)
        };
        let mut reached_validation = false;

        for slot in &self.slots {
            if token.is_cancelled() {
                task.mark_unresolved(UnresolvedReason::Cancelled);
                return Ok(());
            }
            task.transition(TaskState::Searching {
                provider: slot.id().to_string(),
            })?;

            let hits = match self.search(slot, &task.question.query, token).await {
                SearchOutcome::Cancelled => {
                    task.mark_unresolved(UnresolvedReason::Cancelled);
                    return Ok(());
                }
                SearchOutcome::Failed(err) => {
                    warn!(
                        provider = slot.id(),
                        question_id = %task.question.id,
                        error = %err,
                        "Search provider failed; advancing"
                    );
                    task.record_attempt(slot.id(), AttemptOutcome::Failed {
                        error: err.to_string(),
                    });
                    continue;
                }
                SearchOutcome::Hits(hits) => hits,
            };

            task.transition(TaskState::Validating {
                provider: slot.id().to_string(),
            })?;
            reached_validation = true;
            if hits.is_empty() {
                task.record_attempt(slot.id(), AttemptOutcome::NoHits);
                continue;
            }

            let mut accepted = Vec::new();
            let mut best_score = 0.0_f64;
            for hit in hits.into_iter().take(self.config.max_results_per_search) {
                let candidate = hit.candidate_text();
                let scored = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    score = self.validator.score(&validation_question, &candidate) => Some(score),
                };
                let Some(scored) = scored else {
                    task.mark_unresolved(UnresolvedReason::Cancelled);
                    return Ok(());
                };
                let confidence = match scored {
                    Ok(s) if s.is_finite() => s.clamp(0.0, 1.0),
                    Ok(_) => 0.0,
                    Err(e) => {
                        debug!(
                            provider = slot.id(),
                            error = %e,
                            "Validation model failed; scoring 0"
                        );
                        0.0
                    }
                };
                best_score = best_score.max(confidence);
                if confidence >= self.config.validation_threshold {
                    debug!(
                        provider = slot.id(),
                        question_id = %task.question.id,
                        confidence,
                        url = %hit.url,
                        "Source validated"
                    );
                    accepted.push(SourceDocument::from_hit(
                        hit,
                        slot.id(),
                        slot.rank,
                        confidence,
                        true,
                        &task.question,
                    ));
                }
            }

            if !accepted.is_empty() {
                task.record_attempt(slot.id(), AttemptOutcome::Validated {
                    accepted: accepted.len(),
                });
                return task.resolve(accepted);
            }
            debug!(
                provider = slot.id(),
                question_id = %task.question.id,
                best_score,
                "No candidate reached the validation threshold"
            );
            task.record_attempt(slot.id(), AttemptOutcome::BelowThreshold { best_score });
        }

        task.mark_unresolved(if reached_validation {
            UnresolvedReason::LowConfidence
        } else {
            UnresolvedReason::ProvidersExhausted
        });
        Ok(())
    }

    /// One guarded search: circuit check, rate-limit wait, then the call
    /// under the provider timeout. Every wait is cancellable.
    async fn search(
        &self,
        slot: &ProviderSlot,
        query: &str,
        token: &CancellationToken,
    ) -> SearchOutcome {
        if !slot.breaker.lock().await.is_call_permitted() {
            return SearchOutcome::Failed(ProviderError::CircuitOpen {
                provider: slot.id().to_string(),
            });
        }

        let wait = slot.limiter.lock().await.reserve();
        if !wait.is_zero() {
            debug!(
                provider = slot.id(),
                wait_ms = wait.as_millis() as u64,
                "Rate limited; waiting"
            );
            tokio::select! {
                biased;
                _ = token.cancelled() => return SearchOutcome::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        let timeout = self.config.provider_timeout();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return SearchOutcome::Cancelled,
            r = tokio::time::timeout(
                timeout,
                slot.provider.search(query, self.config.max_results_per_search),
            ) => r,
        };
        let result = result.unwrap_or_else(|_| {
            Err(ProviderError::Timeout {
                provider: slot.id().to_string(),
                timeout_ms: self.config.provider_timeout_ms,
            })
        });

        let mut breaker = slot.breaker.lock().await;
        match result {
            Ok(hits) => {
                breaker.record_success();
                SearchOutcome::Hits(hits)
            }
            Err(err) => {
                breaker.record_failure();
                SearchOutcome::Failed(err)
            }
        }
    }
}

struct Progress<'a> {
    completed: &'a AtomicUsize,
    total: usize,
    callback: &'a dyn ResearchCallback,
}

impl Progress<'_> {
    fn task_done(&self, task: &ResearchTask) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            question_id = %task.question.id,
            template = %task.question.template,
            state = %task.state,
            done,
            total = self.total,
            "Task finished"
        );
        self.callback.on_task_complete(task, done, self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockBehavior, MockLanguageModel, MockSearchProvider};
    use crate::questions::QuestionIntent;
    use crate::types::DepthTier;
    use std::time::Duration;
    use uuid::Uuid;

    fn question(template: TemplateKind, query: &str) -> ResearchQuestion {
        ResearchQuestion {
            id: Uuid::new_v4(),
            requirement_id: "REQ-001".into(),
            template,
            text: format!("What about {query}?"),
            query: query.into(),
            intent: QuestionIntent::Overview,
            depth_tier: DepthTier::Default,
        }
    }

    fn hit(url: &str, snippet: &str) -> SearchHit {
        SearchHit::new(url, "Title", snippet)
    }

    fn config() -> ResearchConfig {
        ResearchConfig {
            circuit_failure_threshold: 100,
            ..ResearchConfig::default()
        }
    }

    fn orchestrator(
        providers: Vec<Arc<dyn SearchProvider>>,
        model: MockLanguageModel,
        config: ResearchConfig,
    ) -> ResearchOrchestrator {
        ResearchOrchestrator::new(providers, &[], Arc::new(model), config)
    }

    async fn run(orch: &ResearchOrchestrator, questions: Vec<ResearchQuestion>) -> ResearchOutcome {
        orch.run(
            questions,
            &HashMap::new(),
            &CancellationToken::new(),
            &NoOpResearchCallback,
        )
        .await
    }

    #[tokio::test]
    async fn test_primary_resolves_without_fallback() {
        let primary = Arc::new(MockSearchProvider::with_hits(
            "primary",
            vec![hit("https://a.example/1", "good")],
        ));
        let fallback = Arc::new(MockSearchProvider::with_hits("fallback", vec![]));
        let orch = orchestrator(
            vec![primary.clone(), fallback.clone()],
            MockLanguageModel::new(0.9),
            config(),
        );
        let outcome = run(&orch, vec![question(TemplateKind::Budget, "cost")]).await;
        let research = outcome.get(TemplateKind::Budget).unwrap();
        assert_eq!(research.status(), SlideStatus::Complete);
        assert_eq!(research.sources.len(), 1);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_falls_back() {
        let primary = Arc::new(MockSearchProvider::with_hits(
            "primary",
            vec![hit("https://a.example/1", "weak")],
        ));
        let fallback = Arc::new(MockSearchProvider::with_hits(
            "fallback",
            vec![hit("https://b.example/1", "strong")],
        ));
        let model = MockLanguageModel::new(0.2).with_score_for("strong", 0.8);
        let orch = orchestrator(vec![primary, fallback], model, config());
        let outcome = run(&orch, vec![question(TemplateKind::Budget, "cost")]).await;

        let task = outcome.tasks().next().unwrap();
        assert!(task.is_resolved());
        assert_eq!(task.sources[0].retrieved_via, "fallback");
        assert_eq!(task.sources[0].provider_rank, 1);
        assert_eq!(task.attempts.len(), 2);
        assert!(matches!(
            task.attempts[0].outcome,
            AttemptOutcome::BelowThreshold { .. }
        ));
    }

    #[tokio::test]
    async fn test_model_failure_scores_zero() {
        let primary = Arc::new(MockSearchProvider::with_hits(
            "primary",
            vec![hit("https://a.example/1", "x")],
        ));
        let orch = orchestrator(
            vec![primary],
            MockLanguageModel::new(0.9).failing_scores(),
            config(),
        );
        let outcome = run(&orch, vec![question(TemplateKind::Budget, "cost")]).await;
        let task = outcome.tasks().next().unwrap();
        assert_eq!(task.unresolved_reason(), Some(UnresolvedReason::LowConfidence));
    }

    #[tokio::test]
    async fn test_no_providers() {
        let orch = orchestrator(vec![], MockLanguageModel::new(0.9), config());
        let outcome = run(&orch, vec![question(TemplateKind::Budget, "cost")]).await;
        let task = outcome.tasks().next().unwrap();
        assert_eq!(task.unresolved_reason(), Some(UnresolvedReason::NoProviders));
    }

    #[tokio::test]
    async fn test_circuit_opens_and_skips_provider() {
        let primary = Arc::new(MockSearchProvider::unavailable("primary"));
        let fallback = Arc::new(MockSearchProvider::with_hits(
            "fallback",
            vec![hit("https://b.example/1", "ok")],
        ));
        let cfg = ResearchConfig {
            circuit_failure_threshold: 1,
            max_concurrent_tasks: 1,
            ..ResearchConfig::default()
        };
        let orch = orchestrator(
            vec![primary.clone(), fallback],
            MockLanguageModel::new(0.9),
            cfg,
        );
        let questions = (0..3)
            .map(|i| question(TemplateKind::Budget, &format!("cost {i}")))
            .collect();
        let outcome = run(&orch, questions).await;
        assert_eq!(outcome.resolved_count(), 3);
        // The breaker trips after the first failure; later tasks never call primary.
        assert_eq!(primary.calls(), 1);
        let skipped = outcome
            .tasks()
            .filter(|t| {
                matches!(
                    &t.attempts[0].outcome,
                    AttemptOutcome::Failed { error } if error.contains("circuit open")
                )
            })
            .count();
        assert_eq!(skipped, 2);
    }

    #[tokio::test]
    async fn test_provider_timeout_advances() {
        let primary = Arc::new(MockSearchProvider::hanging("primary"));
        let fallback = Arc::new(MockSearchProvider::with_hits(
            "fallback",
            vec![hit("https://b.example/1", "ok")],
        ));
        let cfg = ResearchConfig {
            provider_timeout_ms: 50,
            ..config()
        };
        let orch = orchestrator(vec![primary, fallback], MockLanguageModel::new(0.9), cfg);
        let outcome = run(&orch, vec![question(TemplateKind::Budget, "cost")]).await;
        let task = outcome.tasks().next().unwrap();
        assert!(task.is_resolved());
        assert!(matches!(
            &task.attempts[0].outcome,
            AttemptOutcome::Failed { error } if error.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_caller_cancellation_before_start() {
        let primary = Arc::new(MockSearchProvider::with_hits("primary", vec![]));
        let orch = orchestrator(vec![primary.clone()], MockLanguageModel::new(0.9), config());
        let token = CancellationToken::new();
        token.cancel();
        let outcome = orch
            .run(
                vec![question(TemplateKind::Budget, "cost")],
                &HashMap::new(),
                &token,
                &NoOpResearchCallback,
            )
            .await;
        let task = outcome.tasks().next().unwrap();
        assert_eq!(task.unresolved_reason(), Some(UnresolvedReason::Cancelled));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_calls() {
        let primary = Arc::new(MockSearchProvider::with_hits(
            "primary",
            vec![hit("https://a.example/1", "ok")],
        ));
        let mut limit = SearchProviderConfig::new(crate::config::SearchProviderKind::DuckDuckGo);
        limit.min_interval_ms = 40;
        let orch = ResearchOrchestrator::new(
            vec![primary.clone()],
            &[limit],
            Arc::new(MockLanguageModel::new(0.9)),
            config(),
        );
        let started = std::time::Instant::now();
        let questions = (0..3)
            .map(|i| question(TemplateKind::Budget, &format!("cost {i}")))
            .collect();
        let outcome = run(&orch, questions).await;
        assert_eq!(outcome.resolved_count(), 3);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_dedup_within_template() {
        let primary = Arc::new(MockSearchProvider::with_hits(
            "primary",
            vec![
                hit("https://a.example/report?utm_source=x", "ok"),
                hit("https://www.a.example/report/", "ok"),
            ],
        ));
        let orch = orchestrator(vec![primary], MockLanguageModel::new(0.9), config());
        let questions = vec![
            question(TemplateKind::Budget, "cost"),
            question(TemplateKind::Budget, "pricing"),
        ];
        let outcome = run(&orch, questions).await;
        assert_eq!(outcome.get(TemplateKind::Budget).unwrap().sources.len(), 1);
    }

    #[tokio::test]
    async fn test_dominant_reason() {
        let primary = Arc::new(
            MockSearchProvider::unavailable("primary")
                .with_override("cost", MockBehavior::Hits(vec![hit("https://a.example", "weak")])),
        );
        let orch = orchestrator(vec![primary], MockLanguageModel::new(0.1), config());
        let questions = vec![
            question(TemplateKind::Budget, "cost"),
            question(TemplateKind::Budget, "fees"),
            question(TemplateKind::Budget, "pricing"),
        ];
        let outcome = run(&orch, questions).await;
        let research = outcome.get(TemplateKind::Budget).unwrap();
        assert_eq!(research.status(), SlideStatus::Unresolved);
        assert_eq!(
            research.dominant_reason(),
            Some(UnresolvedReason::ProvidersExhausted)
        );
    }

    /// Records how many searches are in flight at once.
    struct CountingProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SearchProvider for CountingProvider {
        fn id(&self) -> &str {
            "counting"
        }

        async fn search(&self, query: &str, _max: usize) -> Result<Vec<SearchHit>, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![hit(&format!("https://c.example/{query}"), "found")])
        }
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_permits() {
        let provider = Arc::new(CountingProvider {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let orch = orchestrator(
            vec![provider.clone()],
            MockLanguageModel::new(0.9),
            ResearchConfig {
                max_concurrent_tasks: 3,
                ..config()
            },
        );
        let templates = [
            TemplateKind::Budget,
            TemplateKind::Compliance,
            TemplateKind::RiskMitigation,
        ];
        let questions: Vec<ResearchQuestion> = (0..12)
            .map(|i| question(templates[i % templates.len()], &format!("q{i}")))
            .collect();

        let outcome = run(&orch, questions).await;
        assert_eq!(outcome.resolved_count(), 12);
        let peak = provider.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "{peak} searches in flight");
        assert!(peak > 1, "tasks never overlapped");
    }

    #[tokio::test]
    async fn test_duplicate_provider_ids_get_distinct_slots() {
        let first = Arc::new(MockSearchProvider::with_hits(
            "dup",
            vec![hit("https://a.example/1", "weak")],
        ));
        let second = Arc::new(MockSearchProvider::with_hits(
            "dup",
            vec![hit("https://b.example/1", "strong")],
        ));
        let model = MockLanguageModel::new(0.2).with_score_for("strong", 0.9);
        let orch = orchestrator(vec![first.clone(), second.clone()], model, config());
        assert_eq!(orch.provider_ids(), vec!["dup", "dup#2"]);

        let outcome = run(&orch, vec![question(TemplateKind::Budget, "cost")]).await;
        let task = outcome.tasks().next().unwrap();
        assert!(task.is_resolved(), "{}", task.state);
        assert_eq!(task.sources[0].retrieved_via, "dup#2");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }
}
