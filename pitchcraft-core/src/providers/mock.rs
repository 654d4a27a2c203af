//! Scripted providers for tests and dry runs.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::heuristic::HeuristicModel;
use super::{LanguageModel, SearchHit, SearchProvider};
use crate::error::{ModelError, ProviderError};
use crate::types::Tone;

/// What a [`MockSearchProvider`] does when searched.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return these hits.
    Hits(Vec<SearchHit>),
    /// Fail with this error.
    Fail(ProviderError),
    /// Never answer.
    Hang,
    /// Answer with these hits after a delay.
    Delay(Duration, Vec<SearchHit>),
}

/// A search provider that follows a script and counts its calls.
pub struct MockSearchProvider {
    id: String,
    behavior: MockBehavior,
    /// Overrides for queries containing a substring; first match wins.
    overrides: Vec<(String, MockBehavior)>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new(id: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            overrides: Vec::new(),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hits(id: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        Self::new(id, MockBehavior::Hits(hits))
    }

    /// A provider whose every call fails with `Unavailable`.
    pub fn unavailable(id: impl Into<String>) -> Self {
        let id = id.into();
        let err = ProviderError::Unavailable {
            provider: id.clone(),
            message: "503 Service Unavailable".into(),
        };
        Self::new(id, MockBehavior::Fail(err))
    }

    pub fn hanging(id: impl Into<String>) -> Self {
        Self::new(id, MockBehavior::Hang)
    }

    /// Use `behavior` for queries containing `needle` (case-insensitive).
    pub fn with_override(mut self, needle: impl Into<String>, behavior: MockBehavior) -> Self {
        self.overrides.push((needle.into().to_lowercase(), behavior));
        self
    }

    /// Number of `search` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn behavior_for(&self, query: &str) -> &MockBehavior {
        let lower = query.to_lowercase();
        self.overrides
            .iter()
            .find(|(needle, _)| lower.contains(needle.as_str()))
            .map_or(&self.behavior, |(_, b)| b)
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());

        match self.behavior_for(query).clone() {
            MockBehavior::Hits(hits) => Ok(hits.into_iter().take(max_results).collect()),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => std::future::pending().await,
            MockBehavior::Delay(delay, hits) => {
                tokio::time::sleep(delay).await;
                Ok(hits.into_iter().take(max_results).collect())
            }
        }
    }
}

/// A model with scripted scores.
///
/// `score` returns the score of the first rule whose needle occurs in the
/// candidate text, else the default. `generate` returns a fixed text when one
/// is set, otherwise writes extractively like [`HeuristicModel`].
pub struct MockLanguageModel {
    default_score: f64,
    rules: Vec<(String, f64)>,
    fail_scoring: bool,
    fail_generation: bool,
    fixed_text: Option<String>,
    score_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    pub fn new(default_score: f64) -> Self {
        Self {
            default_score,
            rules: Vec::new(),
            fail_scoring: false,
            fail_generation: false,
            fixed_text: None,
            score_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Score candidates containing `needle` as `score`.
    pub fn with_score_for(mut self, needle: impl Into<String>, score: f64) -> Self {
        self.rules.push((needle.into(), score));
        self
    }

    pub fn failing_scores(mut self) -> Self {
        self.fail_scoring = true;
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.fixed_text = Some(text.into());
        self
    }

    pub fn score_calls(&self) -> usize {
        self.score_calls.load(Ordering::SeqCst)
    }

    /// Generation prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn id(&self) -> &str {
        "mock-model"
    }

    async fn score(&self, _question: &str, candidate: &str) -> Result<f64, ModelError> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_scoring {
            return Err(ModelError::Unavailable {
                message: "mock scoring disabled".into(),
            });
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| candidate.contains(needle.as_str()))
            .map_or(self.default_score, |(_, score)| *score))
    }

    async fn generate(
        &self,
        prompt: &str,
        tone: Tone,
        keywords: &[String],
    ) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail_generation {
            return Err(ModelError::Unavailable {
                message: "mock generation disabled".into(),
            });
        }
        match &self.fixed_text {
            Some(text) => Ok(text.clone()),
            None => HeuristicModel::new().generate(prompt, tone, keywords).await,
        }
    }
}
