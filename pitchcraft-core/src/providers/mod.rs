//! External service seams: search providers and the validation/generation model.
//!
//! Concrete implementations:
//! - `duckduckgo`: DuckDuckGo instant-answer API (default primary search)
//! - `wikipedia`: MediaWiki search API (default fallback search)
//! - `openai_compat`: any OpenAI chat-completions endpoint (OpenAI, Ollama, vLLM, ...)
//! - `heuristic`: offline keyword-overlap scorer and extractive writer
//! - `mock`: scripted providers for tests and dry runs
//!
//! Use [`build_search_providers`] and [`build_language_model`] to instantiate
//! them from configuration.

pub mod circuit;
pub mod duckduckgo;
pub mod heuristic;
pub mod mock;
pub mod openai_compat;
pub mod rate_limiter;
pub mod wikipedia;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ModelConfig, ModelKind, SearchProviderConfig, SearchProviderKind};
use crate::error::{ConfigError, ModelError, ProviderError};
use crate::types::Tone;

pub use circuit::{CircuitBreaker, CircuitState};
pub use duckduckgo::DuckDuckGoProvider;
pub use heuristic::HeuristicModel;
pub use mock::{MockBehavior, MockLanguageModel, MockSearchProvider};
pub use openai_compat::OpenAiCompatibleModel;
pub use rate_limiter::RateLimiter;
pub use wikipedia::WikipediaProvider;

/// Header line that introduces the source material block of a generation prompt.
pub const MATERIAL_HEADER: &str = "Material:";

/// A single search result. Carries exactly one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Publication or last-edit time, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl SearchHit {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Text handed to the validation model.
    pub fn candidate_text(&self) -> String {
        format!("{}\n{}\n{}", self.title, self.snippet, self.url)
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable identifier used in logs and on retrieved sources.
    fn id(&self) -> &str;

    /// Run `query`, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<SearchHit>, ProviderError>;
}

/// The validation and generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn id(&self) -> &str;

    /// Confidence in [0, 1] that `candidate` is relevant to and plausible for `question`.
    async fn score(&self, question: &str, candidate: &str) -> Result<f64, ModelError>;

    /// Write text for `prompt` in the given tone, favouring `keywords`.
    async fn generate(&self, prompt: &str, tone: Tone, keywords: &[String])
    -> Result<String, ModelError>;
}

/// Shared HTTP client setup for the search providers.
pub(crate) fn http_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Map a non-success HTTP status from a search API onto a provider error.
pub(crate) fn map_search_status(
    provider: &str,
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
    body: &str,
) -> ProviderError {
    match status.as_u16() {
        429 => ProviderError::QuotaExceeded {
            provider: provider.to_string(),
            retry_after_secs: rate_limiter::parse_retry_after(headers)
                .map_or(60, |d| d.as_secs()),
        },
        s if s >= 500 => ProviderError::Unavailable {
            provider: provider.to_string(),
            message: format!("server error ({status})"),
        },
        _ => ProviderError::InvalidResponse {
            provider: provider.to_string(),
            message: format!("HTTP {status}: {}", crate::text::truncate_chars(body, 200)),
        },
    }
}

/// Map a transport error onto a provider error.
pub(crate) fn map_transport_error(
    provider: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        ProviderError::Unavailable {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Build the configured search providers, in priority order.
pub fn build_search_providers(
    configs: &[SearchProviderConfig],
    timeout: Duration,
) -> Result<Vec<Arc<dyn SearchProvider>>, ConfigError> {
    configs
        .iter()
        .map(|config| -> Result<Arc<dyn SearchProvider>, ConfigError> {
            Ok(match config.kind {
                SearchProviderKind::DuckDuckGo => {
                    Arc::new(DuckDuckGoProvider::new(config, timeout)?)
                }
                SearchProviderKind::Wikipedia => {
                    Arc::new(WikipediaProvider::new(config, timeout)?)
                }
            })
        })
        .collect()
}

/// Build the configured validation/generation model.
pub fn build_language_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>, ConfigError> {
    match config.kind {
        ModelKind::Heuristic => Ok(Arc::new(HeuristicModel::new())),
        ModelKind::OpenaiCompatible => Ok(Arc::new(OpenAiCompatibleModel::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_text_layout() {
        let hit = SearchHit::new("https://example.com/a", "Title", "Snippet text");
        assert_eq!(hit.candidate_text(), "Title\nSnippet text\nhttps://example.com/a");
    }

    #[test]
    fn test_map_search_status() {
        let mut headers = reqwest::header::HeaderMap::new();
        let err = map_search_status("ddg", reqwest::StatusCode::BAD_GATEWAY, &headers, "");
        assert!(matches!(err, ProviderError::Unavailable { .. }));
        let err = map_search_status("ddg", reqwest::StatusCode::NOT_FOUND, &headers, "nope");
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));

        headers.insert("retry-after", reqwest::header::HeaderValue::from_static("30"));
        let err = map_search_status("ddg", reqwest::StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert_eq!(
            err,
            ProviderError::QuotaExceeded {
                provider: "ddg".into(),
                retry_after_secs: 30
            }
        );
        assert_eq!(err.provider(), "ddg");
    }

    #[test]
    fn test_build_default_providers() {
        let configs = crate::config::ProvidersConfig::default().search;
        let providers = build_search_providers(&configs, Duration::from_secs(5)).unwrap();
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["duckduckgo", "wikipedia"]);
    }

    #[test]
    fn test_build_heuristic_model() {
        let model = build_language_model(&ModelConfig::default()).unwrap();
        assert_eq!(model.id(), "heuristic");
    }
}
