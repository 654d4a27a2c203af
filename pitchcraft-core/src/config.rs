//! Configuration system for pitchcraft.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/pitchcraft/config.toml` and/or
//! `.pitchcraft/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::questions::QuestionIntent;
use crate::templates::CATALOG_SIZE;

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub matching: MatchingConfig,
    pub questions: QuestionConfig,
    pub research: ResearchConfig,
    pub composition: CompositionConfig,
    pub providers: ProvidersConfig,
}

/// Requirement extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// RFP text shorter than this (in characters, after trimming) is rejected.
    pub min_input_chars: usize,
    /// Statements with fewer words are ignored.
    pub min_statement_words: usize,
    /// Keyword-overlap similarity at or above which two statements are merged.
    pub similarity_threshold: f64,
    /// Upper bound on extracted requirements; the lowest-priority ones are dropped.
    pub max_requirements: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 40,
            min_statement_words: 3,
            similarity_threshold: 0.8,
            max_requirements: 40,
        }
    }
}

/// Template matching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum distinct templates in one draft, mandatory ones included.
    pub max_templates_per_run: usize,
    /// Maximum templates a single requirement may populate.
    pub max_templates_per_requirement: usize,
    /// Scores below this are not assigned (except the per-requirement fallback).
    pub min_match_score: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_templates_per_run: CATALOG_SIZE,
            max_templates_per_requirement: 2,
            min_match_score: 0.35,
        }
    }
}

/// Question counts per depth tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionConfig {
    pub default_questions: usize,
    pub advanced_questions: usize,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            default_questions: 2,
            advanced_questions: 5,
        }
    }
}

/// Research orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Minimum confidence for a candidate source to count as validated.
    pub validation_threshold: f64,
    /// Bounded worker pool size for in-flight research tasks.
    pub max_concurrent_tasks: usize,
    /// Run-level deadline for the whole research phase.
    pub run_timeout_ms: u64,
    /// Deadline for a single provider search call.
    pub provider_timeout_ms: u64,
    /// Candidates kept from each search response.
    pub max_results_per_search: usize,
    /// Consecutive failures before a provider's circuit opens.
    pub circuit_failure_threshold: usize,
    /// Time an open circuit waits before letting a trial call through.
    pub circuit_recovery_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            validation_threshold: 0.6,
            max_concurrent_tasks: 8,
            run_timeout_ms: 300_000,
            provider_timeout_ms: 20_000,
            max_results_per_search: 5,
            circuit_failure_threshold: 3,
            circuit_recovery_secs: 60,
        }
    }
}

impl ResearchConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn circuit_recovery(&self) -> Duration {
        Duration::from_secs(self.circuit_recovery_secs)
    }
}

/// Draft composition limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub max_body_chars: usize,
    pub max_table_rows: usize,
    pub max_chart_points: usize,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            max_body_chars: 900,
            max_table_rows: 6,
            max_chart_points: 8,
        }
    }
}

/// External collaborators: search providers in priority order plus the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Search providers, first = primary.
    pub search: Vec<SearchProviderConfig>,
    pub model: ModelConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            search: vec![
                SearchProviderConfig::new(SearchProviderKind::DuckDuckGo),
                SearchProviderConfig::new(SearchProviderKind::Wikipedia),
            ],
            model: ModelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchProviderKind {
    #[serde(rename = "duckduckgo", alias = "ddg")]
    DuckDuckGo,
    Wikipedia,
}

/// One search provider entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProviderConfig {
    pub kind: SearchProviderKind,
    /// Requests per minute (0 = unlimited).
    #[serde(default)]
    pub requests_per_minute: usize,
    /// Minimum spacing between consecutive requests.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Override the API endpoint (useful for proxies and tests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_min_interval_ms() -> u64 {
    250
}

fn default_user_agent() -> String {
    format!("pitchcraft/{}", env!("CARGO_PKG_VERSION"))
}

impl SearchProviderConfig {
    pub fn new(kind: SearchProviderKind) -> Self {
        Self {
            kind,
            requests_per_minute: 30,
            min_interval_ms: default_min_interval_ms(),
            user_agent: default_user_agent(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Offline keyword-overlap scoring and extractive writing.
    #[default]
    Heuristic,
    /// Any endpoint speaking the OpenAI chat-completions protocol.
    OpenaiCompatible,
}

/// Validation and narrative-generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Heuristic,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.3,
            timeout_ms: 30_000,
        }
    }
}

impl PipelineConfig {
    /// Reject values that would break pipeline guarantees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        let threshold = self.extraction.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) || threshold == 0.0 {
            return invalid(format!(
                "extraction.similarity_threshold must be within (0, 1], got {threshold}"
            ));
        }
        if !(5..=CATALOG_SIZE).contains(&self.matching.max_templates_per_run) {
            return invalid(format!(
                "matching.max_templates_per_run must be within 5..={CATALOG_SIZE}, got {}",
                self.matching.max_templates_per_run
            ));
        }
        if self.matching.max_templates_per_requirement == 0 {
            return invalid("matching.max_templates_per_requirement must be at least 1".into());
        }
        let q = &self.questions;
        if q.default_questions == 0
            || q.advanced_questions <= q.default_questions
            || q.advanced_questions > QuestionIntent::ALL.len()
        {
            return invalid(format!(
                "questions: need 1 <= default ({}) < advanced ({}) <= {}",
                q.default_questions,
                q.advanced_questions,
                QuestionIntent::ALL.len()
            ));
        }
        let r = &self.research;
        if !(0.0..=1.0).contains(&r.validation_threshold) {
            return invalid(format!(
                "research.validation_threshold must be within 0..=1, got {}",
                r.validation_threshold
            ));
        }
        if r.max_concurrent_tasks == 0 {
            return invalid("research.max_concurrent_tasks must be at least 1".into());
        }
        if r.max_results_per_search == 0 {
            return invalid("research.max_results_per_search must be at least 1".into());
        }
        if r.circuit_failure_threshold == 0 {
            return invalid("research.circuit_failure_threshold must be at least 1".into());
        }
        let search = &self.providers.search;
        if let Some((i, dup)) = search
            .iter()
            .enumerate()
            .find(|(i, p)| search[..*i].iter().any(|earlier| earlier.kind == p.kind))
        {
            return invalid(format!(
                "providers.search[{i}]: {:?} is already listed; each provider may appear once",
                dup.kind
            ));
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PITCHCRAFT_`)
/// 3. Workspace-local config (`.pitchcraft/config.toml`)
/// 4. User config (`~/.config/pitchcraft/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&PipelineConfig>,
) -> Result<PipelineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "pitchcraft", "pitchcraft") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".pitchcraft").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // PITCHCRAFT_RESEARCH__VALIDATION_THRESHOLD, PITCHCRAFT_MATCHING__MAX_TEMPLATES_PER_RUN, ...
    figment = figment.merge(Env::prefixed("PITCHCRAFT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!((config.research.validation_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.research.max_concurrent_tasks, 8);
        assert_eq!(config.matching.max_templates_per_run, 20);
        assert_eq!(config.questions.default_questions, 2);
        assert_eq!(config.questions.advanced_questions, 5);
        assert_eq!(config.providers.search.len(), 2);
        assert_eq!(config.providers.search[0].kind, SearchProviderKind::DuckDuckGo);
        assert_eq!(config.providers.model.kind, ModelKind::Heuristic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PipelineConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: PipelineConfig = toml::from_str(
            r#"
            [research]
            validation_threshold = 0.75

            [[providers.search]]
            kind = "wikipedia"
            "#,
        )
        .unwrap();
        assert!((parsed.research.validation_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(parsed.research.max_concurrent_tasks, 8);
        assert_eq!(parsed.providers.search.len(), 1);
        assert_eq!(parsed.providers.search[0].min_interval_ms, 250);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = PipelineConfig::default();
        config.research.validation_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_search_provider() {
        let mut config = PipelineConfig::default();
        config.providers.search = vec![
            SearchProviderConfig::new(SearchProviderKind::DuckDuckGo),
            SearchProviderConfig::new(SearchProviderKind::Wikipedia),
            SearchProviderConfig::new(SearchProviderKind::DuckDuckGo),
        ];
        match config.validate() {
            Err(ConfigError::Invalid { message }) => {
                assert!(message.contains("providers.search[2]"))
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_tier_inversion() {
        let mut config = PipelineConfig::default();
        config.questions.advanced_questions = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_few_templates() {
        let mut config = PipelineConfig::default();
        config.matching.max_templates_per_run = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_workspace_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".pitchcraft");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[research]\nmax_concurrent_tasks = 3\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.research.max_concurrent_tasks, 3);
    }

    #[test]
    fn test_load_config_overrides_win() {
        let mut overrides = PipelineConfig::default();
        overrides.research.run_timeout_ms = 1234;
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.research.run_timeout_ms, 1234);
    }
}
