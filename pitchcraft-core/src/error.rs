//! Error types for the pitchcraft core.
//!
//! Uses `thiserror` for public API error types. Only [`ExtractionError`] aborts
//! a run; provider and model failures are absorbed into task and slide status
//! by the research orchestrator and the draft composer.

/// Top-level error type for the pitchcraft core library.
#[derive(Debug, thiserror::Error)]
pub enum PitchcraftError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from requirement extraction. Fatal for the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("RFP text is empty")]
    EmptyInput,

    #[error("RFP text too short: {length} characters (minimum {minimum})")]
    InputTooShort { length: usize, minimum: usize },

    #[error("No requirement statements found in RFP text")]
    NoRequirements,
}

/// Errors from search providers. Recoverable: the task advances to the next provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider '{provider}' unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("Provider '{provider}' quota exceeded, retry after {retry_after_secs}s")]
    QuotaExceeded {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Provider '{provider}' skipped: circuit open")]
    CircuitOpen { provider: String },

    #[error("Provider '{provider}' returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl ProviderError {
    /// Identifier of the provider that produced this error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Unavailable { provider, .. }
            | Self::QuotaExceeded { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::CircuitOpen { provider }
            | Self::InvalidResponse { provider, .. } => provider,
        }
    }
}

/// Errors from the validation/generation model. Always absorbed by callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Model unavailable: {message}")]
    Unavailable { message: String },

    #[error("Model authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Model rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Model response could not be parsed: {message}")]
    InvalidResponse { message: String },
}

/// Errors from the research task state machine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("Invalid task state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },
}

/// A type alias for results using the top-level `PitchcraftError`.
pub type Result<T> = std::result::Result<T, PitchcraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_extraction() {
        let err = PitchcraftError::Extraction(ExtractionError::InputTooShort {
            length: 12,
            minimum: 40,
        });
        assert_eq!(
            err.to_string(),
            "Extraction error: RFP text too short: 12 characters (minimum 40)"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = PitchcraftError::Config(ConfigError::Invalid {
            message: "research.validation_threshold must be within 0..=1".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: research.validation_threshold must be within 0..=1"
        );
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::QuotaExceeded {
            provider: "duckduckgo".into(),
            retry_after_secs: 30,
        };
        assert_eq!(
            err.to_string(),
            "Provider 'duckduckgo' quota exceeded, retry after 30s"
        );

        let err = ProviderError::Timeout {
            provider: "wikipedia".into(),
            timeout_ms: 2000,
        };
        assert_eq!(err.to_string(), "Provider 'wikipedia' timed out after 2000ms");
    }

    #[test]
    fn test_provider_error_provider_accessor() {
        let err = ProviderError::CircuitOpen {
            provider: "primary".into(),
        };
        assert_eq!(err.provider(), "primary");

        let err = ProviderError::Unavailable {
            provider: "fallback".into(),
            message: "503".into(),
        };
        assert_eq!(err.provider(), "fallback");
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::InvalidTransition {
            from: "resolved".into(),
            to: "searching".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid task state transition: resolved -> searching"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PitchcraftError = io_err.into();
        assert!(matches!(err, PitchcraftError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: PitchcraftError = serde_err.into();
        assert!(matches!(err, PitchcraftError::Serialization(_)));
    }
}
