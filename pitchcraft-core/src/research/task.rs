//! Research task state machine.
//!
//! ```text
//! Pending → Searching(p1) → Validating(p1) → Resolved
//!               │                 │
//!               └──(error)──┬─────┘(below threshold)
//!                           ▼
//!                     Searching(p2) → Validating(p2) → Resolved
//!                           │                 │
//!                           └────────┬────────┘
//!                                    ▼
//!                               Unresolved
//! ```
//!
//! `Resolved` and `Unresolved` are terminal. Each provider appears at most
//! once in a task's attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::sources::SourceDocument;
use crate::error::TaskError;
use crate::questions::ResearchQuestion;

/// Why a task ended without validated sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No search provider is configured.
    NoProviders,
    /// Every provider failed before returning results.
    ProvidersExhausted,
    /// Providers answered, but no candidate reached the validation threshold.
    LowConfidence,
    /// The run was cancelled or timed out first.
    Cancelled,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoProviders => "no search provider configured",
            Self::ProvidersExhausted => "all search providers failed",
            Self::LowConfidence => "no source reached the validation threshold",
            Self::Cancelled => "research cancelled before completion",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Searching { provider: String },
    Validating { provider: String },
    Resolved,
    Unresolved { reason: UnresolvedReason },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Unresolved { .. })
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Searching { provider } => write!(f, "searching({provider})"),
            Self::Validating { provider } => write!(f, "validating({provider})"),
            Self::Resolved => write!(f, "resolved"),
            Self::Unresolved { reason } => write!(f, "unresolved({reason})"),
        }
    }
}

/// What happened when a task tried one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The provider errored (including an open circuit or timeout).
    Failed { error: String },
    /// The provider answered with nothing.
    NoHits,
    /// Candidates were scored but none reached the threshold.
    BelowThreshold { best_score: f64 },
    /// This many candidates were accepted.
    Validated { accepted: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// One research question moving through the providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchTask {
    pub question: ResearchQuestion,
    pub state: TaskState,
    pub attempts: Vec<ProviderAttempt>,
    /// Validated sources; empty unless resolved.
    pub sources: Vec<SourceDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ResearchTask {
    pub fn new(question: ResearchQuestion) -> Self {
        Self {
            question,
            state: TaskState::Pending,
            attempts: Vec::new(),
            sources: Vec::new(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_resolved(&self) -> bool {
        self.state == TaskState::Resolved
    }

    pub fn unresolved_reason(&self) -> Option<UnresolvedReason> {
        match self.state {
            TaskState::Unresolved { reason } => Some(reason),
            _ => None,
        }
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, to: TaskState) -> Result<(), TaskError> {
        let allowed = match (&self.state, &to) {
            (TaskState::Pending, TaskState::Searching { .. }) => true,
            (TaskState::Pending, TaskState::Unresolved { .. }) => true,
            (TaskState::Searching { provider: from }, TaskState::Validating { provider: to }) => {
                from == to
            }
            (TaskState::Searching { provider: from }, TaskState::Searching { provider: to })
            | (TaskState::Validating { provider: from }, TaskState::Searching { provider: to }) => {
                from != to && !self.attempted(to)
            }
            (TaskState::Searching { .. }, TaskState::Unresolved { .. }) => true,
            (TaskState::Validating { .. }, TaskState::Resolved) => true,
            (TaskState::Validating { .. }, TaskState::Unresolved { .. }) => true,
            _ => false,
        };
        if !allowed {
            return Err(TaskError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(question_id = %self.question.id, from = %self.state, to = %to, "Task transition");
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.state = to;
        Ok(())
    }

    /// Record the outcome of the provider currently being tried.
    pub fn record_attempt(&mut self, provider: &str, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            outcome,
        });
    }

    /// Whether `provider` was already tried by this task.
    pub fn attempted(&self, provider: &str) -> bool {
        self.attempts.iter().any(|a| a.provider == provider)
    }

    /// Accept validated sources and resolve.
    pub fn resolve(&mut self, sources: Vec<SourceDocument>) -> Result<(), TaskError> {
        self.transition(TaskState::Resolved)?;
        self.sources = sources;
        Ok(())
    }

    /// End the task without sources. Terminal tasks are left untouched, so a
    /// resolved task survives a late cancellation.
    pub fn mark_unresolved(&mut self, reason: UnresolvedReason) {
        if self.is_terminal() {
            return;
        }
        debug!(question_id = %self.question.id, from = %self.state, %reason, "Task unresolved");
        self.state = TaskState::Unresolved { reason };
        self.finished_at = Some(Utc::now());
        self.sources.clear();
    }
}
