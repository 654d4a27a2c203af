//! Fundamental types shared across the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed taxonomy a requirement statement is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementCategory {
    /// Something the client needs solved.
    Need,
    /// A hard limit the solution must respect.
    Constraint,
    /// How proposals will be judged.
    EvaluationCriterion,
    /// A concrete output the client expects to receive.
    Deliverable,
    /// Dates, phases and deadlines.
    Timeline,
    /// Cost ceilings and pricing expectations.
    Budget,
    /// Known risks or concerns.
    Risk,
    /// Context about the client or current situation.
    Background,
}

impl RequirementCategory {
    /// All categories in declaration order.
    pub const ALL: [RequirementCategory; 8] = [
        Self::Need,
        Self::Constraint,
        Self::EvaluationCriterion,
        Self::Deliverable,
        Self::Timeline,
        Self::Budget,
        Self::Risk,
        Self::Background,
    ];
}

impl fmt::Display for RequirementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Need => "need",
            Self::Constraint => "constraint",
            Self::EvaluationCriterion => "evaluation_criterion",
            Self::Deliverable => "deliverable",
            Self::Timeline => "timeline",
            Self::Budget => "budget",
            Self::Risk => "risk",
            Self::Background => "background",
        };
        write!(f, "{s}")
    }
}

/// A discrete requirement extracted from the RFP. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementItem {
    /// Stable identifier (`REQ-001`, `REQ-002`, ...) assigned in document order.
    pub id: String,
    /// The requirement statement.
    pub text: String,
    pub category: RequirementCategory,
    /// Derived rank, 1 = most important. Unique within a run.
    pub priority: u32,
}

/// Research thoroughness setting, linked to the client's subscription plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthTier {
    #[default]
    Default,
    Advanced,
}

impl fmt::Display for DepthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for DepthTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "standard" | "basic" => Ok(Self::Default),
            "advanced" | "premium" | "deep" => Ok(Self::Advanced),
            other => Err(format!("unknown depth tier '{other}' (expected default|advanced)")),
        }
    }
}

/// Voice used by narrative generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Formal,
    Consultative,
    Persuasive,
    Technical,
    Friendly,
}

impl Tone {
    /// Short style guidance handed to the generation model.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Formal => "Use a formal, precise register. Avoid colloquialisms.",
            Self::Consultative => {
                "Write as a trusted advisor: frame recommendations around the client's goals."
            }
            Self::Persuasive => "Lead with outcomes and benefits. Be confident and concrete.",
            Self::Technical => "Be specific about mechanisms, standards and measurable detail.",
            Self::Friendly => "Keep it warm and plain-spoken while staying professional.",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Formal => "formal",
            Self::Consultative => "consultative",
            Self::Persuasive => "persuasive",
            Self::Technical => "technical",
            Self::Friendly => "friendly",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formal" => Ok(Self::Formal),
            "consultative" => Ok(Self::Consultative),
            "persuasive" => Ok(Self::Persuasive),
            "technical" => Ok(Self::Technical),
            "friendly" => Ok(Self::Friendly),
            other => Err(format!("unknown tone '{other}'")),
        }
    }
}

/// Visual identity and authorship carried onto the cover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    /// Team or firm preparing the proposal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_team: Option<String>,
    /// Accent colour as a hex string, e.g. `#0A5FFF`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Consultant preferences and client identity for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPreferences {
    pub client_name: String,
    pub project_title: String,
    #[serde(default)]
    pub tone: Tone,
    /// Keywords the narrative should emphasise, in the consultant's order.
    #[serde(default)]
    pub emphasis_keywords: Vec<String>,
    #[serde(default)]
    pub branding: Branding,
    /// Date printed on the cover. Defaults to the run date when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_on: Option<NaiveDate>,
}

impl ClientPreferences {
    pub fn new(client_name: impl Into<String>, project_title: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            project_title: project_title.into(),
            tone: Tone::default(),
            emphasis_keywords: Vec::new(),
            branding: Branding::default(),
            prepared_on: None,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emphasis_keywords = keywords
            .into_iter()
            .map(|k| {
                let k: String = k.into();
                k.trim().to_string()
            })
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn with_branding(mut self, branding: Branding) -> Self {
        self.branding = branding;
        self
    }
}

/// Plain-text RFP content supplied by the document ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpInput {
    pub text: String,
    /// Optional summary written by the ingestion step or the consultant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub depth_tier: DepthTier,
}

impl RfpInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            summary: None,
            depth_tier: DepthTier::Default,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_tier(mut self, tier: DepthTier) -> Self {
        self.depth_tier = tier;
        self
    }
}
