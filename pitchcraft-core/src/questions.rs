//! Question Generator: research questions per (requirement, template) pair.
//!
//! The number of questions and the intents they cover are a pure function of
//! the depth tier: the first `k` intents of [`QuestionIntent::ALL`], where `k`
//! comes from [`QuestionConfig`]. Only research-backed templates get questions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::QuestionConfig;
use crate::templates::{TemplateKind, TemplateSelection};
use crate::text;
use crate::types::{DepthTier, RequirementItem};

/// Maximum number of topic words carried into a question.
const TOPIC_WORDS: usize = 6;

/// The angle a question takes. Order matters: lower tiers take a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionIntent {
    Overview,
    Evidence,
    Comparative,
    Quantitative,
    Alternative,
}

impl QuestionIntent {
    pub const ALL: [QuestionIntent; 5] = [
        Self::Overview,
        Self::Evidence,
        Self::Comparative,
        Self::Quantitative,
        Self::Alternative,
    ];

    fn phrase(self, topic: &str, focus: &str) -> String {
        match self {
            Self::Overview => format!("What are the key facts about {topic} regarding {focus}?"),
            Self::Evidence => {
                format!("What evidence or precedent supports {topic} in terms of {focus}?")
            }
            Self::Comparative => {
                format!("How do leading providers and approaches compare on {topic}?")
            }
            Self::Quantitative => format!("What figures or statistics quantify {topic}?"),
            Self::Alternative => {
                format!("What alternative approaches to {topic} should be considered for {focus}?")
            }
        }
    }

    fn query(self, topic: &str, focus: &str) -> String {
        match self {
            Self::Overview => format!("{topic} {focus}"),
            Self::Evidence => format!("{topic} case study"),
            Self::Comparative => format!("{topic} comparison"),
            Self::Quantitative => format!("{topic} statistics"),
            Self::Alternative => format!("{topic} alternatives"),
        }
    }
}

impl fmt::Display for QuestionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Overview => "overview",
            Self::Evidence => "evidence",
            Self::Comparative => "comparative",
            Self::Quantitative => "quantitative",
            Self::Alternative => "alternative",
        };
        f.write_str(s)
    }
}

/// One research question. Generated once per run; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuestion {
    pub id: Uuid,
    pub requirement_id: String,
    pub template: TemplateKind,
    /// Natural-language question, used for validation scoring.
    pub text: String,
    /// Short keyword query sent to search providers.
    pub query: String,
    pub intent: QuestionIntent,
    pub depth_tier: DepthTier,
}

pub struct QuestionGenerator {
    config: QuestionConfig,
}

impl QuestionGenerator {
    pub fn new(config: QuestionConfig) -> Self {
        Self { config }
    }

    /// Number of questions per (requirement, template) pair at `tier`.
    pub fn questions_per_pair(&self, tier: DepthTier) -> usize {
        let k = match tier {
            DepthTier::Default => self.config.default_questions,
            DepthTier::Advanced => self.config.advanced_questions,
        };
        k.clamp(1, QuestionIntent::ALL.len())
    }

    /// Intents covered at `tier`.
    pub fn intents(&self, tier: DepthTier) -> &'static [QuestionIntent] {
        &QuestionIntent::ALL[..self.questions_per_pair(tier)]
    }

    /// Questions for one requirement on one template.
    pub fn for_pair(
        &self,
        requirement: &RequirementItem,
        template: TemplateKind,
        tier: DepthTier,
    ) -> Vec<ResearchQuestion> {
        let focus = template.template().research_focus;
        let words = text::significant_words(&requirement.text);
        let topic = if words.is_empty() {
            requirement.text.trim().to_lowercase()
        } else {
            words
                .into_iter()
                .take(TOPIC_WORDS)
                .collect::<Vec<_>>()
                .join(" ")
        };

        self.intents(tier)
            .iter()
            .map(|&intent| ResearchQuestion {
                id: Uuid::new_v4(),
                requirement_id: requirement.id.clone(),
                template,
                text: intent.phrase(&topic, focus),
                query: intent.query(&topic, focus),
                intent,
                depth_tier: tier,
            })
            .collect()
    }

    /// Questions for every research-backed assignment in the selection.
    pub fn generate(
        &self,
        selection: &TemplateSelection,
        requirements: &[RequirementItem],
        tier: DepthTier,
    ) -> Vec<ResearchQuestion> {
        let by_id: HashMap<&str, &RequirementItem> =
            requirements.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut questions = Vec::new();
        for assignment in &selection.assignments {
            if !assignment.template.template().research_required {
                continue;
            }
            let Some(requirement) = by_id.get(assignment.requirement_id.as_str()) else {
                debug!(
                    requirement = %assignment.requirement_id,
                    "Assignment references unknown requirement"
                );
                continue;
            };
            questions.extend(self.for_pair(requirement, assignment.template, tier));
        }

        info!(questions = questions.len(), tier = %tier, "Generated research questions");
        questions
    }
}
