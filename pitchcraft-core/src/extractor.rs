//! Requirement extraction: plain RFP text into ranked requirement items.
//!
//! Statements are pulled from bullet lines and sentences, classified into the
//! fixed category taxonomy (headings set a section default), weighted by
//! modal strength, and near-duplicates merged by keyword overlap. The
//! surviving items keep document order; `priority` is their rank by weight.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::text;
use crate::types::{RequirementCategory, RequirementItem};

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•●▪◦–]|\d{1,2}[.)]|[a-zA-Z][)]|\(\w{1,3}\))\s+")
        .expect("bullet regex is valid")
});

const SUMMARY_BONUS: f64 = 0.5;

/// Keyword rules checked in order; the first category with a hit wins unless
/// the enclosing section's category also has a hit.
const CATEGORY_RULES: &[(RequirementCategory, &[&str])] = &[
    (
        RequirementCategory::EvaluationCriterion,
        &[
            "evaluat", "criteria", "criterion", "scored", "scoring", "weighted", "weighting",
            "selection", "assessed",
        ],
    ),
    (
        RequirementCategory::Budget,
        &[
            "budget", "cost", "price", "pricing", "fee", "funding", "$", "€", "£", "usd", "eur",
        ],
    ),
    (
        RequirementCategory::Timeline,
        &[
            "deadline", "timeline", "schedule", "milestone", "weeks", "months", "phase", "due by",
            "completion date", "go-live", "kick-off", "kickoff",
        ],
    ),
    (
        RequirementCategory::Risk,
        &["risk", "mitigat", "contingency", "threat"],
    ),
    (
        RequirementCategory::Constraint,
        &[
            "must not", "shall not", "comply", "complian", "regulat", "gdpr", "hipaa", "restrict",
            "limit", "security", "accessib", "certif",
        ],
    ),
    (
        RequirementCategory::Deliverable,
        &[
            "deliver", "provide", "submit", "report", "documentation", "training", "handover",
            "produce",
        ],
    ),
    (
        RequirementCategory::Background,
        &[
            "background", "currently", "founded", "our organization", "our organisation",
            "we are", "history", "overview", "existing",
        ],
    ),
];

#[derive(Debug, Clone)]
struct Candidate {
    text: String,
    category: RequirementCategory,
    weight: f64,
    position: usize,
}

/// Turns RFP text (plus an optional summary) into requirement items.
pub struct RequirementExtractor {
    config: ExtractionConfig,
}

impl RequirementExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract, de-duplicate and rank requirement items.
    ///
    /// Fails when the text is empty, shorter than the configured minimum, or
    /// contains no statement long enough to be a requirement. No partial
    /// extraction is attempted.
    pub fn extract(
        &self,
        text: &str,
        summary: Option<&str>,
    ) -> Result<Vec<RequirementItem>, ExtractionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        let length = trimmed.chars().count();
        if length < self.config.min_input_chars {
            return Err(ExtractionError::InputTooShort {
                length,
                minimum: self.config.min_input_chars,
            });
        }

        let mut candidates = Vec::new();
        if let Some(summary) = summary.map(str::trim).filter(|s| !s.is_empty()) {
            self.collect_statements(summary, SUMMARY_BONUS, &mut candidates);
        }
        self.collect_statements(trimmed, 0.0, &mut candidates);
        debug!(candidates = candidates.len(), "Collected requirement candidates");

        let mut merged = self.merge_near_duplicates(candidates);
        if merged.is_empty() {
            return Err(ExtractionError::NoRequirements);
        }

        // Rank by weight, earlier statements first on ties.
        let mut order: Vec<usize> = (0..merged.len()).collect();
        order.sort_by(|&a, &b| {
            merged[b]
                .weight
                .total_cmp(&merged[a].weight)
                .then(merged[a].position.cmp(&merged[b].position))
        });
        let mut ranks = vec![0u32; merged.len()];
        for (rank, &idx) in order.iter().enumerate() {
            ranks[idx] = rank as u32 + 1;
        }

        let limit = self.config.max_requirements.max(1) as u32;
        let mut kept: Vec<(Candidate, u32)> = merged
            .drain(..)
            .zip(ranks)
            .filter(|(_, rank)| *rank <= limit)
            .collect();
        kept.sort_by_key(|(c, _)| c.position);

        let items: Vec<RequirementItem> = kept
            .into_iter()
            .enumerate()
            .map(|(i, (candidate, priority))| RequirementItem {
                id: format!("REQ-{:03}", i + 1),
                text: candidate.text,
                category: candidate.category,
                priority,
            })
            .collect();

        info!(requirements = items.len(), "Extracted requirements");
        Ok(items)
    }

    fn collect_statements(&self, body: &str, bonus: f64, out: &mut Vec<Candidate>) {
        let mut section: Option<RequirementCategory> = None;

        for raw_line in body.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let is_bullet = BULLET_RE.is_match(line);
            let content = BULLET_RE.replace(line, "").trim().to_string();

            if !is_bullet && is_heading(&content) {
                section = classify(&content);
                continue;
            }

            // "Budget: must not exceed ...", where a short label before a colon sets the section.
            let content = match content.split_once(':') {
                Some((label, rest))
                    if !rest.trim().is_empty() && label.split_whitespace().count() <= 4 =>
                {
                    if let Some(category) = classify(label) {
                        section = Some(category);
                    }
                    rest.trim().to_string()
                }
                _ => content,
            };

            for sentence in text::split_sentences(&content) {
                if sentence.split_whitespace().count() < self.config.min_statement_words {
                    continue;
                }
                let category = classify_in_section(&sentence, section)
                    .unwrap_or(RequirementCategory::Need);
                out.push(Candidate {
                    weight: modal_weight(&sentence) + bonus,
                    text: sentence,
                    category,
                    position: out.len(),
                });
            }
        }
    }

    /// Merge statements whose keyword overlap reaches the threshold, keeping
    /// the higher-weighted phrasing at the earlier position.
    fn merge_near_duplicates(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            let keywords = text::keywords(&candidate.text);
            let duplicate = kept.iter_mut().find(|k| {
                text::keyword_overlap(&text::keywords(&k.text), &keywords)
                    >= self.config.similarity_threshold
            });
            match duplicate {
                Some(existing) => {
                    debug!(
                        kept = %existing.text,
                        dropped = %candidate.text,
                        "Merged near-duplicate requirement"
                    );
                    if candidate.weight > existing.weight {
                        existing.text = candidate.text;
                        existing.category = candidate.category;
                        existing.weight = candidate.weight;
                    }
                    existing.position = existing.position.min(candidate.position);
                }
                None => kept.push(candidate),
            }
        }
        kept
    }
}

/// Strength of the obligation a statement expresses.
fn modal_weight(sentence: &str) -> f64 {
    let lower = format!(" {} ", text::normalize(sentence));
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(&format!(" {w} ")));

    if has(&["must", "shall", "required", "mandatory", "essential"]) {
        3.0
    } else if has(&["should", "expected", "important", "needs", "need"]) {
        2.0
    } else if has(&["may", "could", "optional", "preferred", "desirable"])
        || lower.contains("nice to have")
    {
        1.0
    } else {
        1.5
    }
}

fn classify(statement: &str) -> Option<RequirementCategory> {
    let lower = statement.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(category, _)| *category)
        .or_else(|| {
            ["scope", "requirement", "objective", "goal", "need"]
                .iter()
                .any(|n| lower.contains(n))
                .then_some(RequirementCategory::Need)
        })
}

/// Like [`classify`], but a keyword hit for the section's own category beats
/// an earlier rule, and a statement with no hit inherits the section.
fn classify_in_section(
    statement: &str,
    section: Option<RequirementCategory>,
) -> Option<RequirementCategory> {
    if let Some(section) = section {
        let lower = statement.to_lowercase();
        let section_hit = CATEGORY_RULES
            .iter()
            .filter(|(category, _)| *category == section)
            .any(|(_, needles)| needles.iter().any(|n| lower.contains(n)));
        if section_hit {
            return Some(section);
        }
    }
    classify(statement).or(section)
}

fn is_heading(line: &str) -> bool {
    let line = line.trim_start_matches('#').trim();
    if line.is_empty() {
        return false;
    }
    if line.ends_with(':') {
        return true;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() > 6 || line.ends_with(['.', '!', '?', ';', ',']) {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = !letters.is_empty() && letters.iter().all(|c| c.is_uppercase());
    let title_case = words.iter().all(|w| {
        w.chars().next().is_some_and(|c| c.is_uppercase() || !c.is_alphabetic())
            || ["of", "and", "the", "for", "to", "a", "an", "in", "&"].contains(w)
    });
    all_caps || (title_case && words.len() <= 5)
}
