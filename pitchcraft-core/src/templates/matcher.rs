//! Template Matcher: assigns requirements to catalog templates.
//!
//! Score = 0.5 × category affinity (primary 1.0, secondary 0.5) + 0.5 ×
//! lexical cue hits (saturating at three). Mandatory templates are never
//! scored; they are always selected. Every comparison is total and ties go
//! to the lower catalog index, so the result is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::catalog::{CATALOG, SlideTemplate, TemplateKind};
use crate::config::MatchingConfig;
use crate::text;
use crate::types::RequirementItem;

const CUE_SATURATION: f64 = 3.0;

/// A requirement placed on a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateAssignment {
    pub requirement_id: String,
    pub template: TemplateKind,
    pub match_score: f64,
}

/// Matcher output: the assignments plus every selected template in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSelection {
    pub assignments: Vec<TemplateAssignment>,
    pub selected: Vec<TemplateKind>,
}

impl TemplateSelection {
    /// Requirement ids assigned to `template`, in assignment order.
    pub fn requirements_for(&self, template: TemplateKind) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|a| a.template == template)
            .map(|a| a.requirement_id.as_str())
            .collect()
    }

    /// Templates `requirement_id` was assigned to.
    pub fn templates_for(&self, requirement_id: &str) -> Vec<TemplateKind> {
        self.assignments
            .iter()
            .filter(|a| a.requirement_id == requirement_id)
            .map(|a| a.template)
            .collect()
    }

    pub fn is_selected(&self, template: TemplateKind) -> bool {
        self.selected.contains(&template)
    }
}

pub struct TemplateMatcher {
    config: MatchingConfig,
}

impl TemplateMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Score a requirement against a single template.
    pub fn score(requirement: &RequirementItem, template: &SlideTemplate) -> f64 {
        if template.is_mandatory() {
            return 0.0;
        }
        let affinity = if template.primary.contains(&requirement.category) {
            1.0
        } else if template.secondary.contains(&requirement.category) {
            0.5
        } else {
            0.0
        };
        let haystack = text::normalize(&requirement.text);
        let hits = template
            .cues
            .iter()
            .filter(|cue| haystack.contains(*cue))
            .count() as f64;
        0.5 * affinity + 0.5 * (hits.min(CUE_SATURATION) / CUE_SATURATION)
    }

    /// Assign every requirement to one or more templates.
    pub fn assign(&self, requirements: &[RequirementItem]) -> TemplateSelection {
        let per_requirement = self.config.max_templates_per_requirement.max(1);
        let mut assignments = Vec::new();

        for requirement in requirements {
            let ranked = ranked_templates(requirement, |_| true);
            let mut chosen: Vec<(TemplateKind, f64)> = ranked
                .iter()
                .copied()
                .filter(|(_, score)| *score >= self.config.min_match_score)
                .take(per_requirement)
                .collect();
            if chosen.is_empty() {
                chosen.push(fallback_template(&ranked));
            }
            for (template, match_score) in chosen {
                assignments.push(TemplateAssignment {
                    requirement_id: requirement.id.clone(),
                    template,
                    match_score,
                });
            }
        }

        let assignments = self.enforce_run_limit(requirements, assignments);

        let selected: Vec<TemplateKind> = CATALOG
            .iter()
            .map(|t| t.kind)
            .filter(|k| k.is_mandatory() || assignments.iter().any(|a| a.template == *k))
            .collect();

        info!(
            requirements = requirements.len(),
            assignments = assignments.len(),
            templates = selected.len(),
            "Matched requirements to templates"
        );
        TemplateSelection {
            assignments,
            selected,
        }
    }

    /// Drop the weakest templates when the run would exceed its template
    /// budget, moving orphaned requirements onto their best surviving template.
    fn enforce_run_limit(
        &self,
        requirements: &[RequirementItem],
        assignments: Vec<TemplateAssignment>,
    ) -> Vec<TemplateAssignment> {
        let budget = self
            .config
            .max_templates_per_run
            .saturating_sub(TemplateKind::MANDATORY.len())
            .max(1);

        let mut aggregate: BTreeMap<TemplateKind, f64> = BTreeMap::new();
        for a in &assignments {
            *aggregate.entry(a.template).or_default() += a.match_score;
        }
        if aggregate.len() <= budget {
            return assignments;
        }

        let mut ranked: Vec<(TemplateKind, f64)> = aggregate.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.index().cmp(&b.0.index())));
        let kept: BTreeSet<TemplateKind> = ranked.iter().take(budget).map(|(k, _)| *k).collect();
        debug!(
            dropped = ranked.len() - kept.len(),
            budget, "Trimming template selection to run limit"
        );

        let mut trimmed: Vec<TemplateAssignment> = assignments
            .into_iter()
            .filter(|a| kept.contains(&a.template))
            .collect();

        for requirement in requirements {
            if trimmed.iter().any(|a| a.requirement_id == requirement.id) {
                continue;
            }
            let ranked = ranked_templates(requirement, |k| kept.contains(&k));
            let (template, match_score) = ranked
                .first()
                .copied()
                .unwrap_or_else(|| (first_kept(&kept), 0.0));
            trimmed.push(TemplateAssignment {
                requirement_id: requirement.id.clone(),
                template,
                match_score,
            });
        }
        trimmed
    }
}

/// Non-mandatory templates passing `keep`, best score first, lower index on ties.
fn ranked_templates(
    requirement: &RequirementItem,
    keep: impl Fn(TemplateKind) -> bool,
) -> Vec<(TemplateKind, f64)> {
    let mut scored: Vec<(TemplateKind, f64)> = CATALOG
        .iter()
        .filter(|t| !t.is_mandatory() && keep(t.kind))
        .map(|t| (t.kind, TemplateMatcher::score(requirement, t)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.index().cmp(&b.0.index())));
    scored
}

fn fallback_template(ranked: &[(TemplateKind, f64)]) -> (TemplateKind, f64) {
    match ranked.first() {
        Some(&(kind, score)) if score > 0.0 => (kind, score),
        _ => (TemplateKind::Understanding, 0.0),
    }
}

fn first_kept(kept: &BTreeSet<TemplateKind>) -> TemplateKind {
    kept.iter()
        .next()
        .copied()
        .unwrap_or(TemplateKind::Understanding)
}
