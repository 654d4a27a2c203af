//! Draft data model: slides, slot values, and the proposal handed to rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::error::{PitchcraftError, Result};
use crate::persistence;
use crate::research::SourceDocument;
use crate::templates::TemplateKind;
use crate::types::{ClientPreferences, DepthTier, RequirementItem};

/// Text shown in place of content that could not be produced.
pub const UNRESOLVED_MARKER: &str = "UNRESOLVED";

/// One point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// The source the figure was read from.
    pub source_id: Uuid,
}

/// Content of a single slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotValue {
    Text {
        text: String,
    },
    Series {
        points: Vec<SeriesPoint>,
    },
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Nothing could be filled; `reason` explains why to the reviewer.
    Unresolved {
        reason: String,
    },
}

impl SlotValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn unresolved(reason: impl Into<String>) -> Self {
        Self::Unresolved {
            reason: reason.into(),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }

    /// Plain-text rendering, with [`UNRESOLVED_MARKER`] for gaps.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Series { points } => points
                .iter()
                .map(|p| match &p.unit {
                    Some(unit) => format!("{}: {} {unit}", p.label, p.value),
                    None => format!("{}: {}", p.label, p.value),
                })
                .collect::<Vec<_>>()
                .join("; "),
            Self::Rows { rows, .. } => rows
                .iter()
                .map(|r| r.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Unresolved { .. } => UNRESOLVED_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    Complete,
    Partial,
    Unresolved,
}

impl SlideStatus {
    /// Complete iff everything succeeded, partial iff something did, else
    /// unresolved. Nothing out of nothing is unresolved.
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if succeeded == 0 {
            Self::Unresolved
        } else if succeeded >= total {
            Self::Complete
        } else {
            Self::Partial
        }
    }
}

impl fmt::Display for SlideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Unresolved => "unresolved",
        };
        f.pad(s)
    }
}

/// A populated slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSlide {
    pub template: TemplateKind,
    pub title: String,
    /// Slot name → content, one entry per catalog slot.
    pub slot_values: BTreeMap<String, SlotValue>,
    /// Requirements that drove this slide.
    pub requirement_ids: Vec<String>,
    /// Sources behind the slide, best first.
    pub source_refs: Vec<Uuid>,
    pub status: SlideStatus,
    pub research_required: bool,
}

impl DraftSlide {
    pub fn slot(&self, name: &str) -> Option<&SlotValue> {
        self.slot_values.get(name)
    }

    /// Names of unresolved slots, in catalog slot order.
    pub fn unresolved_slots(&self) -> Vec<&'static str> {
        self.template
            .template()
            .slots
            .iter()
            .filter(|s| self.slot(s.name).is_none_or(SlotValue::is_unresolved))
            .map(|s| s.name)
            .collect()
    }
}

/// A manifest line for the consultant's review step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedEntry {
    pub template: TemplateKind,
    /// 1-based slide number.
    pub position: usize,
    pub slots: Vec<String>,
    pub reason: String,
}

/// A reference-listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
    pub provider: String,
    pub confidence: f64,
}

/// A row of the executive-summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub requirement_id: String,
    pub requirement: String,
    pub templates: Vec<TemplateKind>,
    /// Worst status among the slides the requirement drove.
    pub status: SlideStatus,
}

/// The run's output: ordered slides plus the metadata rendering needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub preferences: ClientPreferences,
    pub depth_tier: DepthTier,
    pub requirements: Vec<RequirementItem>,
    pub slides: Vec<DraftSlide>,
    /// Every source any slide refers to.
    pub sources: Vec<SourceDocument>,
    /// Slides with at least one unresolved slot.
    pub unresolved: Vec<UnresolvedEntry>,
    /// Whether research hit the run timeout.
    #[serde(default)]
    pub research_timed_out: bool,
}

impl ProposalDraft {
    pub fn slide(&self, template: TemplateKind) -> Option<&DraftSlide> {
        self.slides.iter().find(|s| s.template == template)
    }

    pub fn unresolved_manifest(&self) -> &[UnresolvedEntry] {
        &self.unresolved
    }

    pub fn source(&self, id: Uuid) -> Option<&SourceDocument> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Every referenced source across the deck, in first-appearance order,
    /// one entry per normalized URL.
    pub fn references(&self) -> Vec<Reference> {
        let mut seen = HashSet::new();
        self.slides
            .iter()
            .flat_map(|s| s.source_refs.iter())
            .filter_map(|id| self.source(*id))
            .filter(|doc| seen.insert(doc.normalized_url.clone()))
            .map(|doc| Reference {
                title: doc.title.clone(),
                url: doc.url.clone(),
                provider: doc.retrieved_via.clone(),
                confidence: doc.confidence_score,
            })
            .collect()
    }

    /// One row per requirement, with the slides it drove.
    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.requirements
            .iter()
            .map(|req| {
                let slides: Vec<&DraftSlide> = self
                    .slides
                    .iter()
                    .filter(|s| s.requirement_ids.contains(&req.id))
                    .collect();
                SummaryRow {
                    requirement_id: req.id.clone(),
                    requirement: req.text.clone(),
                    templates: slides.iter().map(|s| s.template).collect(),
                    status: slides
                        .iter()
                        .map(|s| s.status)
                        .max()
                        .unwrap_or(SlideStatus::Unresolved),
                }
            })
            .collect()
    }

    /// Number of slides with each status.
    pub fn status_counts(&self) -> BTreeMap<SlideStatus, usize> {
        let mut counts = BTreeMap::new();
        for slide in &self.slides {
            *counts.entry(slide.status).or_insert(0) += 1;
        }
        counts
    }

    /// Write the draft as a JSON checkpoint.
    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::atomic_write_json(path, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        persistence::load_json(path)?.ok_or_else(|| {
            PitchcraftError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no draft at {}", path.display()),
            ))
        })
    }
}
