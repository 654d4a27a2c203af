//! Draft Composer: turns matched templates and validated research into an
//! ordered, slot-filled [`ProposalDraft`].
//!
//! Research slides are filled from their template's aggregated sources; a
//! research slide without a single validated source has every slot marked
//! unresolved. Gaps never abort composition: they are recorded on the slot
//! and collected into the draft's unresolved manifest.

pub mod draft;
pub mod narrative;

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CompositionConfig;
use crate::providers::LanguageModel;
use crate::research::{ResearchOutcome, SourceDocument, UnresolvedReason};
use crate::templates::{SlideTemplate, SlotKind, SlotSpec, TemplateKind, TemplateSelection};
use crate::text;
use crate::types::{ClientPreferences, DepthTier, RequirementItem};

pub use draft::{
    DraftSlide, ProposalDraft, Reference, SeriesPoint, SlideStatus, SlotValue, SummaryRow,
    UNRESOLVED_MARKER, UnresolvedEntry,
};
pub use narrative::{NarrativeRequest, NarrativeWriter};

/// Cover subtitles are one line.
const SUBTITLE_CHARS: usize = 160;
const CELL_CHARS: usize = 160;
const LABEL_CHARS: usize = 40;
/// Requirements summarised on the cover and the summary slides.
const HEADLINE_REQUIREMENTS: usize = 5;

/// Why a slot could not be filled.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionGap {
    /// The template's research produced no validated source.
    NoValidatedResearch(Option<UnresolvedReason>),
    /// Validated sources carry no numbers to chart.
    NoFigures,
    /// Nothing to write or tabulate from.
    NoMaterial,
}

impl fmt::Display for CompositionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidatedResearch(Some(reason)) => {
                write!(f, "no validated research: {reason}")
            }
            Self::NoValidatedResearch(None) => write!(f, "no validated research"),
            Self::NoFigures => write!(f, "validated sources contain no figures to chart"),
            Self::NoMaterial => write!(f, "no material to fill the slot from"),
        }
    }
}

impl From<CompositionGap> for SlotValue {
    fn from(gap: CompositionGap) -> Self {
        SlotValue::unresolved(gap.to_string())
    }
}

/// Canonical slide order: cover, contents, then the matched templates by the
/// best priority of the requirements that drove them (catalog order breaks
/// ties), then the closing summary and Q&A.
pub fn slide_order(
    selection: &TemplateSelection,
    requirements: &[RequirementItem],
) -> Vec<TemplateKind> {
    let priority: HashMap<&str, u32> = requirements
        .iter()
        .map(|r| (r.id.as_str(), r.priority))
        .collect();

    let mut middle: Vec<(u32, usize, TemplateKind)> = selection
        .selected
        .iter()
        .filter(|k| !k.is_mandatory())
        .map(|k| {
            let best = selection
                .requirements_for(*k)
                .iter()
                .filter_map(|id| priority.get(id).copied())
                .min()
                .unwrap_or(u32::MAX);
            (best, k.index(), *k)
        })
        .collect();
    middle.sort_unstable();
    middle.dedup_by_key(|(_, _, k)| *k);

    let mut order = vec![TemplateKind::Cover, TemplateKind::TableOfContents];
    order.extend(middle.into_iter().map(|(_, _, k)| k));
    order.push(TemplateKind::ClosingSummary);
    order.push(TemplateKind::QAndA);
    order
}

/// Everything one slide is built from.
struct SlideContext<'a> {
    template: &'static SlideTemplate,
    driving: Vec<&'a RequirementItem>,
    headline: &'a [&'a RequirementItem],
    sources: &'a [SourceDocument],
    preferences: &'a ClientPreferences,
    prepared_by: &'a str,
}

pub struct DraftComposer {
    config: CompositionConfig,
    writer: NarrativeWriter,
}

impl DraftComposer {
    pub fn new(config: CompositionConfig, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            config,
            writer: NarrativeWriter::new(model),
        }
    }

    /// Build the draft. Never fails; gaps become unresolved slots.
    pub async fn compose(
        &self,
        requirements: &[RequirementItem],
        selection: &TemplateSelection,
        research: &ResearchOutcome,
        preferences: &ClientPreferences,
        depth_tier: DepthTier,
    ) -> ProposalDraft {
        let created_at = Utc::now();
        let order = slide_order(selection, requirements);
        info!(slides = order.len(), "Composing draft");

        let by_id: HashMap<&str, &RequirementItem> =
            requirements.iter().map(|r| (r.id.as_str(), r)).collect();
        let mut headline: Vec<&RequirementItem> = requirements.iter().collect();
        headline.sort_by_key(|r| r.priority);
        headline.truncate(HEADLINE_REQUIREMENTS);

        let prepared_on = preferences
            .prepared_on
            .unwrap_or_else(|| created_at.date_naive());
        let prepared_by = match &preferences.branding.author_team {
            Some(team) => format!("{team}, {}", prepared_on.format("%B %-d, %Y")),
            None => prepared_on.format("%B %-d, %Y").to_string(),
        };

        let mut slides = Vec::with_capacity(order.len());
        for kind in &order {
            let template = kind.template();
            let requirement_ids: Vec<String> = selection
                .requirements_for(*kind)
                .into_iter()
                .map(str::to_string)
                .collect();
            let driving = requirement_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();
            let template_research = research.get(*kind);
            let sources = template_research.map_or(&[][..], |r| r.sources.as_slice());

            let ctx = SlideContext {
                template,
                driving,
                headline: &headline,
                sources,
                preferences,
                prepared_by: &prepared_by,
            };

            let unresearched = template.research_required && sources.is_empty();
            let slot_values: BTreeMap<String, SlotValue> = if unresearched {
                let gap = CompositionGap::NoValidatedResearch(
                    template_research.and_then(|r| r.dominant_reason()),
                );
                template
                    .slots
                    .iter()
                    .map(|s| (s.name.to_string(), SlotValue::from(gap.clone())))
                    .collect()
            } else {
                self.fill_slots(&ctx).await
            };

            let status = if template.research_required {
                template_research.map_or(SlideStatus::Unresolved, |r| r.status())
            } else {
                let filled = slot_values.values().filter(|v| !v.is_unresolved()).count();
                SlideStatus::from_counts(filled, template.slots.len())
            };
            debug!(template = %kind, %status, sources = sources.len(), "Slide composed");

            slides.push(DraftSlide {
                template: *kind,
                title: slide_title(template, preferences),
                slot_values,
                requirement_ids,
                source_refs: sources.iter().map(|s| s.id).collect(),
                status,
                research_required: template.research_required,
            });
        }

        fill_table_of_contents(&mut slides);

        let unresolved = manifest(&slides);
        let sources = referenced_sources(&slides, research);
        let draft = ProposalDraft {
            run_id: Uuid::new_v4(),
            created_at,
            preferences: preferences.clone(),
            depth_tier,
            requirements: requirements.to_vec(),
            slides,
            sources,
            unresolved,
            research_timed_out: research.timed_out,
        };
        info!(
            slides = draft.slides.len(),
            unresolved = draft.unresolved.len(),
            sources = draft.sources.len(),
            "Draft composed"
        );
        draft
    }

    async fn fill_slots(&self, ctx: &SlideContext<'_>) -> BTreeMap<String, SlotValue> {
        let mut values = BTreeMap::new();
        for slot in ctx.template.slots {
            let value = match slot.kind {
                SlotKind::Title => SlotValue::text(slide_title(ctx.template, ctx.preferences)),
                SlotKind::Meta => meta_value(slot, ctx),
                SlotKind::Narrative => self.narrative_value(slot, ctx).await,
                SlotKind::ChartSeries => self.chart_value(ctx),
                SlotKind::TableRows => self.table_value(slot, ctx),
            };
            values.insert(slot.name.to_string(), value);
        }
        values
    }

    async fn narrative_value(&self, slot: &SlotSpec, ctx: &SlideContext<'_>) -> SlotValue {
        let material = narrative_material(ctx);
        let max_chars = if slot.name == "subtitle" {
            SUBTITLE_CHARS
        } else {
            self.config.max_body_chars
        };
        let request = NarrativeRequest {
            template: ctx.template,
            slot,
            preferences: ctx.preferences,
            material: &material,
            max_chars,
        };
        match self.writer.write(&request).await {
            Some(text) => SlotValue::text(text),
            None => CompositionGap::NoMaterial.into(),
        }
    }

    /// Figures quoted in the sources, best source first.
    fn chart_value(&self, ctx: &SlideContext<'_>) -> SlotValue {
        let points: Vec<SeriesPoint> = ctx
            .sources
            .iter()
            .flat_map(|source| {
                text::extract_quantities(&source.snippet)
                    .into_iter()
                    .map(move |q| SeriesPoint {
                        label: text::truncate_chars(&source.title, LABEL_CHARS),
                        value: q.value,
                        unit: q.unit,
                        source_id: source.id,
                    })
            })
            .take(self.config.max_chart_points)
            .collect();
        if points.is_empty() {
            CompositionGap::NoFigures.into()
        } else {
            SlotValue::Series { points }
        }
    }

    fn table_value(&self, slot: &SlotSpec, ctx: &SlideContext<'_>) -> SlotValue {
        let columns: Vec<String> = slot.columns.iter().map(|c| c.to_string()).collect();
        let rows: Vec<Vec<String>> = match ctx.template.kind {
            // Filled once the deck order is known.
            TemplateKind::TableOfContents => return SlotValue::Rows { columns, rows: Vec::new() },
            TemplateKind::Timeline => ctx
                .driving
                .iter()
                .flat_map(|r| text::split_sentences(&r.text))
                .take(self.config.max_table_rows)
                .enumerate()
                .map(|(i, s)| {
                    vec![
                        format!("Phase {}", i + 1),
                        text::truncate_chars(&s, CELL_CHARS),
                    ]
                })
                .collect(),
            _ => ctx
                .sources
                .iter()
                .take(self.config.max_table_rows)
                .map(|s| {
                    vec![
                        s.title.clone(),
                        text::truncate_chars(&s.snippet, CELL_CHARS),
                        s.url.clone(),
                    ]
                })
                .collect(),
        };
        if rows.is_empty() {
            CompositionGap::NoMaterial.into()
        } else {
            SlotValue::Rows { columns, rows }
        }
    }
}

fn slide_title(template: &SlideTemplate, preferences: &ClientPreferences) -> String {
    match template.kind {
        TemplateKind::Cover => preferences.project_title.clone(),
        _ => template.title.to_string(),
    }
}

fn meta_value(slot: &SlotSpec, ctx: &SlideContext<'_>) -> SlotValue {
    match slot.name {
        "client" => SlotValue::text(&ctx.preferences.client_name),
        "prepared_by" => SlotValue::text(ctx.prepared_by),
        "contact" => match &ctx.preferences.branding.author_team {
            Some(team) => SlotValue::text(format!("Questions and discussion: {team}")),
            None => SlotValue::text("Questions and discussion"),
        },
        _ => CompositionGap::NoMaterial.into(),
    }
}

/// Research slides write from their sources; the rest from requirements.
fn narrative_material(ctx: &SlideContext<'_>) -> Vec<String> {
    if ctx.template.research_required {
        return ctx
            .sources
            .iter()
            .map(|s| {
                let title = s.title.trim_end_matches(['.', ':']);
                format!("{title}. {}", s.snippet)
            })
            .collect();
    }
    let requirements: &[&RequirementItem] = match ctx.template.kind {
        TemplateKind::Cover | TemplateKind::ExecutiveSummary | TemplateKind::ClosingSummary => {
            ctx.headline
        }
        _ if ctx.driving.is_empty() => ctx.headline,
        _ => &ctx.driving,
    };
    requirements.iter().map(|r| r.text.clone()).collect()
}

/// Number every slide after the contents page.
fn fill_table_of_contents(slides: &mut [DraftSlide]) {
    let rows: Vec<Vec<String>> = slides
        .iter()
        .filter(|s| !matches!(s.template, TemplateKind::Cover | TemplateKind::TableOfContents))
        .enumerate()
        .map(|(i, s)| vec![(i + 1).to_string(), s.title.clone()])
        .collect();
    if let Some(toc) = slides
        .iter_mut()
        .find(|s| s.template == TemplateKind::TableOfContents)
    {
        let template = toc.template.template();
        let columns = template
            .slot("entries")
            .map(|s| s.columns.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        toc.slot_values
            .insert("entries".to_string(), SlotValue::Rows { columns, rows });
        let filled = toc.slot_values.values().filter(|v| !v.is_unresolved()).count();
        toc.status = SlideStatus::from_counts(filled, template.slots.len());
    }
}

fn manifest(slides: &[DraftSlide]) -> Vec<UnresolvedEntry> {
    slides
        .iter()
        .enumerate()
        .filter_map(|(i, slide)| {
            let slots = slide.unresolved_slots();
            let first = slots.first()?;
            let reason = match slide.slot(first) {
                Some(SlotValue::Unresolved { reason }) => reason.clone(),
                _ => CompositionGap::NoMaterial.to_string(),
            };
            Some(UnresolvedEntry {
                template: slide.template,
                position: i + 1,
                slots: slots.into_iter().map(str::to_string).collect(),
                reason,
            })
        })
        .collect()
}

fn referenced_sources(slides: &[DraftSlide], research: &ResearchOutcome) -> Vec<SourceDocument> {
    let referenced: HashSet<Uuid> = slides
        .iter()
        .flat_map(|s| s.source_refs.iter().copied())
        .collect();
    let mut seen = HashSet::new();
    research
        .templates
        .values()
        .flat_map(|r| r.sources.iter())
        .filter(|s| referenced.contains(&s.id) && seen.insert(s.id))
        .cloned()
        .collect()
}
