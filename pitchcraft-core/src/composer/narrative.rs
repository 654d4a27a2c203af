//! Tone- and keyword-conditioned prose for narrative slots.
//!
//! Prompts carry an instruction block followed by a [`MATERIAL_HEADER`]
//! block of `- ` lines. When the model fails, the writer falls back to an
//! extractive summary of the same material, so a slot only stays empty when
//! there is no material at all.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::providers::heuristic::extractive_summary;
use crate::providers::{LanguageModel, MATERIAL_HEADER};
use crate::templates::{SlideTemplate, SlotSpec};
use crate::text;
use crate::types::ClientPreferences;

const FALLBACK_SENTENCES: usize = 3;

/// What a narrative slot should be written from.
pub struct NarrativeRequest<'a> {
    pub template: &'a SlideTemplate,
    pub slot: &'a SlotSpec,
    pub preferences: &'a ClientPreferences,
    /// Sentences or snippets to draw on.
    pub material: &'a [String],
    pub max_chars: usize,
}

pub struct NarrativeWriter {
    model: Arc<dyn LanguageModel>,
}

impl NarrativeWriter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Write the slot, or `None` when there is nothing to write from.
    pub async fn write(&self, request: &NarrativeRequest<'_>) -> Option<String> {
        let material: Vec<String> = request
            .material
            .iter()
            .map(|m| text::squash_whitespace(m))
            .filter(|m| !m.is_empty())
            .collect();
        if material.is_empty() {
            return None;
        }

        let prompt = build_prompt(request, &material);
        let keywords = &request.preferences.emphasis_keywords;
        let written = match self
            .model
            .generate(&prompt, request.preferences.tone, keywords)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(
                    template = %request.template.kind,
                    slot = request.slot.name,
                    model = self.model.id(),
                    "Model returned empty text; using extractive fallback"
                );
                extractive_summary(&material, request.slot.focus, keywords, FALLBACK_SENTENCES)
            }
            Err(e) => {
                warn!(
                    template = %request.template.kind,
                    slot = request.slot.name,
                    model = self.model.id(),
                    error = %e,
                    "Generation failed; using extractive fallback"
                );
                extractive_summary(&material, request.slot.focus, keywords, FALLBACK_SENTENCES)
            }
        };

        let written = text::truncate_chars(&text::squash_whitespace(&written), request.max_chars);
        debug!(
            template = %request.template.kind,
            slot = request.slot.name,
            chars = written.chars().count(),
            "Narrative written"
        );
        (!written.is_empty()).then_some(written)
    }
}

/// Instruction block plus material lines.
pub fn build_prompt(request: &NarrativeRequest<'_>, material: &[String]) -> String {
    let prefs = request.preferences;
    let mut prompt = format!(
        "Write the {} of the \"{}\" slide in a proposal to {} for \"{}\".\n",
        request.slot.name.replace('_', " "),
        request.template.title,
        prefs.client_name,
        prefs.project_title,
    );
    if !request.slot.focus.is_empty() {
        prompt.push_str(&format!("Focus: {}.\n", request.slot.focus));
    }
    prompt.push_str(&format!("Tone: {}\n", prefs.tone.guidance()));
    if !prefs.emphasis_keywords.is_empty() {
        prompt.push_str(&format!(
            "Emphasise: {}.\n",
            prefs.emphasis_keywords.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "Use only the material below. At most {} characters.\n",
        request.max_chars
    ));
    prompt.push_str(MATERIAL_HEADER);
    prompt.push('\n');
    for line in material {
        prompt.push_str("- ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt
}
