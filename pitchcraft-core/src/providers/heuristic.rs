//! Offline model: keyword-overlap scoring and extractive writing.
//!
//! Needs no network and is deterministic, which makes it the default for dry
//! runs and the fallback writer when a generative model fails.

use async_trait::async_trait;

use super::{LanguageModel, MATERIAL_HEADER};
use crate::error::ModelError;
use crate::text;
use crate::types::Tone;

/// Sentences kept by the extractive writer.
const SUMMARY_SENTENCES: usize = 3;

/// Fraction of question keywords a candidate must cover to score 1.0.
const FULL_COVERAGE: f64 = 2.0 / 3.0;

#[derive(Debug, Default, Clone)]
pub struct HeuristicModel;

impl HeuristicModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LanguageModel for HeuristicModel {
    fn id(&self) -> &str {
        "heuristic"
    }

    async fn score(&self, question: &str, candidate: &str) -> Result<f64, ModelError> {
        Ok(keyword_score(question, candidate))
    }

    async fn generate(
        &self,
        prompt: &str,
        _tone: Tone,
        keywords: &[String],
    ) -> Result<String, ModelError> {
        let (instruction, material) = split_prompt(prompt);
        if material.is_empty() {
            return Err(ModelError::InvalidResponse {
                message: "prompt carries no material to draw from".into(),
            });
        }
        Ok(extractive_summary(&material, instruction, keywords, SUMMARY_SENTENCES))
    }
}

/// Share of the question's keywords found in the candidate, saturating at
/// [`FULL_COVERAGE`].
pub fn keyword_score(question: &str, candidate: &str) -> f64 {
    let query = text::keywords(question);
    (text::coverage(&query, candidate) / FULL_COVERAGE).min(1.0)
}

/// Pick the `max_sentences` sentences of `material` with the most emphasis
/// keyword hits (then topic coverage), and return them in their original order.
pub fn extractive_summary(
    material: &[String],
    topic: &str,
    keywords: &[String],
    max_sentences: usize,
) -> String {
    let topic_keywords = text::keywords(topic);
    let sentences: Vec<String> = material
        .iter()
        .flat_map(|m| text::split_sentences(m))
        .collect();

    let mut ranked: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let emphasis = text::phrase_hits(s, keywords) as f64;
            (i, 2.0 * emphasis + text::coverage(&topic_keywords, s))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen: Vec<usize> = ranked
        .into_iter()
        .take(max_sentences.max(1))
        .map(|(i, _)| i)
        .collect();
    chosen.sort_unstable();

    chosen
        .into_iter()
        .map(|i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a generation prompt into its instruction and `- ` material lines.
///
/// The header only counts on a line of its own, so instruction text quoting
/// it (a client called "Material: Handling Ltd") cannot move the split.
fn split_prompt(prompt: &str) -> (&str, Vec<String>) {
    let mut offset = 0;
    for line in prompt.split_inclusive('\n') {
        if line.trim() == MATERIAL_HEADER {
            let material = prompt[offset + line.len()..]
                .lines()
                .filter_map(|l| l.trim().strip_prefix("- "))
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            return (&prompt[..offset], material);
        }
        offset += line.len();
    }
    (prompt, Vec::new())
}
