//! Validated sources, URL normalisation and per-template aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

use crate::providers::SearchHit;
use crate::questions::ResearchQuestion;

/// Query parameters that only track clicks.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "ref", "ref_src"];

/// A search result that has been scored by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub url: String,
    /// Dedup key; see [`normalize_url`].
    pub normalized_url: String,
    pub title: String,
    pub snippet: String,
    /// Identifier of the provider that returned it.
    pub retrieved_via: String,
    /// Provider position in priority order, 0 = primary.
    pub provider_rank: usize,
    pub confidence_score: f64,
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub question_id: Uuid,
    pub requirement_id: String,
}

impl SourceDocument {
    pub fn from_hit(
        hit: SearchHit,
        provider: &str,
        provider_rank: usize,
        confidence_score: f64,
        validated: bool,
        question: &ResearchQuestion,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            normalized_url: normalize_url(&hit.url),
            url: hit.url,
            title: hit.title,
            snippet: hit.snippet,
            retrieved_via: provider.to_string(),
            provider_rank,
            confidence_score,
            validated,
            published_at: hit.published_at,
            question_id: question.id,
            requirement_id: question.requirement_id.clone(),
        }
    }

    /// Preference order between two documents for the same URL: higher
    /// confidence, then the higher-priority provider, then the more recent.
    pub fn preference(&self, other: &Self) -> Ordering {
        other
            .confidence_score
            .total_cmp(&self.confidence_score)
            .then(self.provider_rank.cmp(&other.provider_rank))
            .then(other.published_at.cmp(&self.published_at))
    }
}

/// Canonical form of a URL for de-duplication.
///
/// Drops the scheme, a leading `www.`, the fragment, trailing slashes and
/// tracking parameters, and sorts the remaining query parameters. Host case
/// is folded; path case is kept. Unparseable input is trimmed and lowercased.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).or_else(|_| Url::parse(&format!("https://{trimmed}")));
    let Ok(url) = parsed else {
        return trimmed.to_lowercase();
    };
    let Some(host) = url.host_str() else {
        return trimmed.to_lowercase();
    };

    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut out = host.to_string();
    if let Some(port) = url.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(url.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query: Vec<String> = params
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        out.push('?');
        out.push_str(&query.join("&"));
    }
    out
}

/// Collects the sources of one template, keeping one document per normalized URL.
#[derive(Debug, Default)]
pub struct SourceAggregator {
    by_url: BTreeMap<String, SourceDocument>,
}

impl SourceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. Returns `true` if it was kept (new URL, or preferred
    /// over the document already held for that URL).
    pub fn add(&mut self, doc: SourceDocument) -> bool {
        match self.by_url.get(&doc.normalized_url) {
            Some(existing) if doc.preference(existing) != Ordering::Less => false,
            _ => {
                self.by_url.insert(doc.normalized_url.clone(), doc);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Best first: confidence, provider priority, recency, then URL.
    pub fn into_sorted(self) -> Vec<SourceDocument> {
        let mut docs: Vec<SourceDocument> = self.by_url.into_values().collect();
        docs.sort_by(|a, b| a.preference(b).then_with(|| a.normalized_url.cmp(&b.normalized_url)));
        docs
    }
}
