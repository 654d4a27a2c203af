//! Text helpers shared by the extractor, matcher, scorer and composer.
//!
//! Similarity is keyword overlap (Jaccard) over stopword-filtered,
//! NFKC-normalised tokens. Good enough to catch near-duplicate requirement
//! phrasing and topical relevance without an embedding model.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "shall", "should", "may", "might", "must", "can",
    "could", "of", "in", "to", "for", "with", "on", "at", "from", "by", "about", "as", "into",
    "through", "during", "before", "after", "above", "below", "between", "this", "that",
    "these", "those", "it", "its", "and", "but", "or", "not", "all", "any", "our", "their",
    "they", "them", "we", "you", "your", "which", "who", "what", "when", "where", "how", "also",
    "such", "other", "than", "then", "there", "each", "per", "via", "within", "including",
];

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([$€£])?\s?(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s?(%|(?:percent|billion|million|thousand|bn|m|k)\b)?",
    )
    .expect("quantity regex is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex is valid"));

/// NFKC-normalise, lowercase and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove HTML tags and decode the handful of entities search APIs emit.
pub fn strip_markup(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, "");
    squash_whitespace(
        &stripped
            .replace("&quot;", "\"")
            .replace("&#039;", "'")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">"),
    )
}

/// Significant, lightly stemmed tokens of `text`.
pub fn keywords(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(stem)
        .collect()
}

/// Significant words of `text` in order of first appearance, unstemmed.
pub fn significant_words(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    normalize(text)
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-'))
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

fn stem(word: &str) -> String {
    if word.len() > 4 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if word.len() > 4 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Jaccard similarity of two keyword sets.
pub fn keyword_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Jaccard similarity of the keywords of two texts.
pub fn similarity(a: &str, b: &str) -> f64 {
    keyword_overlap(&keywords(a), &keywords(b))
}

/// Fraction of `query`'s keywords that appear in `text`.
pub fn coverage(query: &BTreeSet<String>, text: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let found = keywords(text);
    query.iter().filter(|k| found.contains(*k)).count() as f64 / query.len() as f64
}

/// Count how many `phrases` occur (case-insensitively) in `text`.
pub fn phrase_hits(text: &str, phrases: &[String]) -> usize {
    let haystack = normalize(text);
    phrases
        .iter()
        .map(|p| normalize(p))
        .filter(|p| !p.is_empty() && haystack.contains(p.as_str()))
        .count()
}

/// Split prose into sentences on terminal punctuation and line breaks.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let chars: Vec<char> = line.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.get(i + 1).is_none_or(|next| next.is_whitespace());
            if at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }
    sentences
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let s = squash_whitespace(raw);
    if !s.is_empty() {
        out.push(s);
    }
}

/// Truncate to at most `max` characters, cutting at a word boundary and
/// appending an ellipsis when anything was removed.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > max / 2 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end_matches([',', ';', ':', ' ']))
}

/// A number found in prose, with its unit or currency marker if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Option<String>,
}

/// Extract quantities such as `42%`, `$1.2 billion` or `3,500` from text.
///
/// Bare four-digit numbers between 1900 and 2100 are treated as years and skipped.
pub fn extract_quantities(text: &str) -> Vec<Quantity> {
    QUANTITY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(2)?.as_str().replace(',', "");
            let value: f64 = raw.parse().ok()?;
            let currency = caps.get(1).map(|m| m.as_str().to_string());
            let suffix = caps.get(3).map(|m| m.as_str().to_lowercase());
            let is_year = currency.is_none()
                && suffix.is_none()
                && raw.len() == 4
                && (1900.0..=2100.0).contains(&value);
            if is_year {
                return None;
            }
            let unit = match (currency, suffix) {
                (Some(c), Some(s)) => Some(format!("{c} {s}")),
                (Some(c), None) => Some(c),
                (None, Some(s)) if s == "percent" => Some("%".to_string()),
                (None, Some(s)) => Some(s),
                (None, None) => None,
            };
            Some(Quantity { value, unit })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_width_and_case() {
        assert_eq!(normalize("  Ｃｌｏｕｄ   Migration "), "cloud migration");
    }

    #[test]
    fn test_keywords_drop_stopwords_and_stem() {
        let kw = keywords("The vendors must provide monthly reports");
        assert!(kw.contains("vendor"));
        assert!(kw.contains("report"));
        assert!(kw.contains("monthly"));
        assert!(!kw.contains("the"));
        assert!(!kw.contains("must"));
    }

    #[test]
    fn test_significant_words_keep_order() {
        let words = significant_words("Migrate the dispatch platform, then migrate billing");
        assert_eq!(words, vec!["migrate", "dispatch", "platform", "billing"]);
    }

    #[test]
    fn test_similarity_near_duplicates() {
        let a = "The vendor must provide monthly progress reports";
        let b = "Vendor shall provide monthly progress reports";
        assert!(similarity(a, b) >= 0.8);
        assert!(similarity(a, "Budget is capped at 200k") < 0.2);
    }

    #[test]
    fn test_coverage() {
        let q = keywords("cloud migration cost");
        assert!((coverage(&q, "Cloud migration reduces cost by 30%") - 1.0).abs() < f64::EPSILON);
        assert!(coverage(&q, "Unrelated text entirely") < f64::EPSILON);
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("First point. Second point? Third\nFourth line v1.2 stays");
        assert_eq!(
            s,
            vec!["First point.", "Second point?", "Third", "Fourth line v1.2 stays"]
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        let t = truncate_chars("alpha beta gamma delta epsilon", 16);
        assert!(t.ends_with('…'));
        assert!(t.chars().count() <= 16);
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("Cloud <span class=\"searchmatch\">migration</span> &amp; cost"),
            "Cloud migration & cost"
        );
    }

    #[test]
    fn test_extract_quantities() {
        let q = extract_quantities("Adoption grew 42% in 2023 to $1.5 billion across 3,500 firms");
        assert_eq!(q.len(), 3);
        assert!((q[0].value - 42.0).abs() < f64::EPSILON);
        assert_eq!(q[0].unit.as_deref(), Some("%"));
        assert_eq!(q[1].unit.as_deref(), Some("$ billion"));
        assert!((q[2].value - 3500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_phrase_hits() {
        let kws = vec!["Zero Trust".to_string(), "cost".to_string(), "".to_string()];
        assert_eq!(phrase_hits("A zero trust rollout lowers cost", &kws), 2);
    }
}
