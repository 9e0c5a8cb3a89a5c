//! Full-text search over the index artifact.
//!
//! The artifact is produced by the site's external indexing step and holds
//! one [`IndexedPage`] per published page, optionally split into sections
//! keyed by heading anchor.
//!
//! # Scoring
//!
//! 1. Tokenize the query into lowercase alphanumeric terms.
//! 2. A page matches when every term occurs in its title or content.
//! 3. Raw score = `3 × title hits + content hits`.
//! 4. Normalize raw scores to `[0, 1]` (min-max).
//! 5. Sort by score (desc), then url (asc).
//!
//! Sections containing any query term become sub-results of their page.

use serde::{Deserialize, Serialize};

/// Words of context kept around the first match in an excerpt.
pub const DEFAULT_EXCERPT_WORDS: usize = 30;

const TITLE_WEIGHT: usize = 3;

/// The index artifact as written by the indexing step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub pages: Vec<IndexedPage>,
}

/// One indexed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPage {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub content: String,
    #[serde(default)]
    pub sections: Vec<IndexedSection>,
}

/// A heading-delimited section of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSection {
    pub anchor: String,
    pub title: String,
    pub content: String,
}

/// A matching page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub excerpt: String,
    /// Relevance in `[0.0, 1.0]`.
    pub score: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_results: Vec<SubResult>,
}

/// A matching section within a [`SearchHit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubResult {
    /// Page url with the section anchor appended.
    pub url: String,
    pub title: String,
    pub excerpt: String,
}

/// Lowercase alphanumeric terms of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn count_hits(tokens: &[String], term: &str) -> usize {
    tokens.iter().filter(|t| t.starts_with(term)).count()
}

/// Search `artifact` for `query`.
///
/// An empty or all-punctuation query yields no results.
pub fn search_artifact(artifact: &IndexArtifact, query: &str) -> Vec<SearchHit> {
    let terms = tokenize(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&IndexedPage, usize)> = Vec::new();
    for page in &artifact.pages {
        let title_tokens = tokenize(&page.title);
        let content_tokens = tokenize(&page.content);

        let mut raw = 0;
        let mut all_present = true;
        for term in &terms {
            let in_title = count_hits(&title_tokens, term);
            let in_content = count_hits(&content_tokens, term);
            if in_title + in_content == 0 {
                all_present = false;
                break;
            }
            raw += TITLE_WEIGHT * in_title + in_content;
        }
        if all_present {
            scored.push((page, raw));
        }
    }

    let raw_scores: Vec<f64> = scored.iter().map(|(_, s)| *s as f64).collect();
    let normalized = normalize_scores(&raw_scores);

    let mut hits: Vec<SearchHit> = scored
        .iter()
        .zip(normalized)
        .map(|((page, _), score)| SearchHit {
            url: page.url.clone(),
            title: page.title.clone(),
            category: page.category.clone(),
            image: page.image.clone(),
            excerpt: excerpt(&page.content, &terms, DEFAULT_EXCERPT_WORDS),
            score,
            sub_results: sub_results(page, &terms),
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.url.cmp(&b.url))
    });
    hits
}

fn sub_results(page: &IndexedPage, terms: &[String]) -> Vec<SubResult> {
    page.sections
        .iter()
        .filter(|section| {
            let tokens = tokenize(&format!("{} {}", section.title, section.content));
            terms.iter().any(|t| count_hits(&tokens, t) > 0)
        })
        .map(|section| SubResult {
            url: format!("{}#{}", page.url, section.anchor),
            title: section.title.clone(),
            excerpt: excerpt(&section.content, terms, DEFAULT_EXCERPT_WORDS),
        })
        .collect()
}

/// Up to `max_words` words of `text` starting shortly before the first
/// word matching any of `terms`.
pub fn excerpt(text: &str, terms: &[String], max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || max_words == 0 {
        return String::new();
    }

    let first_match = words
        .iter()
        .position(|w| {
            let lower = w.to_lowercase();
            terms.iter().any(|t| {
                lower
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|piece| piece.starts_with(t.as_str()))
            })
        })
        .unwrap_or(0);

    let lead = max_words / 4;
    let start = first_match
        .saturating_sub(lead)
        .min(words.len().saturating_sub(max_words));
    let end = (start + max_words).min(words.len());
    words[start..end].join(" ")
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }

    let s_min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    raw.iter()
        .map(|s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}
