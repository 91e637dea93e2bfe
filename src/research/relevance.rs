//! Relevance scoring for raw search hits.

use crate::config::ResearchConfig;
use crate::search::RawResult;
use std::collections::HashSet;

const TITLE_WEIGHT: f64 = 0.7;
const ABSTRACT_WEIGHT: f64 = 0.3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "that", "this", "are", "was", "were", "its",
    "their", "about", "between", "over", "under", "how", "what", "why", "which", "using", "via",
    "on", "of", "in", "to", "a", "an", "by", "or", "as", "at", "is", "be",
];

/// Lowercased content tokens of at least three characters, stopwords removed.
pub fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

fn overlap(keywords: &HashSet<String>, text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let tokens = self::keywords(text);
    let hits = keywords.iter().filter(|k| tokens.contains(*k)).count();
    hits as f64 / keywords.len() as f64
}

/// Threshold filter over scored hits. `relaxed` produces the one-time
/// loosened variant used when a chapter's pool is under target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    pub threshold: f64,
    pub abstract_floor: usize,
    pub recency_window_years: i32,
    pub recency_bonus: f64,
    pub current_year: i32,
}

impl RelevanceFilter {
    pub fn from_config(config: &ResearchConfig, current_year: i32) -> Self {
        Self {
            threshold: config.relevance_threshold,
            abstract_floor: config.abstract_floor,
            recency_window_years: config.recency_window_years,
            recency_bonus: config.recency_bonus,
            current_year,
        }
    }

    pub fn relaxed(&self, factor: f64) -> Self {
        Self {
            threshold: self.threshold * factor,
            abstract_floor: (self.abstract_floor as f64 * factor).floor() as usize,
            ..*self
        }
    }

    /// Weighted title/abstract keyword overlap plus a recency bonus.
    pub fn score(&self, keywords: &HashSet<String>, hit: &RawResult) -> f64 {
        let mut score = TITLE_WEIGHT * overlap(keywords, &hit.title)
            + ABSTRACT_WEIGHT * overlap(keywords, &hit.abstract_text);
        if let Some(year) = hit.year {
            let age = self.current_year - year;
            if (0..=self.recency_window_years).contains(&age) {
                score += self.recency_bonus;
            }
        }
        score
    }

    /// Score a hit, or `None` when it is incomplete or below the bar.
    pub fn admit(&self, keywords: &HashSet<String>, hit: &RawResult) -> Option<f64> {
        if hit.title.trim().is_empty() || hit.authors.is_empty() || hit.year.is_none() {
            return None;
        }
        if hit.abstract_text.chars().count() < self.abstract_floor {
            return None;
        }
        let score = self.score(keywords, hit);
        (score >= self.threshold).then_some(score)
    }
}
