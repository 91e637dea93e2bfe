//! Evidence items and the depleting, issue-once evidence pool.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use unicode_normalization::UnicodeNormalization;

/// A single citable source. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// DOI when known, otherwise the normalized title
    pub identifier: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub url: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub venue: Option<String>,
    /// Scope (query theme) that produced this item
    pub origin_scope: String,
}

impl EvidenceItem {
    /// Surname of the first author, used for `(Surname, Year)` references.
    pub fn lead_surname(&self) -> Option<String> {
        self.authors.first().and_then(|author| surname_of(author))
    }

    /// `Surname, Year` key, lowercased.
    pub fn citation_key(&self) -> Option<(String, i32)> {
        self.lead_surname()
            .map(|surname| (surname.to_lowercase(), self.year))
    }

    /// Reference list entry: `Authors (Year). Title. Venue. URL`
    pub fn reference_entry(&self) -> String {
        let authors = match self.authors.len() {
            0 => "Anonymous".to_string(),
            1 | 2 => self.authors.join(" & "),
            _ => format!("{} et al.", self.authors[0]),
        };
        let mut entry = format!("{} ({}). {}.", authors, self.year, self.title.trim_end_matches('.'));
        if let Some(venue) = self.venue.as_deref().filter(|v| !v.is_empty()) {
            entry.push_str(&format!(" {}.", venue));
        }
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            entry.push_str(&format!(" {}", url));
        }
        entry
    }
}

/// Last name from "Given Family" or "Family, Given" forms.
pub fn surname_of(author: &str) -> Option<String> {
    let author = author.trim();
    if author.is_empty() {
        return None;
    }
    let surname = match author.split_once(',') {
        Some((family, _)) => family.trim(),
        None => author.split_whitespace().last().unwrap_or(author),
    };
    if surname.is_empty() {
        None
    } else {
        Some(surname.to_string())
    }
}

/// Identifier for a search hit: lowercased DOI if present, else the normalized title.
pub fn evidence_identifier(doi: Option<&str>, title: &str) -> String {
    match doi.map(str::trim).filter(|d| !d.is_empty()) {
        Some(doi) => doi
            .trim_start_matches("https://doi.org/")
            .trim_start_matches("http://doi.org/")
            .to_lowercase(),
        None => normalize_title(title),
    }
}

/// NFKD-fold, lowercase, keep alphanumerics, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .nfkd()
        .filter(|c| c.is_ascii() || c.is_alphanumeric())
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct PoolInner {
    live: VecDeque<EvidenceItem>,
    /// Every identifier ever accepted, issued or not
    seen: HashSet<String>,
    issued: usize,
}

/// Mutex-guarded FIFO of unconsumed evidence. Items leave the pool exactly
/// once and are never returned.
#[derive(Default)]
pub struct EvidencePool {
    inner: Mutex<PoolInner>,
}

impl EvidencePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append items, first-seen identifier wins. Items issued earlier are not
    /// re-admitted. Returns how many were added.
    pub fn seed(&self, items: impl IntoIterator<Item = EvidenceItem>) -> usize {
        let mut inner = self.inner.lock();
        let mut added = 0;
        for item in items {
            if inner.seen.insert(item.identifier.clone()) {
                inner.live.push_back(item);
                added += 1;
            }
        }
        added
    }

    /// Atomically remove up to `n` items from the front. Fewer (or none) on
    /// exhaustion.
    pub fn take_fresh(&self, n: usize) -> Vec<EvidenceItem> {
        let mut inner = self.inner.lock();
        let count = n.min(inner.live.len());
        let taken: Vec<EvidenceItem> = inner.live.drain(..count).collect();
        inner.issued += taken.len();
        taken
    }

    /// Live pool size. Diagnostics only; races with concurrent takers.
    pub fn remaining(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Items handed out so far.
    pub fn issued(&self) -> usize {
        self.inner.lock().issued
    }
}

#[cfg(test)]
pub(crate) fn test_item(identifier: &str, author: &str, year: i32) -> EvidenceItem {
    EvidenceItem {
        identifier: identifier.to_string(),
        title: format!("Study {}", identifier),
        authors: vec![author.to_string()],
        year,
        url: Some(format!("https://doi.org/{}", identifier)),
        abstract_text: "An abstract long enough to be useful for grounding generated text.".to_string(),
        venue: None,
        origin_scope: "general".to_string(),
    }
}
