//! Section results and the per-chapter document state they are collected into.

use crate::error::ApiError;
use crate::evidence::EvidenceItem;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Dotted numeric section key such as `2.3.1`. Orders by its integer
/// components, so `2.2 < 2.10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionId(Vec<u32>);

impl SectionId {
    pub fn parts(&self) -> &[u32] {
        &self.0
    }

    /// Leading component, conventionally the chapter number
    pub fn chapter(&self) -> u32 {
        self.0.first().copied().unwrap_or_default()
    }
}

impl FromStr for SectionId {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidSectionId(s.to_string()));
        }
        trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(SectionId)
            .map_err(|_| ApiError::InvalidSectionId(s.to_string()))
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for SectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    Completed,
    Failed,
}

impl SectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionStatus::Pending => "pending",
            SectionStatus::Completed => "completed",
            SectionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    pub section_id: SectionId,
    pub title: String,
    pub content: String,
    pub evidence_used: Vec<EvidenceItem>,
    pub word_count: usize,
    pub status: SectionStatus,
    /// Generation attempts spent on this section, repair included
    pub attempts: u32,
    /// Why the section holds a placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SectionResult {
    pub fn completed(
        section_id: SectionId,
        title: impl Into<String>,
        content: String,
        evidence_used: Vec<EvidenceItem>,
        attempts: u32,
    ) -> Self {
        let word_count = content.split_whitespace().count();
        Self {
            section_id,
            title: title.into(),
            content,
            evidence_used,
            word_count,
            status: SectionStatus::Completed,
            attempts,
            note: None,
        }
    }

    /// Marked placeholder for a section whose retries were exhausted.
    pub fn failed(
        section_id: SectionId,
        title: impl Into<String>,
        evidence_used: Vec<EvidenceItem>,
        attempts: u32,
        error: &ApiError,
    ) -> Self {
        let note = format!("generation failed after {} attempt(s): {}", attempts, error);
        Self {
            content: placeholder_text(&section_id, &note),
            section_id,
            title: title.into(),
            evidence_used,
            word_count: 0,
            status: SectionStatus::Failed,
            attempts,
            note: Some(note),
        }
    }

    /// Placeholder inserted by the repair pass when the section never arrived.
    pub fn pending(section_id: SectionId, title: impl Into<String>, note: impl Into<String>) -> Self {
        let note = note.into();
        Self {
            content: placeholder_text(&section_id, &note),
            section_id,
            title: title.into(),
            evidence_used: Vec::new(),
            word_count: 0,
            status: SectionStatus::Pending,
            attempts: 0,
            note: Some(note),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.status != SectionStatus::Completed
    }
}

fn placeholder_text(section_id: &SectionId, note: &str) -> String {
    format!(
        "> **[Placeholder: section {} unavailable]** {}",
        section_id, note
    )
}

/// Every section result for one chapter, keyed and ordered by section id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentState {
    pub chapter: u32,
    pub sections: BTreeMap<SectionId, SectionResult>,
    pub total_citations_used: usize,
}

impl DocumentState {
    pub fn new(chapter: u32) -> Self {
        Self {
            chapter,
            ..Self::default()
        }
    }

    /// Store a result under its own key. Each key has exactly one writer.
    pub fn insert(&mut self, result: SectionResult) {
        self.total_citations_used += result.evidence_used.len();
        if let Some(previous) = self.sections.insert(result.section_id.clone(), result) {
            self.total_citations_used -= previous.evidence_used.len();
        }
    }

    pub fn contains(&self, id: &SectionId) -> bool {
        self.sections.contains_key(id)
    }

    /// Expected keys with no result yet
    pub fn missing<'a>(&self, expected: impl IntoIterator<Item = &'a SectionId>) -> Vec<SectionId> {
        expected
            .into_iter()
            .filter(|id| !self.sections.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &SectionResult> {
        self.sections.values().filter(|s| s.is_placeholder())
    }

    /// All evidence handed to this chapter's sections
    pub fn evidence_used(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.sections.values().flat_map(|s| s.evidence_used.iter())
    }
}
