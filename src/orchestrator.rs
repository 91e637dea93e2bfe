//! Orchestrator: chapter dependency graph, per-chapter pipeline and the
//! quality gate.

use serde::Serialize;
use std::path::PathBuf;

mod chapter;
mod graph;
mod run;

pub use graph::{compute_tiers, ChapterGraph, ChapterNode};
pub use run::Orchestrator;

/// Chapter lifecycle. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    Scheduled,
    Researching,
    Writing,
    QualityChecking,
    Accepted,
    Rejected,
}

impl ChapterState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChapterState::Scheduled => "scheduled",
            ChapterState::Researching => "researching",
            ChapterState::Writing => "writing",
            ChapterState::QualityChecking => "quality_checking",
            ChapterState::Accepted => "accepted",
            ChapterState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChapterState::Accepted | ChapterState::Rejected)
    }
}

impl std::fmt::Display for ChapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-chapter result of a run
#[derive(Debug, Clone, Serialize)]
pub struct ChapterReport {
    pub number: u32,
    pub title: String,
    pub state: ChapterState,
    /// Gate verdict before any lenient-mode demotion
    pub quality_passed: bool,
    pub score: f64,
    pub critical_issues: usize,
    pub warnings: usize,
    pub issues: Vec<String>,
    pub placeholders: Vec<String>,
    pub removed_citations: usize,
    pub evidence_accepted: usize,
    pub background_added: usize,
    pub references: usize,
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub session: Option<String>,
    pub tiers: Vec<Vec<u32>>,
    /// Chapter reports in chapter-number order
    pub chapters: Vec<ChapterReport>,
}

impl RunReport {
    pub fn chapter(&self, number: u32) -> Option<&ChapterReport> {
        self.chapters.iter().find(|c| c.number == number)
    }

    pub fn accepted(&self) -> usize {
        self.chapters
            .iter()
            .filter(|c| c.state == ChapterState::Accepted)
            .count()
    }

    /// Chapters that did not pass the gate, including lenient demotions
    pub fn below_gate(&self) -> Vec<u32> {
        self.chapters
            .iter()
            .filter(|c| !c.quality_passed)
            .map(|c| c.number)
            .collect()
    }
}
