//! Quality Pipeline
//!
//! Four independent auditors run concurrently over a chapter's document
//! state. Only the citation auditor proposes content changes, and those are
//! applied after every auditor has joined. The chapter is then assembled in
//! numeric section order.

use crate::config::QualityConfig;
use crate::error::ApiError;
use crate::evidence::EvidenceItem;
use crate::telemetry::{ProgressBus, QualitySummaryData};
use crate::writing::{DocumentState, SectionId};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

mod assembly;
mod citation;
mod coherence;
mod structural;
mod stylistic;

pub use assembly::{assemble, AssembledChapter};
pub use citation::CitationAuditor;
pub use coherence::CoherenceAuditor;
pub use structural::StructuralAuditor;
pub use stylistic::StylisticAuditor;

const BASE_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    fn penalty(self) -> f64 {
        match self {
            Severity::Info => 0.0,
            Severity::Warning => 5.0,
            Severity::Critical => 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub auditor: &'static str,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub message: String,
}

impl Finding {
    pub fn new(auditor: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            auditor,
            severity,
            section: None,
            message: message.into(),
        }
    }

    pub fn in_section(mut self, section: &SectionId) -> Self {
        self.section = Some(section.to_string());
        self
    }
}

/// What one auditor found
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub findings: Vec<Finding>,
    pub metrics: BTreeMap<String, f64>,
    /// Replacement content per section, applied after all auditors join
    pub rewrites: BTreeMap<SectionId, String>,
    pub removed_citations: usize,
}

/// Inputs every auditor reads
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub chapter: u32,
    pub title: String,
    /// Outline keys the chapter must contain
    pub expected: Vec<SectionId>,
    pub objectives: Vec<String>,
    /// Evidence known to exist for this chapter
    pub evidence: Vec<EvidenceItem>,
    pub config: QualityConfig,
}

pub trait Auditor: Send + Sync {
    fn name(&self) -> &'static str;

    fn audit(&self, document: &DocumentState, context: &AuditContext) -> Result<AuditReport, ApiError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualitySummary {
    pub score: f64,
    pub critical_issues: usize,
    pub warnings: usize,
    pub removed_citations: usize,
    pub findings: Vec<Finding>,
    pub metrics: BTreeMap<String, f64>,
    pub auditors_failed: Vec<String>,
}

impl QualitySummary {
    fn from_findings(findings: Vec<Finding>) -> Self {
        let penalty: f64 = findings.iter().map(|f| f.severity.penalty()).sum();
        Self {
            score: (BASE_SCORE - penalty).max(0.0),
            critical_issues: findings
                .iter()
                .filter(|f| f.severity == Severity::Critical)
                .count(),
            warnings: findings
                .iter()
                .filter(|f| f.severity == Severity::Warning)
                .count(),
            findings,
            ..Self::default()
        }
    }

    /// Gate: score at or above `min_score` and no critical issues.
    pub fn passes(&self, min_score: f64) -> bool {
        self.score >= min_score && self.critical_issues == 0
    }

    /// Warning and critical findings, one line each
    pub fn issues(&self) -> Vec<String> {
        self.findings
            .iter()
            .filter(|f| f.severity != Severity::Info)
            .map(|f| match &f.section {
                Some(section) => format!("[{}] {} ({}): {}", f.auditor, section, severity_label(f.severity), f.message),
                None => format!("[{}] ({}): {}", f.auditor, severity_label(f.severity), f.message),
            })
            .collect()
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}

/// Output of the pipeline for one chapter
#[derive(Debug, Clone)]
pub struct QualityOutcome {
    /// Document with citation rewrites applied
    pub document: DocumentState,
    pub assembled: AssembledChapter,
    pub summary: QualitySummary,
}

pub struct QualityPipeline {
    auditors: Vec<Arc<dyn Auditor>>,
    citation: CitationAuditor,
    progress: Option<ProgressBus>,
}

impl QualityPipeline {
    /// Structural, stylistic, citation-integrity and coherence auditors.
    pub fn new() -> Result<Self, ApiError> {
        let citation = CitationAuditor::new()?;
        let auditors: Vec<Arc<dyn Auditor>> = vec![
            Arc::new(StructuralAuditor),
            Arc::new(StylisticAuditor),
            Arc::new(citation.clone()),
            Arc::new(CoherenceAuditor),
        ];
        Ok(Self {
            auditors,
            citation,
            progress: None,
        })
    }

    /// Replace the auditor set. Assembly still uses the standard citation matcher.
    pub fn with_auditors(mut self, auditors: Vec<Arc<dyn Auditor>>) -> Self {
        self.auditors = auditors;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressBus>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, document: DocumentState, context: AuditContext) -> QualityOutcome {
        let document = Arc::new(document);
        let context = Arc::new(context);

        let handles: Vec<_> = self
            .auditors
            .iter()
            .map(|auditor| {
                let auditor = Arc::clone(auditor);
                let document = Arc::clone(&document);
                let context = Arc::clone(&context);
                let name = auditor.name();
                (name, tokio::spawn(async move { auditor.audit(&document, &context) }))
            })
            .collect();

        let mut findings = Vec::new();
        let mut metrics = BTreeMap::new();
        let mut rewrites = BTreeMap::new();
        let mut removed_citations = 0;
        let mut auditors_failed = Vec::new();

        // Barrier: every auditor joins before any rewrite is applied.
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    findings.extend(report.findings);
                    metrics.extend(
                        report
                            .metrics
                            .into_iter()
                            .map(|(key, value)| (format!("{}.{}", name, key), value)),
                    );
                    rewrites.extend(report.rewrites);
                    removed_citations += report.removed_citations;
                }
                Ok(Err(err)) => {
                    warn!(chapter = context.chapter, auditor = name, error = %err, "auditor failed, findings omitted");
                    auditors_failed.push(name.to_string());
                }
                Err(err) => {
                    warn!(chapter = context.chapter, auditor = name, error = %err, "auditor panicked, findings omitted");
                    auditors_failed.push(name.to_string());
                }
            }
        }

        let mut document = Arc::try_unwrap(document).unwrap_or_else(|shared| (*shared).clone());
        for (id, content) in rewrites {
            if let Some(section) = document.sections.get_mut(&id) {
                section.word_count = content.split_whitespace().count();
                section.content = content;
            }
        }

        let assembled = assemble(
            context.chapter,
            &context.title,
            &document,
            &context.evidence,
            self.citation.scanner(),
        );

        let mut summary = QualitySummary::from_findings(findings);
        summary.metrics = metrics;
        summary.removed_citations = removed_citations;
        summary.auditors_failed = auditors_failed;

        info!(
            chapter = context.chapter,
            score = summary.score,
            critical = summary.critical_issues,
            warnings = summary.warnings,
            removed_citations,
            references = assembled.references.len(),
            "quality checks completed"
        );
        if let Some(progress) = &self.progress {
            progress.emit_best_effort(
                "quality_completed",
                json!(QualitySummaryData {
                    chapter: context.chapter,
                    score: summary.score,
                    critical_issues: summary.critical_issues,
                    warnings: summary.warnings,
                    removed_citations: summary.removed_citations,
                    auditors_failed: summary.auditors_failed.clone(),
                }),
            );
        }

        QualityOutcome {
            document,
            assembled,
            summary,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::writing::SectionResult;

    /// Prose of `sentences` distinct sentences with a transition word each.
    pub fn prose(tag: &str, sentences: usize) -> String {
        (0..sentences)
            .map(|i| {
                format!(
                    "However, finding {} of part {} shows measurable urban cooling benefits here.",
                    i, tag
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn document(chapter: u32, sections: &[(&str, String)]) -> DocumentState {
        let mut document = DocumentState::new(chapter);
        for (id, content) in sections {
            document.insert(SectionResult::completed(
                id.parse().unwrap(),
                format!("Title {}", id),
                content.clone(),
                Vec::new(),
                1,
            ));
        }
        document
    }

    pub fn context(chapter: u32, expected: &[&str], evidence: Vec<EvidenceItem>) -> AuditContext {
        AuditContext {
            chapter,
            title: format!("Chapter {}", chapter),
            expected: expected.iter().map(|id| id.parse().unwrap()).collect(),
            objectives: Vec::new(),
            evidence,
            config: QualityConfig {
                min_section_words: 10,
                ..QualityConfig::default()
            },
        }
    }
}
