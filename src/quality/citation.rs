//! Citation integrity: every cited work must name known evidence.

use super::{AuditContext, AuditReport, Auditor, Finding, Severity};
use crate::error::ApiError;
use crate::evidence::surname_of;
use crate::writing::{CitationScanner, CitedWork, DocumentState};
use std::collections::HashSet;

const NAME: &str = "citation";

#[derive(Debug, Clone)]
pub struct CitationAuditor {
    scanner: CitationScanner,
}

impl CitationAuditor {
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self {
            scanner: CitationScanner::new()?,
        })
    }

    pub fn scanner(&self) -> &CitationScanner {
        &self.scanner
    }
}

/// Lowercased (surname, year) for every author of every known item.
fn known_keys(context: &AuditContext) -> HashSet<(String, String)> {
    context
        .evidence
        .iter()
        .flat_map(|item| {
            item.authors
                .iter()
                .filter_map(|author| surname_of(author))
                .map(move |surname| (surname.to_lowercase(), item.year.to_string()))
        })
        .collect()
}

impl Auditor for CitationAuditor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn audit(&self, document: &DocumentState, context: &AuditContext) -> Result<AuditReport, ApiError> {
        let known = known_keys(context);
        let is_known = |work: &CitedWork| known.contains(&(work.surname.to_lowercase(), work.year.clone()));
        let mut report = AuditReport::default();
        let mut total = 0usize;

        for (id, section) in &document.sections {
            if section.is_placeholder() {
                continue;
            }
            let mut removed: Vec<String> = Vec::new();
            let rewritten = self.scanner.rewrite(&section.content, |token| {
                total += token.works.len();
                let (kept, dropped): (Vec<&CitedWork>, Vec<&CitedWork>) =
                    token.works.iter().partition(|work| is_known(*work));
                if dropped.is_empty() {
                    return Some(token.text.to_string());
                }
                removed.extend(dropped.iter().map(|work| work.text.clone()));
                if kept.is_empty() {
                    None
                } else {
                    let kept: Vec<&str> = kept.iter().map(|work| work.text.as_str()).collect();
                    Some(format!("({})", kept.join("; ")))
                }
            });
            if removed.is_empty() {
                continue;
            }
            for citation in &removed {
                report.findings.push(
                    Finding::new(NAME, Severity::Warning, format!("removed unknown citation \"{}\"", citation))
                        .in_section(id),
                );
            }
            report.removed_citations += removed.len();
            report.rewrites.insert(id.clone(), rewritten);
        }

        report.metrics.insert("citations".to_string(), total as f64);
        report
            .metrics
            .insert("removed".to_string(), report.removed_citations as f64);
        Ok(report)
    }
}
