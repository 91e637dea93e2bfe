//! Outline completeness and objective coverage.

use super::{AuditContext, AuditReport, Auditor, Finding, Severity};
use crate::error::ApiError;
use crate::research::keywords;
use crate::writing::DocumentState;
use std::collections::{BTreeSet, HashSet};

const NAME: &str = "coherence";

pub struct CoherenceAuditor;

/// An objective counts as covered when at least half its keywords appear.
fn covered(objective: &str, text: &HashSet<String>) -> bool {
    let wanted = keywords(objective);
    if wanted.is_empty() {
        return true;
    }
    let hits = wanted.iter().filter(|k| text.contains(*k)).count();
    hits * 2 >= wanted.len()
}

impl Auditor for CoherenceAuditor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn audit(&self, document: &DocumentState, context: &AuditContext) -> Result<AuditReport, ApiError> {
        let mut report = AuditReport::default();

        let expected: BTreeSet<_> = context.expected.iter().collect();
        let actual: BTreeSet<_> = document.sections.keys().collect();
        for id in expected.difference(&actual) {
            report.findings.push(
                Finding::new(NAME, Severity::Critical, "outline section missing from chapter").in_section(id),
            );
        }
        for id in actual.difference(&expected) {
            report.findings.push(
                Finding::new(NAME, Severity::Critical, "section is not part of the outline").in_section(id),
            );
        }

        if !context.objectives.is_empty() {
            let text: HashSet<String> = document
                .sections
                .values()
                .filter(|s| !s.is_placeholder())
                .flat_map(|s| keywords(&s.content))
                .collect();
            let uncovered: Vec<&String> = context
                .objectives
                .iter()
                .filter(|objective| !covered(objective, &text))
                .collect();
            let coverage = 1.0 - uncovered.len() as f64 / context.objectives.len() as f64;
            report.metrics.insert("objective_coverage".to_string(), coverage);

            if coverage < context.config.min_objective_coverage {
                report.findings.push(Finding::new(
                    NAME,
                    Severity::Warning,
                    format!(
                        "objective coverage {:.2} below {:.2}; uncovered: {}",
                        coverage,
                        context.config.min_objective_coverage,
                        uncovered
                            .iter()
                            .map(|o| o.as_str())
                            .collect::<Vec<_>>()
                            .join("; ")
                    ),
                ));
            }
        }

        Ok(report)
    }
}
