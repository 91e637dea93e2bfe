//! Section lengths, placeholders and repeated sentences.

use super::{AuditContext, AuditReport, Auditor, Finding, Severity};
use crate::error::ApiError;
use crate::writing::DocumentState;
use std::collections::HashMap;

const NAME: &str = "structural";

/// Sentences shorter than this are not checked for repetition.
const MIN_REPEAT_WORDS: usize = 6;

pub struct StructuralAuditor;

/// Split prose into sentences on terminal punctuation.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

fn normalized(sentence: &str) -> String {
    sentence
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Auditor for StructuralAuditor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn audit(&self, document: &DocumentState, context: &AuditContext) -> Result<AuditReport, ApiError> {
        let config = &context.config;
        let mut report = AuditReport::default();
        let mut total_words = 0usize;

        for (id, section) in &document.sections {
            if section.is_placeholder() {
                report.findings.push(
                    Finding::new(NAME, Severity::Warning, "section is a placeholder").in_section(id),
                );
                continue;
            }

            let words = section.content.split_whitespace().count();
            total_words += words;
            if words < config.min_section_words {
                report.findings.push(
                    Finding::new(
                        NAME,
                        Severity::Warning,
                        format!("section has {} words, below {}", words, config.min_section_words),
                    )
                    .in_section(id),
                );
            } else if words > config.max_section_words {
                report.findings.push(
                    Finding::new(
                        NAME,
                        Severity::Warning,
                        format!("section has {} words, above {}", words, config.max_section_words),
                    )
                    .in_section(id),
                );
            }

            let mut seen: HashMap<String, usize> = HashMap::new();
            for sentence in sentences(&section.content) {
                let key = normalized(sentence);
                if key.split(' ').count() >= MIN_REPEAT_WORDS {
                    *seen.entry(key).or_default() += 1;
                }
            }
            let repeated = seen.values().filter(|count| **count > 1).count();
            if repeated > 0 {
                report.findings.push(
                    Finding::new(
                        NAME,
                        Severity::Warning,
                        format!("{} sentence(s) repeated within the section", repeated),
                    )
                    .in_section(id),
                );
            }
        }

        let written = document.sections.len() - document.placeholders().count();
        report
            .metrics
            .insert("total_words".to_string(), total_words as f64);
        report.metrics.insert(
            "mean_section_words".to_string(),
            if written == 0 { 0.0 } else { total_words as f64 / written as f64 },
        );
        Ok(report)
    }
}
