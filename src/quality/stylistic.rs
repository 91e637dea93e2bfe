use super::structural::sentences;
use super::{AuditContext, AuditReport, Auditor, Finding, Severity};
use crate::error::ApiError;
use crate::writing::DocumentState;

const NAME: &str = "stylistic";

const TRANSITIONS: &[&str] = &[
    "however",
    "therefore",
    "moreover",
    "furthermore",
    "consequently",
    "additionally",
    "in contrast",
    "for example",
    "for instance",
    "thus",
    "meanwhile",
    "similarly",
    "nevertheless",
    "in addition",
    "as a result",
];

/// Sentence length and transition usage across the whole chapter.
pub struct StylisticAuditor;

fn has_transition(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    TRANSITIONS.iter().any(|t| {
        lower.match_indices(t).any(|(at, _)| {
            let before = lower[..at].chars().next_back();
            let after = lower[at + t.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    })
}

impl Auditor for StylisticAuditor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn audit(&self, document: &DocumentState, context: &AuditContext) -> Result<AuditReport, ApiError> {
        let config = &context.config;
        let mut report = AuditReport::default();

        let all: Vec<&str> = document
            .sections
            .values()
            .filter(|s| !s.is_placeholder())
            .flat_map(|s| sentences(&s.content))
            .collect();
        if all.is_empty() {
            return Ok(report);
        }

        let words: usize = all.iter().map(|s| s.split_whitespace().count()).sum();
        let average = words as f64 / all.len() as f64;
        let ratio = all.iter().filter(|s| has_transition(s)).count() as f64 / all.len() as f64;

        if average > config.max_sentence_words {
            report.findings.push(Finding::new(
                NAME,
                Severity::Warning,
                format!(
                    "average sentence length {:.1} words exceeds {:.0}",
                    average, config.max_sentence_words
                ),
            ));
        }
        if ratio < config.min_transition_ratio {
            report.findings.push(Finding::new(
                NAME,
                Severity::Info,
                format!("few transitions between sentences ({:.2})", ratio),
            ));
        }

        report.metrics.insert("sentences".to_string(), all.len() as f64);
        report.metrics.insert("avg_sentence_words".to_string(), average);
        report.metrics.insert("transition_ratio".to_string(), ratio);
        Ok(report)
    }
}
