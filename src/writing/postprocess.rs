//! Cleanup of raw generated text: leaked request metadata and citation links.

use crate::error::ApiError;
use crate::evidence::EvidenceItem;
use crate::writing::citations::{find_cited, CitationScanner};
use regex::Regex;

/// Whole lines that echo request parameters back into the output.
const ECHO_PATTERNS: &[&str] = &[
    r"(?i)^\s*(?:temperature|max_tokens|top_p|model|system(?:_context)?|prompt(?:_payload)?|request_id)\s*[:=].*$",
    r"(?i)^\s*\[(?:request|generation)[^\]]*\]\s*$",
];

pub struct Sanitizer {
    echo_lines: Vec<Regex>,
    citations: CitationScanner,
}

impl Sanitizer {
    pub fn new() -> Result<Self, ApiError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ApiError::ConfigError(format!("Invalid sanitizer pattern {}: {}", pattern, e))
            })
        };
        Ok(Self {
            echo_lines: ECHO_PATTERNS
                .iter()
                .map(|p| compile(*p))
                .collect::<Result<_, _>>()?,
            citations: CitationScanner::new()?,
        })
    }

    /// Drop echoed-parameter lines and collapse the blank runs they leave.
    pub fn strip_metadata(&self, raw: &str) -> String {
        let mut out: Vec<&str> = Vec::new();
        for line in raw.lines() {
            if self.echo_lines.iter().any(|re| re.is_match(line)) {
                continue;
            }
            if line.trim().is_empty() && out.last().map_or(true, |prev| prev.trim().is_empty()) {
                continue;
            }
            out.push(line);
        }
        while out.last().is_some_and(|l| l.trim().is_empty()) {
            out.pop();
        }
        out.join("\n")
    }

    /// Wrap a single-work citation in a Markdown link when it names an item
    /// in `evidence` that has a URL. Already linked tokens and multi-work
    /// groups are kept as written.
    pub fn link_citations(&self, text: &str, evidence: &[EvidenceItem]) -> String {
        self.citations.rewrite(text, |token| {
            let url = match token.works.as_slice() {
                [work] if !token.linked => find_cited(evidence, &work.surname, &work.year)
                    .and_then(|item| item.url.as_deref()),
                _ => None,
            };
            Some(match url {
                Some(url) => format!("[{}]({})", token.text, url),
                None => token.text.to_string(),
            })
        })
    }

    pub fn process(&self, raw: &str, evidence: &[EvidenceItem]) -> String {
        self.link_citations(&self.strip_metadata(raw), evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::test_item;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new().unwrap()
    }

    #[test]
    fn strips_parameter_echo_lines() {
        let raw = "temperature: 0.7\nmax_tokens=2048\n\nUrban heat rises.\n[request ch02-2.1]\n\n\nIt matters.\nModel: gpt\n";
        assert_eq!(
            sanitizer().strip_metadata(raw),
            "Urban heat rises.\n\nIt matters."
        );
    }

    #[test]
    fn keeps_prose_mentioning_parameters() {
        let sanitizer = sanitizer();
        assert_eq!(
            sanitizer.strip_metadata("The model: a simple one, explained below."),
            "The model: a simple one, explained below."
        );
        assert_eq!(
            sanitizer.strip_metadata("Our temperature data shows growth."),
            "Our temperature data shows growth."
        );
    }

    #[test]
    fn links_known_citations_only() {
        let evidence = vec![test_item("10.1/s", "Ada Smith", 2022)];
        let text = "Heat grows (Smith, 2022) while (Nguyen, 2019) disagrees.";
        let linked = sanitizer().link_citations(text, &evidence);
        assert_eq!(
            linked,
            "Heat grows [(Smith, 2022)](https://doi.org/10.1/s) while (Nguyen, 2019) disagrees."
        );
        // Idempotent
        assert_eq!(sanitizer().link_citations(&linked, &evidence), linked);
    }

    #[test]
    fn matches_et_al_and_family_first_names() {
        let evidence = vec![test_item("10.1/n", "Nguyen, Van", 2019)];
        let linked = sanitizer().link_citations("See (Nguyen et al., 2019).", &evidence);
        assert!(linked.starts_with("See [(Nguyen et al., 2019)](https://doi.org/10.1/n)"));
    }

    #[test]
    fn links_narrative_and_two_author_forms() {
        let evidence = vec![test_item("10.1/n", "Van Nguyen", 2019)];
        let linked = sanitizer().link_citations(
            "Nguyen (2019) found shade helps (Nguyen & Tran, 2019).",
            &evidence,
        );
        assert_eq!(
            linked,
            "[Nguyen (2019)](https://doi.org/10.1/n) found shade helps \
             [(Nguyen & Tran, 2019)](https://doi.org/10.1/n)."
        );
    }

    #[test]
    fn multi_work_groups_stay_unlinked() {
        let evidence = vec![test_item("10.1/s", "Ada Smith", 2022)];
        let text = "Heat (Smith, 2022; Nguyen, 2019) grows.";
        assert_eq!(sanitizer().link_citations(text, &evidence), text);
    }

    #[test]
    fn process_strips_then_links() {
        let evidence = vec![test_item("10.1/s", "Ada Smith", 2022)];
        let out = sanitizer().process("prompt: write\nText (Smith, 2022).", &evidence);
        assert_eq!(out, "Text [(Smith, 2022)](https://doi.org/10.1/s).");
    }
}
