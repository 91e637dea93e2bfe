//! Deterministic chapter assembly.

use crate::evidence::EvidenceItem;
use crate::writing::{find_cited, CitationScanner, DocumentState};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssembledChapter {
    pub text: String,
    /// Sorted, deduplicated entries for evidence cited in `text`
    pub references: Vec<String>,
}

/// Render the chapter: heading, sections in numeric order, then references
/// for every known item actually cited in the body.
pub fn assemble(
    chapter: u32,
    title: &str,
    document: &DocumentState,
    evidence: &[EvidenceItem],
    citations: &CitationScanner,
) -> AssembledChapter {
    let mut body = String::new();
    for (id, section) in &document.sections {
        body.push_str(&format!("## {} {}\n\n", id, section.title));
        body.push_str(section.content.trim());
        body.push_str("\n\n");
    }

    let references: BTreeSet<String> = citations
        .tokens(&body)
        .into_iter()
        .flat_map(|token| token.works)
        .filter_map(|work| find_cited(evidence, &work.surname, &work.year))
        .map(EvidenceItem::reference_entry)
        .collect();
    let references: Vec<String> = references.into_iter().collect();

    let mut text = format!("# Chapter {}: {}\n\n{}", chapter, title, body);
    if !references.is_empty() {
        text.push_str("## References\n\n");
        for entry in &references {
            text.push_str(&format!("- {}\n", entry));
        }
    }

    AssembledChapter {
        text: text.trim_end().to_string() + "\n",
        references,
    }
}
