use folio::config::QualityConfig;
use folio::evidence::EvidenceItem;
use folio::quality::{assemble, AuditContext, QualityPipeline};
use folio::writing::{CitationScanner, DocumentState, SectionResult};

use crate::integration::support::prose;

fn item(identifier: &str, author: &str, year: i32) -> EvidenceItem {
    EvidenceItem {
        identifier: identifier.to_string(),
        title: format!("Paper {}", identifier),
        authors: vec![author.to_string()],
        year,
        url: Some(format!("https://doi.org/{}", identifier)),
        abstract_text: "Abstract".to_string(),
        venue: None,
        origin_scope: "general".to_string(),
    }
}

fn section(id: &str, content: String) -> SectionResult {
    SectionResult::completed(id.parse().unwrap(), format!("Part {}", id), content, Vec::new(), 1)
}

#[tokio::test]
async fn unknown_citations_are_dropped_from_text_and_references() {
    let mut document = DocumentState::new(2);
    document.insert(section(
        "2.1",
        format!("{} Canopies matter (Smith, 2022) as do roofs (Nguyen, 2019).", prose()),
    ));
    let context = AuditContext {
        chapter: 2,
        title: "Evidence".to_string(),
        expected: vec!["2.1".parse().unwrap()],
        objectives: Vec::new(),
        evidence: vec![item("10.1/smith", "Ada Smith", 2022), item("10.1/jones", "Bo Jones", 2021)],
        config: QualityConfig::default(),
    };

    let outcome = QualityPipeline::new().unwrap().run(document, context).await;

    let text = &outcome.assembled.text;
    assert!(text.contains("(Smith, 2022)"));
    assert!(!text.contains("Nguyen"));
    assert_eq!(outcome.assembled.references.len(), 1);
    assert!(outcome.assembled.references[0].contains("Ada Smith (2022)"));
    assert!(!text.contains("Bo Jones"));
    assert_eq!(outcome.summary.removed_citations, 1);
}

#[tokio::test]
async fn every_citation_form_is_checked_against_evidence() {
    let mut document = DocumentState::new(2);
    document.insert(section(
        "2.1",
        format!(
            "{} Canopies matter (Smith, 2022; Nguyen, 2019). Also (Nguyen & Tran, 2019) \
             and (Nguyen and Tran, 2019). Nguyen (2019) argues more.",
            prose()
        ),
    ));
    let context = AuditContext {
        chapter: 2,
        title: "Evidence".to_string(),
        expected: vec!["2.1".parse().unwrap()],
        objectives: Vec::new(),
        evidence: vec![item("10.1/smith", "Ada Smith", 2022), item("10.1/jones", "Bo Jones", 2021)],
        config: QualityConfig::default(),
    };

    let outcome = QualityPipeline::new().unwrap().run(document, context).await;

    assert_eq!(outcome.summary.removed_citations, 4);
    let text = &outcome.assembled.text;
    assert!(text.contains("Canopies matter (Smith, 2022)."));
    assert!(!text.contains("Nguyen"));
    assert!(!text.contains("Tran"));
    assert_eq!(outcome.assembled.references.len(), 1);
    assert!(outcome.assembled.references[0].contains("Ada Smith (2022)"));
}

#[test]
fn sections_assemble_in_numeric_order() {
    let mut document = DocumentState::new(2);
    for id in ["2.10", "2.2", "2.1"] {
        document.insert(section(id, format!("Body of {}.", id)));
    }
    let citations = CitationScanner::new().unwrap();

    let chapter = assemble(2, "Order", &document, &[], &citations);

    let headings: Vec<&str> = chapter
        .text
        .lines()
        .filter(|line| line.starts_with("## "))
        .collect();
    assert_eq!(headings, vec!["## 2.1 Part 2.1", "## 2.2 Part 2.2", "## 2.10 Part 2.10"]);
}

#[tokio::test]
async fn missing_outline_sections_fail_the_gate() {
    let mut document = DocumentState::new(7);
    document.insert(section("7.1", prose()));
    let context = AuditContext {
        chapter: 7,
        title: "Gaps".to_string(),
        expected: vec!["7.1".parse().unwrap(), "7.2".parse().unwrap()],
        objectives: Vec::new(),
        evidence: Vec::new(),
        config: QualityConfig::default(),
    };

    let outcome = QualityPipeline::new().unwrap().run(document, context).await;

    assert_eq!(outcome.summary.critical_issues, 1);
    assert!(!outcome.summary.passes(60.0));
}
