use folio::config::{LimiterConfig, WritingConfig};
use folio::evidence::{EvidenceItem, EvidencePool};
use folio::limiter::AdaptiveLimiter;
use folio::writing::{
    ChapterPlan, SectionContext, SectionId, SectionSpec, SectionStatus, SectionWorker, WriteFanout,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::integration::support::{prose, ScriptedBackend};

fn chapter(number: u32, ids: &[&str]) -> ChapterPlan {
    ChapterPlan {
        number,
        title: format!("Chapter {}", number),
        depends_on: Vec::new(),
        queries: Vec::new(),
        sections: ids
            .iter()
            .map(|id| SectionSpec {
                id: id.to_string(),
                title: format!("Section {}", id),
                style: Default::default(),
                evidence_needed: 2,
                writer_group: "default".to_string(),
            })
            .collect(),
        objectives: Vec::new(),
    }
}

fn evidence(n: usize) -> Vec<EvidenceItem> {
    (0..n)
        .map(|i| EvidenceItem {
            identifier: format!("10.5/{}", i),
            title: format!("Study {}", i),
            authors: vec![format!("Author{} Person", i)],
            year: 2020,
            url: None,
            abstract_text: "Abstract".to_string(),
            venue: None,
            origin_scope: "general".to_string(),
        })
        .collect()
}

fn writing_config() -> WritingConfig {
    WritingConfig {
        stagger_ms: 0,
        retry_delay_ms: 0,
        ..WritingConfig::default()
    }
}

fn fanout(backend: Arc<ScriptedBackend>, limiter: Arc<AdaptiveLimiter>, pool: Arc<EvidencePool>, number: u32) -> WriteFanout {
    let context = SectionContext {
        topic: "Urban heat".to_string(),
        chapter: number,
        chapter_title: format!("Chapter {}", number),
        ..SectionContext::default()
    };
    let worker = SectionWorker::new(backend, limiter, pool, writing_config(), context).unwrap();
    WriteFanout::new(Arc::new(worker))
}

#[tokio::test]
async fn every_expected_key_is_present_after_writing() {
    let backend = Arc::new(ScriptedBackend::new(prose()));
    let limiter = Arc::new(AdaptiveLimiter::new("generation", &LimiterConfig::default()));
    let plan = chapter(2, &["2.1", "2.2", "2.3"]);

    let document = fanout(backend, limiter, Arc::new(EvidencePool::new()), 2)
        .run(&plan.prepare().unwrap())
        .await;

    let keys: Vec<String> = document.sections.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["2.1", "2.2", "2.3"]);
    assert!(document
        .sections
        .values()
        .all(|s| s.status == SectionStatus::Completed));
}

#[tokio::test]
async fn one_failing_section_is_isolated() {
    let backend = Arc::new(ScriptedBackend::new(prose()).failing_on(&["3.4"]));
    let limiter = Arc::new(AdaptiveLimiter::new("generation", &LimiterConfig::default()));
    let plan = chapter(3, &["3.1", "3.2", "3.3", "3.4", "3.5", "3.6"]);

    let document = fanout(backend.clone(), limiter, Arc::new(EvidencePool::new()), 3)
        .run(&plan.prepare().unwrap())
        .await;

    let placeholders: Vec<String> = document
        .placeholders()
        .map(|s| s.section_id.to_string())
        .collect();
    assert_eq!(placeholders, vec!["3.4"]);
    assert_eq!(document.sections.len(), 6);
    let failed = &document.sections[&"3.4".parse::<SectionId>().unwrap()];
    assert_eq!(failed.status, SectionStatus::Failed);
    assert_eq!(failed.attempts, 3);
    assert_eq!(
        backend.calls().iter().filter(|c| c.id.ends_with("3.4")).count(),
        3
    );
}

#[tokio::test]
async fn concurrent_sections_never_share_evidence() {
    let backend = Arc::new(ScriptedBackend::new(prose()).with_delay(Duration::from_millis(5)));
    let limiter = Arc::new(AdaptiveLimiter::new("generation", &LimiterConfig::default()));
    let pool = Arc::new(EvidencePool::new());
    pool.seed(evidence(9));
    let ids: Vec<String> = (1..=6).map(|i| format!("4.{}", i)).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

    let document = fanout(backend, limiter, pool.clone(), 4)
        .run(&chapter(4, &ids).prepare().unwrap())
        .await;

    let used: Vec<&str> = document
        .sections
        .values()
        .flat_map(|s| s.evidence_used.iter().map(|e| e.identifier.as_str()))
        .collect();
    let unique: HashSet<&str> = used.iter().copied().collect();
    assert_eq!(used.len(), 9);
    assert_eq!(unique.len(), 9);
    assert_eq!(pool.remaining(), 0);
}

#[tokio::test]
async fn calls_stay_within_the_limiter_ceiling() {
    let backend = Arc::new(ScriptedBackend::new(prose()).with_delay(Duration::from_millis(10)));
    let limiter = Arc::new(AdaptiveLimiter::new(
        "generation",
        &LimiterConfig {
            initial: 2,
            hard_max: 2,
            ..LimiterConfig::default()
        },
    ));
    let ids: Vec<String> = (1..=8).map(|i| format!("5.{}", i)).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

    let document = fanout(backend.clone(), limiter.clone(), Arc::new(EvidencePool::new()), 5)
        .run(&chapter(5, &ids).prepare().unwrap())
        .await;

    assert_eq!(document.sections.len(), 8);
    assert!(backend.peak_concurrency() <= 2);
    assert_eq!(limiter.snapshot().in_flight, 0);
}
