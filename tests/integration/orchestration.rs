use folio::error::ApiError;
use folio::orchestrator::{ChapterState, Orchestrator};
use folio::telemetry::{MemorySink, ProgressRuntime};
use folio::writing::DocumentPlan;
use std::sync::Arc;
use std::time::Duration;

use crate::integration::support::{fast_config, hit, prose, MemoryStore, ScriptedBackend, ScriptedSearch};

/// 1 -> {2, 3} -> {4, 5} -> 6, two sections and one query per chapter.
fn diamond_plan() -> DocumentPlan {
    let deps: [(u32, &[u32]); 6] = [
        (1, &[]),
        (2, &[1]),
        (3, &[1]),
        (4, &[2, 3]),
        (5, &[2, 3]),
        (6, &[1, 2, 3, 4, 5]),
    ];
    let mut raw = String::from("topic = \"Urban heat\"\nobjectives = [\"Survey shaded urban corridors\"]\n");
    for (number, depends_on) in deps {
        let depends_on: Vec<String> = depends_on.iter().map(u32::to_string).collect();
        raw.push_str(&format!(
            r#"
[[chapters]]
number = {n}
title = "Chapter {n}"
depends_on = [{deps}]
queries = [{{ scope = "trees", text = "urban heat street trees" }}]
[[chapters.sections]]
id = "{n}.1"
title = "First"
[[chapters.sections]]
id = "{n}.2"
title = "Second"
"#,
            n = number,
            deps = depends_on.join(", ")
        ));
    }
    DocumentPlan::from_toml_str(&raw).unwrap()
}

#[tokio::test]
async fn tiers_never_overlap() {
    let backend = Arc::new(ScriptedBackend::new(prose()).with_delay(Duration::from_millis(15)));
    let search = Arc::new(ScriptedSearch::new(vec![hit("10.9/a", "Ada Smith", 2023)]));
    let store = Arc::new(MemoryStore::default());

    let report = Orchestrator::new(backend.clone(), search.clone(), store.clone(), fast_config())
        .run(&diamond_plan())
        .await
        .unwrap();

    assert_eq!(report.tiers, vec![vec![1], vec![2, 3], vec![4, 5], vec![6]]);
    assert_eq!(report.accepted(), 6);
    assert_eq!(search.queries().len(), 6);

    let windows = backend.chapter_windows();
    assert_eq!(windows.len(), 6);
    let started = |n: u32| windows[&n].0;
    let finished = |n: u32| windows[&n].1;
    for later in [2, 3] {
        assert!(started(later) >= finished(1));
    }
    for later in [4, 5] {
        assert!(started(later) >= finished(2).max(finished(3)));
    }
    assert!((1..=5).all(|n| started(6) >= finished(n)));

    let order: Vec<u32> = store.saved().iter().map(|(n, _)| *n).collect();
    assert_eq!(&order[..1], &[1]);
    assert_eq!(order[5], 6);
}

#[tokio::test]
async fn dependents_receive_predecessor_digests() {
    let backend = Arc::new(ScriptedBackend::new(prose()));
    let store = Arc::new(MemoryStore::default());
    let plan = DocumentPlan::from_toml_str(
        r#"
topic = "Urban heat"

[[chapters]]
number = 1
title = "Intro"
[[chapters.sections]]
id = "1.1"
title = "Scope"

[[chapters]]
number = 2
title = "Follow-up"
depends_on = [1]
[[chapters.sections]]
id = "2.1"
title = "More"
"#,
    )
    .unwrap();

    Orchestrator::new(
        backend.clone(),
        Arc::new(ScriptedSearch::new(Vec::new())),
        store.clone(),
        fast_config(),
    )
    .run(&plan)
    .await
    .unwrap();

    assert_eq!(store.saved().len(), 2);
    assert!(store.chapter(2).unwrap().starts_with("# Chapter 2: Follow-up"));

    let calls = backend.calls();
    let first = calls.iter().find(|c| c.chapter() == 1).unwrap();
    let second = calls.iter().find(|c| c.chapter() == 2).unwrap();
    assert!(!first.prompt.contains("Build on the earlier chapters"));
    assert!(second.prompt.contains("Build on the earlier chapters"));
    assert!(second.prompt.contains("Chapter 1: However, street survey 0"));
}

#[tokio::test]
async fn strict_mode_aborts_with_every_rejected_chapter() {
    let backend = Arc::new(ScriptedBackend::new(prose()).failing_on(&["2.1", "2.2", "3.1", "3.2"]));
    let store = Arc::new(MemoryStore::default());
    let mut config = fast_config();
    config.strict = true;
    config.quality.min_score = 95.0;

    let err = Orchestrator::new(
        backend.clone(),
        Arc::new(ScriptedSearch::new(Vec::new())),
        store.clone(),
        config,
    )
    .run(&diamond_plan())
    .await
    .unwrap_err();

    match err {
        ApiError::QualityGateFailed(chapters) => assert_eq!(chapters, vec![2, 3]),
        other => panic!("unexpected error: {other}"),
    }
    let saved: Vec<u32> = store.saved().iter().map(|(n, _)| *n).collect();
    assert_eq!(saved, vec![1]);
    assert!(backend.calls().iter().all(|c| c.chapter() <= 3));
}

#[tokio::test]
async fn lenient_mode_keeps_going_with_warnings() {
    let backend = Arc::new(ScriptedBackend::new(prose()).failing_on(&["2.1", "2.2"]));
    let store = Arc::new(MemoryStore::default());
    let sink = Arc::new(MemorySink::new());
    let runtime = ProgressRuntime::start(sink.clone(), Duration::from_secs(1));
    let mut config = fast_config();
    config.quality.min_score = 95.0;

    let report = Orchestrator::new(
        backend,
        Arc::new(ScriptedSearch::new(Vec::new())),
        store.clone(),
        config,
    )
    .with_progress(Some(runtime.bus()))
    .run(&diamond_plan())
    .await
    .unwrap();
    runtime.bus().flush().await;

    assert_eq!(report.accepted(), 6);
    assert_eq!(report.below_gate(), vec![2]);
    let second = report.chapter(2).unwrap();
    assert_eq!(second.state, ChapterState::Accepted);
    assert_eq!(second.placeholders, vec!["2.1", "2.2"]);

    let text = store.chapter(2).unwrap();
    assert!(text.contains("> **Quality warnings:**"));
    assert!(text.contains("[Placeholder: section 2.1 unavailable]"));

    assert_eq!(sink.events_of_type("chapter_rejected").len(), 1);
    assert_eq!(sink.events_of_type("chapter_accepted").len(), 6);
    assert_eq!(sink.events_of_type("section_failed").len(), 2);
    assert_eq!(sink.events_of_type("tier_completed").len(), 4);
}
