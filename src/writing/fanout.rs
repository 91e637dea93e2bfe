//! Concurrent section writing for one chapter, followed by a repair pass
//! that guarantees every expected section key is present.

use crate::telemetry::{ProgressBus, SectionProgressData};
use crate::writing::document::{DocumentState, SectionId, SectionResult, SectionStatus};
use crate::writing::plan::PreparedSection;
use crate::writing::progress::{ProgressSnapshot, ProgressTracker};
use crate::writing::worker::{SectionOutcome, SectionWorker};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct WriteFanout {
    worker: Arc<SectionWorker>,
    progress: Option<ProgressBus>,
    cancel: CancellationToken,
}

impl WriteFanout {
    pub fn new(worker: Arc<SectionWorker>) -> Self {
        Self {
            worker,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressBus>) -> Self {
        self.progress = progress;
        self
    }

    /// Cancelling aborts in-flight section tasks; their sections go to the
    /// repair pass.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, sections: &[PreparedSection]) -> DocumentState {
        let chapter = self.worker.chapter();
        let mut document = DocumentState::new(chapter);
        let tracker = ProgressTracker::new(sections.len());

        let mut tasks = JoinSet::new();
        for section in sections {
            let worker = Arc::clone(&self.worker);
            let section = section.clone();
            tasks.spawn(async move { worker.write(&section).await });
        }

        let mut aborted = false;
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(outcome)) => {
                        let snapshot = tracker.record(outcome.elapsed);
                        self.report(chapter, &outcome, snapshot);
                        document.insert(outcome.result);
                    }
                    Some(Err(err)) => {
                        warn!(chapter, error = %err, "section task ended without a result");
                    }
                },
                _ = self.cancel.cancelled(), if !aborted => {
                    warn!(chapter, remaining = tasks.len(), "section writing cancelled");
                    tasks.abort_all();
                    aborted = true;
                }
            }
        }

        self.repair(sections, &mut document, &tracker).await;

        info!(
            chapter,
            sections = document.sections.len(),
            placeholders = document.placeholders().count(),
            citations = document.total_citations_used,
            "chapter sections written"
        );
        document
    }

    /// One sequential extra attempt per missing key, else a pending placeholder.
    async fn repair(
        &self,
        sections: &[PreparedSection],
        document: &mut DocumentState,
        tracker: &ProgressTracker,
    ) {
        let missing = document.missing(sections.iter().map(|s| &s.id));
        if missing.is_empty() {
            return;
        }
        debug!(chapter = document.chapter, missing = missing.len(), "repairing missing sections");

        for id in missing {
            let Some(section) = sections.iter().find(|s| s.id == id).cloned() else {
                continue;
            };
            let worker = Arc::clone(&self.worker);
            let title = section.spec.title.clone();
            // A panicking attempt must not take the chapter down with it.
            let outcome = match tokio::spawn(async move { worker.repair(&section).await }).await {
                Ok(outcome) => outcome,
                Err(err) => SectionOutcome {
                    result: SectionResult::pending(
                        id.clone(),
                        title,
                        format!("section was not produced and the repair task aborted: {}", err),
                    ),
                    elapsed: Default::default(),
                },
            };
            let snapshot = tracker.record(outcome.elapsed);
            self.emit_section("section_repaired", document.chapter, &id, &outcome, snapshot);
            document.insert(outcome.result);
        }
    }

    fn report(&self, chapter: u32, outcome: &SectionOutcome, snapshot: ProgressSnapshot) {
        let event_type = match outcome.result.status {
            SectionStatus::Completed => "section_completed",
            SectionStatus::Failed | SectionStatus::Pending => "section_failed",
        };
        self.emit_section(event_type, chapter, &outcome.result.section_id, outcome, snapshot);
    }

    fn emit_section(
        &self,
        event_type: &str,
        chapter: u32,
        id: &SectionId,
        outcome: &SectionOutcome,
        snapshot: ProgressSnapshot,
    ) {
        let Some(progress) = &self.progress else {
            return;
        };
        progress.emit_best_effort(
            event_type,
            json!(SectionProgressData {
                chapter,
                section_id: id.to_string(),
                status: outcome.result.status.as_str().to_string(),
                word_count: outcome.result.word_count,
                completed: snapshot.completed,
                total: snapshot.total,
                percent: snapshot.percent,
                eta_secs: snapshot.eta_secs,
                attempts: Some(outcome.result.attempts),
                error: outcome.result.note.clone(),
            }),
        );
    }
}
