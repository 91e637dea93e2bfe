//! One chapter from research to a quality verdict.

use crate::config::OrchestratorConfig;
use crate::error::ApiError;
use crate::evidence::{EvidenceItem, EvidencePool};
use crate::limiter::AdaptiveLimiter;
use crate::orchestrator::ChapterState;
use crate::provider::GenerationBackend;
use crate::quality::{AuditContext, QualityOutcome, QualityPipeline};
use crate::research::{BackgroundResearch, ResearchFanout};
use crate::search::SearchBackend;
use crate::telemetry::ProgressBus;
use crate::writing::{ChapterPlan, SectionContext, SectionWorker, WriteFanout};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Everything a chapter run produced
pub(crate) struct ChapterProduct {
    pub quality: QualityOutcome,
    pub evidence_accepted: usize,
    pub background_added: usize,
}

/// Shared collaborators for every chapter in a run
pub(crate) struct ChapterRunner {
    pub generation: Arc<dyn GenerationBackend>,
    pub search: Arc<dyn SearchBackend>,
    pub generation_limiter: Arc<AdaptiveLimiter>,
    pub search_limiter: Arc<AdaptiveLimiter>,
    pub quality: Arc<QualityPipeline>,
    pub config: OrchestratorConfig,
    pub progress: Option<ProgressBus>,
    pub topic: String,
    pub document_objectives: Vec<String>,
}

impl ChapterRunner {
    /// Research, write and audit one chapter. Intermediate states are sent
    /// on `states`; the terminal state is decided by the caller's gate.
    pub async fn run(
        &self,
        plan: &ChapterPlan,
        predecessors: Vec<(u32, String)>,
        states: UnboundedSender<(u32, ChapterState)>,
    ) -> Result<ChapterProduct, ApiError> {
        let chapter = plan.number;
        let sections = plan.prepare()?;
        let objectives = if plan.objectives.is_empty() {
            self.document_objectives.clone()
        } else {
            plan.objectives.clone()
        };
        // The receiver lives as long as the run; a closed channel only
        // means nobody is listening for transitions anymore.
        let advance = |state| {
            let _ = states.send((chapter, state));
        };

        advance(ChapterState::Researching);
        let pool = Arc::new(EvidencePool::new());
        let research = Arc::new(
            ResearchFanout::new(
                Arc::clone(&self.search),
                Arc::clone(&self.search_limiter),
                self.config.research.clone(),
            )
            .with_progress(self.progress.clone()),
        );
        let found = research.run(chapter, &plan.queries, &objectives, &pool).await;

        let background = (self.config.research.background_interval_ms > 0 && !plan.queries.is_empty())
            .then(|| {
                BackgroundResearch::spawn(
                    chapter,
                    Arc::clone(&research),
                    plan.queries.clone(),
                    objectives.clone(),
                    Arc::clone(&pool),
                    Duration::from_millis(self.config.research.background_interval_ms),
                )
            });

        advance(ChapterState::Writing);
        let context = SectionContext {
            topic: self.topic.clone(),
            chapter,
            chapter_title: plan.title.clone(),
            objectives: objectives.clone(),
            predecessors,
            temperature: self.config.writing.temperature,
            max_tokens: self.config.writing.max_tokens,
        };
        let worker = SectionWorker::new(
            Arc::clone(&self.generation),
            Arc::clone(&self.generation_limiter),
            Arc::clone(&pool),
            self.config.writing.clone(),
            context,
        )?;
        let document = WriteFanout::new(Arc::new(worker))
            .with_progress(self.progress.clone())
            .run(&sections)
            .await;

        let background_added = match background {
            Some(background) => background.stop().await,
            None => 0,
        };
        debug!(chapter, remaining = pool.remaining(), issued = pool.issued(), "evidence pool drained");

        advance(ChapterState::QualityChecking);
        let evidence = known_evidence(&found.accepted, document.evidence_used());
        let audit = AuditContext {
            chapter,
            title: plan.title.clone(),
            expected: sections.iter().map(|s| s.id.clone()).collect(),
            objectives,
            evidence,
            config: self.config.quality.clone(),
        };
        let quality = self.quality.run(document, audit).await;

        info!(
            chapter,
            score = quality.summary.score,
            evidence = found.accepted.len(),
            background_added,
            "chapter produced"
        );
        Ok(ChapterProduct {
            quality,
            evidence_accepted: found.accepted.len(),
            background_added,
        })
    }
}

/// Research results plus anything background rounds supplied to writers,
/// deduplicated by identifier.
fn known_evidence<'a>(
    accepted: &'a [EvidenceItem],
    used: impl Iterator<Item = &'a EvidenceItem>,
) -> Vec<EvidenceItem> {
    let mut seen = HashSet::new();
    accepted
        .iter()
        .chain(used)
        .filter(|item| seen.insert(item.identifier.clone()))
        .cloned()
        .collect()
}

/// Leading text of an accepted chapter, passed to dependents.
pub(crate) fn digest(text: &str, limit: usize) -> String {
    let body: String = text
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with('>') && !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    match body.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", body[..cut].trim_end()),
        None => body,
    }
}
