//! Tiered execution of a document plan.

use crate::config::OrchestratorConfig;
use crate::error::ApiError;
use crate::limiter::AdaptiveLimiter;
use crate::orchestrator::chapter::{digest, ChapterProduct, ChapterRunner};
use crate::orchestrator::graph::ChapterGraph;
use crate::orchestrator::{ChapterReport, ChapterState, RunReport};
use crate::persistence::ChapterStore;
use crate::provider::GenerationBackend;
use crate::quality::{QualityPipeline, QualitySummary};
use crate::search::SearchBackend;
use crate::telemetry::{ChapterStateData, ProgressBus};
use crate::writing::DocumentPlan;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Characters of an accepted chapter handed to its dependents
const DIGEST_CHARS: usize = 600;

pub struct Orchestrator {
    generation: Arc<dyn GenerationBackend>,
    search: Arc<dyn SearchBackend>,
    store: Arc<dyn ChapterStore>,
    config: OrchestratorConfig,
    progress: Option<ProgressBus>,
}

impl Orchestrator {
    pub fn new(
        generation: Arc<dyn GenerationBackend>,
        search: Arc<dyn SearchBackend>,
        store: Arc<dyn ChapterStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            generation,
            search,
            store,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressBus>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every chapter tier by tier. Chapters in a tier run concurrently;
    /// the next tier starts only once every chapter of this one is terminal.
    ///
    /// In strict mode a rejected chapter lets its tier finish, then the run
    /// stops with [`ApiError::QualityGateFailed`] naming every rejected
    /// chapter. In lenient mode rejected chapters are persisted with their
    /// quality warnings embedded.
    pub async fn run(&self, plan: &DocumentPlan) -> Result<RunReport, ApiError> {
        self.config.ensure_valid()?;
        plan.validate()?;
        let mut graph = ChapterGraph::from_plan(plan)?;
        let tiers = graph.tiers().to_vec();

        // One limiter per backend for the whole run, one pool per chapter.
        let runner = Arc::new(ChapterRunner {
            generation: Arc::clone(&self.generation),
            search: Arc::clone(&self.search),
            generation_limiter: Arc::new(AdaptiveLimiter::new("generation", &self.config.limiter)),
            search_limiter: Arc::new(AdaptiveLimiter::new("search", &self.config.search_limiter)),
            quality: Arc::new(QualityPipeline::new()?.with_progress(self.progress.clone())),
            config: self.config.clone(),
            progress: self.progress.clone(),
            topic: plan.topic.clone(),
            document_objectives: plan.objectives.clone(),
        });

        let mut report = RunReport {
            session: self.progress.as_ref().map(|p| p.session_id().to_string()),
            tiers: tiers.clone(),
            chapters: Vec::new(),
        };
        let mut digests: HashMap<u32, String> = HashMap::new();

        info!(topic = %plan.topic, chapters = plan.chapters.len(), tiers = tiers.len(), "run started");
        self.emit(
            "run_started",
            json!({
                "topic": plan.topic,
                "chapters": plan.chapters.len(),
                "tiers": tiers,
                "strict": self.config.strict,
            }),
        );

        for (tier_index, tier) in tiers.iter().enumerate() {
            info!(tier = tier_index, chapters = ?tier, "tier started");
            self.emit("tier_started", json!({ "tier": tier_index, "chapters": tier }));

            let (state_tx, mut state_rx) = mpsc::unbounded_channel();
            let mut tasks = FuturesUnordered::new();
            for &number in tier {
                let Some(chapter) = plan.chapter(number).cloned() else {
                    continue;
                };
                self.set_state(&mut graph, number, ChapterState::Scheduled, None);
                let predecessors: Vec<(u32, String)> = graph
                    .node(number)
                    .map(|node| node.depends_on.clone())
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|dep| digests.get(&dep).map(|d| (dep, d.clone())))
                    .collect();
                let runner = Arc::clone(&runner);
                let states = state_tx.clone();
                let handle = tokio::spawn(async move { runner.run(&chapter, predecessors, states).await });
                tasks.push(async move { (number, handle.await) });
            }
            drop(state_tx);

            // Join point: the whole tier completes before any gate decision.
            let mut finished = Vec::new();
            loop {
                tokio::select! {
                    Some((number, state)) = state_rx.recv() => {
                        self.set_state(&mut graph, number, state, None);
                    }
                    joined = tasks.next() => match joined {
                        Some(done) => finished.push(done),
                        None => break,
                    },
                }
            }
            while let Ok((number, state)) = state_rx.try_recv() {
                self.set_state(&mut graph, number, state, None);
            }
            finished.sort_by_key(|(number, _)| *number);

            let mut rejected = Vec::new();
            for (number, joined) in finished {
                let title = plan
                    .chapter(number)
                    .map(|c| c.title.clone())
                    .unwrap_or_default();
                let product = match joined {
                    Ok(Ok(product)) => product,
                    Ok(Err(err)) => {
                        error!(chapter = number, error = %err, "chapter failed");
                        report.chapters.push(self.fail(&mut graph, number, title, err.to_string()));
                        rejected.push(number);
                        continue;
                    }
                    Err(err) => {
                        error!(chapter = number, error = %err, "chapter task panicked");
                        report.chapters.push(self.fail(&mut graph, number, title, err.to_string()));
                        rejected.push(number);
                        continue;
                    }
                };

                let summary = &product.quality.summary;
                let passed = summary.passes(self.config.quality.min_score);
                let mut chapter_report = chapter_report(number, title, &product, passed);

                let content = if passed {
                    product.quality.assembled.text.clone()
                } else {
                    let issues = summary.issues();
                    warn!(
                        chapter = number,
                        score = summary.score,
                        critical = summary.critical_issues,
                        strict = self.config.strict,
                        "chapter failed quality gate"
                    );
                    self.set_state(
                        &mut graph,
                        number,
                        ChapterState::Rejected,
                        Some(format!("score {:.1}, {} critical", summary.score, summary.critical_issues)),
                    );
                    self.emit(
                        "chapter_rejected",
                        json!({
                            "chapter": number,
                            "score": summary.score,
                            "critical_issues": summary.critical_issues,
                            "issues": issues,
                            "strict": self.config.strict,
                        }),
                    );
                    if self.config.strict {
                        chapter_report.state = ChapterState::Rejected;
                        report.chapters.push(chapter_report);
                        rejected.push(number);
                        continue;
                    }
                    embed_warnings(&product.quality.assembled.text, summary)
                };

                graph.record(number, content.clone(), passed);
                let path = self.store.save_chapter(number, &content).await?;
                self.set_state(&mut graph, number, ChapterState::Accepted, None);
                self.emit(
                    "chapter_accepted",
                    json!({
                        "chapter": number,
                        "score": summary.score,
                        "quality_passed": passed,
                        "path": path.display().to_string(),
                    }),
                );
                info!(chapter = number, path = %path.display(), "chapter accepted");

                if let Some(node) = graph.retire(number) {
                    let text = node.produced_content.unwrap_or_default();
                    digests.insert(number, digest(&text, DIGEST_CHARS));
                }
                chapter_report.state = ChapterState::Accepted;
                chapter_report.path = Some(path);
                report.chapters.push(chapter_report);
            }

            self.emit(
                "tier_completed",
                json!({ "tier": tier_index, "chapters": tier, "rejected": rejected }),
            );

            if self.config.strict && !rejected.is_empty() {
                error!(tier = tier_index, rejected = ?rejected, "run aborted by quality gate");
                self.emit(
                    "run_completed",
                    json!({ "status": "aborted", "rejected": rejected }),
                );
                return Err(ApiError::QualityGateFailed(rejected));
            }
        }

        report.chapters.sort_by_key(|c| c.number);
        let below_gate = report.below_gate();
        info!(
            accepted = report.accepted(),
            below_gate = below_gate.len(),
            "run completed"
        );
        self.emit(
            "run_completed",
            json!({
                "status": "completed",
                "accepted": report.accepted(),
                "below_gate": below_gate,
            }),
        );
        Ok(report)
    }

    /// A chapter that produced nothing to gate. Strict runs abort after the
    /// tier; lenient runs continue without it.
    fn fail(&self, graph: &mut ChapterGraph, number: u32, title: String, message: String) -> ChapterReport {
        self.set_state(graph, number, ChapterState::Rejected, Some(message.clone()));
        graph.retire(number);
        ChapterReport {
            number,
            title,
            state: ChapterState::Rejected,
            quality_passed: false,
            score: 0.0,
            critical_issues: 0,
            warnings: 0,
            issues: Vec::new(),
            placeholders: Vec::new(),
            removed_citations: 0,
            evidence_accepted: 0,
            background_added: 0,
            references: 0,
            path: None,
            error: Some(message),
        }
    }

    fn set_state(&self, graph: &mut ChapterGraph, chapter: u32, state: ChapterState, detail: Option<String>) {
        graph.transition(chapter, state);
        self.emit(
            "chapter_state_changed",
            json!(ChapterStateData {
                chapter,
                state: state.as_str().to_string(),
                detail,
            }),
        );
    }

    fn emit(&self, event_type: &str, data: Value) {
        if let Some(progress) = &self.progress {
            progress.emit_best_effort(event_type, data);
        }
    }
}

fn chapter_report(number: u32, title: String, product: &ChapterProduct, passed: bool) -> ChapterReport {
    let summary = &product.quality.summary;
    ChapterReport {
        number,
        title,
        state: ChapterState::QualityChecking,
        quality_passed: passed,
        score: summary.score,
        critical_issues: summary.critical_issues,
        warnings: summary.warnings,
        issues: summary.issues(),
        placeholders: product
            .quality
            .document
            .placeholders()
            .map(|s| s.section_id.to_string())
            .collect(),
        removed_citations: summary.removed_citations,
        evidence_accepted: product.evidence_accepted,
        background_added: product.background_added,
        references: product.quality.assembled.references.len(),
        path: None,
        error: None,
    }
}

/// Insert a warnings block after the chapter heading.
fn embed_warnings(text: &str, summary: &QualitySummary) -> String {
    let mut block = format!(
        "> **Quality warnings:** score {:.1}, {} critical issue(s), {} warning(s)\n",
        summary.score, summary.critical_issues, summary.warnings
    );
    for issue in summary.issues() {
        block.push_str(&format!("> - {}\n", issue));
    }
    match text.split_once("\n\n") {
        Some((heading, rest)) => format!("{}\n\n{}\n{}", heading, block, rest),
        None => format!("{}\n\n{}", text.trim_end(), block),
    }
}
