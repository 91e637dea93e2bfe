//! Background research rounds that keep topping up a chapter's pool while its
//! sections are being written.

use crate::evidence::EvidencePool;
use crate::research::fanout::ResearchFanout;
use crate::research::ResearchQuery;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to a running background research task.
pub struct BackgroundResearch {
    chapter: u32,
    token: CancellationToken,
    handle: JoinHandle<usize>,
}

impl BackgroundResearch {
    /// Start searching every `interval` until stopped. Round `n` widens each
    /// query with objective `n` (cycling) so later rounds surface new hits.
    pub fn spawn(
        chapter: u32,
        fanout: Arc<ResearchFanout>,
        queries: Vec<ResearchQuery>,
        objectives: Vec<String>,
        pool: Arc<EvidencePool>,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let child = token.child_token();
        let handle = tokio::spawn(async move {
            let mut added = 0usize;
            let mut round = 0usize;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let round_queries = widen(&queries, &objectives, round);
                round += 1;
                let found = tokio::select! {
                    _ = child.cancelled() => break,
                    found = fanout.gather(chapter, &round_queries, &objectives) => found,
                };
                // A single locked append; nothing is partially written if
                // cancellation lands between rounds.
                let seeded = pool.seed(found);
                added += seeded;
                debug!(chapter, round, seeded, "background research round");
            }
            added
        });

        Self {
            chapter,
            token,
            handle,
        }
    }

    /// Cancel and wait for the task, returning how many items it contributed.
    pub async fn stop(self) -> usize {
        self.token.cancel();
        match self.handle.await {
            Ok(added) => {
                debug!(chapter = self.chapter, added, "background research stopped");
                added
            }
            Err(err) => {
                warn!(chapter = self.chapter, error = %err, "background research task failed");
                0
            }
        }
    }
}

fn widen(queries: &[ResearchQuery], objectives: &[String], round: usize) -> Vec<ResearchQuery> {
    if objectives.is_empty() {
        return queries.to_vec();
    }
    let objective = &objectives[round % objectives.len()];
    queries
        .iter()
        .map(|q| ResearchQuery::new(q.scope.clone(), format!("{} {}", q.text, objective)))
        .collect()
}
