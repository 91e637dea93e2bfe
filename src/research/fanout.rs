//! Concurrent search fan-out feeding an evidence pool.

use crate::config::ResearchConfig;
use crate::error::ApiError;
use crate::evidence::{evidence_identifier, EvidenceItem, EvidencePool};
use crate::limiter::AdaptiveLimiter;
use crate::research::relevance::{keywords, RelevanceFilter};
use crate::research::ResearchQuery;
use crate::search::{RawResult, SearchBackend};
use crate::telemetry::{ProgressBus, ResearchSummaryData};
use chrono::Datelike;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Raw hits fetched for one query
struct QueryBatch {
    query: ResearchQuery,
    hits: Vec<RawResult>,
}

/// Result of one research round
#[derive(Debug, Clone, Default)]
pub struct ResearchOutcome {
    /// Deduplicated accepted evidence in query order
    pub accepted: Vec<EvidenceItem>,
    /// Accepted evidence partitioned by query scope
    pub by_scope: BTreeMap<String, Vec<EvidenceItem>>,
    pub failed_queries: Vec<String>,
    pub raw_count: usize,
    /// The one-time relaxed filter was applied
    pub relaxed: bool,
    /// Items newly added to the pool
    pub seeded: usize,
}

impl ResearchOutcome {
    pub fn scope(&self, scope: &str) -> &[EvidenceItem] {
        self.by_scope.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct ResearchFanout {
    search: Arc<dyn SearchBackend>,
    limiter: Arc<AdaptiveLimiter>,
    config: ResearchConfig,
    progress: Option<ProgressBus>,
}

impl ResearchFanout {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        limiter: Arc<AdaptiveLimiter>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            search,
            limiter,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressBus>) -> Self {
        self.progress = progress;
        self
    }

    /// Run every query concurrently, filter the hits and seed `pool`.
    pub async fn run(
        &self,
        chapter: u32,
        queries: &[ResearchQuery],
        objectives: &[String],
        pool: &EvidencePool,
    ) -> ResearchOutcome {
        let (batches, failed_queries) = self.fetch_all(chapter, queries).await;
        let raw_count = batches.iter().map(|b| b.hits.len()).sum();

        let filter = RelevanceFilter::from_config(&self.config, chrono::Utc::now().year());
        let mut accepted = select(&batches, objectives, &filter);
        let mut relaxed = false;
        if accepted.len() < self.config.min_pool_target && raw_count > accepted.len() {
            let loosened = filter.relaxed(self.config.relaxation_factor);
            accepted = select(&batches, objectives, &loosened);
            relaxed = true;
            debug!(
                chapter,
                accepted = accepted.len(),
                target = self.config.min_pool_target,
                "relevance filter relaxed"
            );
        }

        let mut by_scope: BTreeMap<String, Vec<EvidenceItem>> = BTreeMap::new();
        for item in &accepted {
            by_scope
                .entry(item.origin_scope.clone())
                .or_default()
                .push(item.clone());
        }
        let seeded = pool.seed(accepted.iter().cloned());

        info!(
            chapter,
            queries = queries.len(),
            failed = failed_queries.len(),
            raw = raw_count,
            accepted = accepted.len(),
            relaxed,
            "research completed"
        );
        self.emit(
            "research_completed",
            json!(ResearchSummaryData {
                chapter,
                queries: queries.len(),
                failed_queries: failed_queries.len(),
                raw_results: raw_count,
                accepted: accepted.len(),
                relaxed,
            }),
        );

        ResearchOutcome {
            accepted,
            by_scope,
            failed_queries,
            raw_count,
            relaxed,
            seeded,
        }
    }

    /// Fetch and filter without relaxation, for background top-up rounds.
    pub(crate) async fn gather(
        &self,
        chapter: u32,
        queries: &[ResearchQuery],
        objectives: &[String],
    ) -> Vec<EvidenceItem> {
        let (batches, _) = self.fetch_all(chapter, queries).await;
        let filter = RelevanceFilter::from_config(&self.config, chrono::Utc::now().year());
        select(&batches, objectives, &filter)
    }

    /// Query results in input order. Failed queries contribute nothing.
    async fn fetch_all(
        &self,
        chapter: u32,
        queries: &[ResearchQuery],
    ) -> (Vec<QueryBatch>, Vec<String>) {
        let mut pending: FuturesUnordered<_> = queries
            .iter()
            .enumerate()
            .map(|(index, query)| async move { (index, self.fetch_one(query).await) })
            .collect();

        let mut slots: Vec<Option<QueryBatch>> = queries.iter().map(|_| None).collect();
        let mut failed = Vec::new();
        while let Some((index, result)) = pending.next().await {
            let query = &queries[index];
            match result {
                Ok(hits) => {
                    slots[index] = Some(QueryBatch {
                        query: query.clone(),
                        hits,
                    })
                }
                Err(err) => {
                    warn!(
                        chapter,
                        scope = %query.scope,
                        query = %query.text,
                        backend = self.search.backend_name(),
                        error = %err,
                        "search query failed"
                    );
                    self.emit(
                        "query_failed",
                        json!({
                            "chapter": chapter,
                            "scope": query.scope,
                            "query": query.text,
                            "error": err.to_string(),
                        }),
                    );
                    failed.push(query.text.clone());
                }
            }
        }
        (slots.into_iter().flatten().collect(), failed)
    }

    /// Query with retries and linear backoff. Terminal errors end the loop early.
    async fn fetch_one(&self, query: &ResearchQuery) -> Result<Vec<RawResult>, ApiError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.search_once(query).await {
                Ok(hits) => return Ok(hits),
                Err(err) if attempt >= max_attempts || !err.is_retryable() => return Err(err),
                Err(err) => {
                    debug!(
                        query = %query.text,
                        attempt,
                        error = %err,
                        "search attempt failed, retrying"
                    );
                    sleep(self.config.retry_delay(attempt)).await;
                }
            }
        }
    }

    async fn search_once(&self, query: &ResearchQuery) -> Result<Vec<RawResult>, ApiError> {
        let _permit = self.limiter.acquire().await;
        let timeout = self.config.search_timeout();
        let result = match tokio::time::timeout(
            timeout,
            self.search
                .search(&query.text, self.config.max_results_per_query),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::SearchTimeout(timeout.as_secs())),
        };
        match &result {
            Ok(_) => self.limiter.record_success(),
            Err(_) => self.limiter.record_failure(),
        }
        result
    }

    fn emit(&self, event_type: &str, data: serde_json::Value) {
        if let Some(progress) = &self.progress {
            progress.emit_best_effort(event_type, data);
        }
    }
}

/// Filter every batch, deduplicating by identifier with the first occurrence winning.
fn select(
    batches: &[QueryBatch],
    objectives: &[String],
    filter: &RelevanceFilter,
) -> Vec<EvidenceItem> {
    let objective_words: HashSet<String> = objectives.iter().flat_map(|o| keywords(o)).collect();
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();

    for batch in batches {
        let mut words = keywords(&batch.query.text);
        words.extend(objective_words.iter().cloned());
        for hit in &batch.hits {
            if filter.admit(&words, hit).is_none() {
                continue;
            }
            let identifier = evidence_identifier(hit.doi.as_deref(), &hit.title);
            if !seen.insert(identifier.clone()) {
                continue;
            }
            accepted.push(to_evidence(identifier, hit, &batch.query.scope));
        }
    }
    accepted
}

fn to_evidence(identifier: String, hit: &RawResult, scope: &str) -> EvidenceItem {
    EvidenceItem {
        identifier,
        title: hit.title.trim().to_string(),
        authors: hit.authors.clone(),
        year: hit.year.unwrap_or_default(),
        url: hit
            .url
            .clone()
            .or_else(|| hit.doi.as_ref().map(|doi| format!("https://doi.org/{}", doi))),
        abstract_text: hit.abstract_text.clone(),
        venue: hit.venue.clone(),
        origin_scope: scope.to_string(),
    }
}
