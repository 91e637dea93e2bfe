//! Scripted collaborators shared by the integration tests.

use async_trait::async_trait;
use folio::config::OrchestratorConfig;
use folio::error::ApiError;
use folio::persistence::ChapterStore;
use folio::provider::{GenerationBackend, GenerationRequest};
use folio::search::{RawResult, SearchBackend};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// One generation call as observed by the backend.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub id: String,
    pub prompt: String,
    pub started: Instant,
    pub finished: Instant,
}

impl CallRecord {
    /// Chapter number from a `chNN-...` request id.
    pub fn chapter(&self) -> u32 {
        self.id
            .strip_prefix("ch")
            .and_then(|rest| rest.split('-').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

/// Generation stub: fixed body, scripted failures by request-id suffix,
/// optional latency, and a record of every call and the peak concurrency.
pub struct ScriptedBackend {
    body: String,
    fail_suffixes: Vec<String>,
    delay: Duration,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            fail_suffixes: Vec::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, suffixes: &[&str]) -> Self {
        self.fail_suffixes = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// (first start, last finish) per chapter
    pub fn chapter_windows(&self) -> BTreeMap<u32, (Instant, Instant)> {
        let mut windows: BTreeMap<u32, (Instant, Instant)> = BTreeMap::new();
        for call in self.calls() {
            let window = windows
                .entry(call.chapter())
                .or_insert((call.started, call.finished));
            window.0 = window.0.min(call.started);
            window.1 = window.1.max(call.finished);
        }
        windows
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let started = Instant::now();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().push(CallRecord {
            id: request.id.clone(),
            prompt: request.prompt_payload.clone(),
            started,
            finished: Instant::now(),
        });

        if self.fail_suffixes.iter().any(|s| request.id.ends_with(s.as_str())) {
            return Err(ApiError::ProviderRequestFailed(format!(
                "scripted failure for {}",
                request.id
            )));
        }
        Ok(self.body.clone())
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}

/// Search stub returning the same hits for every query.
pub struct ScriptedSearch {
    hits: Vec<RawResult>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new(hits: Vec<RawResult>) -> Self {
        Self {
            hits,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawResult>, ApiError> {
        self.queries.lock().push(query.to_string());
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}

/// Store that keeps chapters in memory in save order.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<(u32, String)>>,
}

impl MemoryStore {
    pub fn saved(&self) -> Vec<(u32, String)> {
        self.saved.lock().clone()
    }

    pub fn chapter(&self, number: u32) -> Option<String> {
        self.saved
            .lock()
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, content)| content.clone())
    }
}

#[async_trait]
impl ChapterStore for MemoryStore {
    async fn save_chapter(&self, number: u32, content: &str) -> Result<PathBuf, ApiError> {
        self.saved.lock().push((number, content.to_string()));
        Ok(PathBuf::from(format!("memory/chapter_{:02}.md", number)))
    }
}

/// Twelve distinct sentences about urban heat, each with a transition.
pub fn prose() -> String {
    (0..12)
        .map(|i| {
            format!(
                "However, street survey {} shows that shaded urban corridors cool measurably.",
                i
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn hit(doi: &str, author: &str, year: i32) -> RawResult {
    RawResult {
        title: format!("Urban heat mitigation with street trees {}", doi),
        authors: vec![author.to_string()],
        year: Some(year),
        doi: Some(doi.to_string()),
        url: None,
        abstract_text: "Urban heat islands raise city temperatures; street trees and shading reduce urban heat exposure across districts and seasons."
            .to_string(),
        venue: Some("Urban Climate".to_string()),
    }
}

/// Defaults with the waits taken out.
pub fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.writing.stagger_ms = 0;
    config.writing.retry_delay_ms = 0;
    config.research.background_interval_ms = 0;
    config.research.min_pool_target = 0;
    config
}
