//! Section worker: one section from evidence allocation to a stored result.

use crate::config::WritingConfig;
use crate::error::ApiError;
use crate::evidence::EvidencePool;
use crate::limiter::AdaptiveLimiter;
use crate::provider::{GenerationBackend, GenerationRequest};
use crate::writing::document::SectionResult;
use crate::writing::groups::WriterGroups;
use crate::writing::plan::{PreparedSection, SectionContext};
use crate::writing::postprocess::Sanitizer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// What one section task produced
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub result: SectionResult,
    /// Time from first attempt to result, stagger excluded
    pub elapsed: Duration,
}

pub struct SectionWorker {
    generation: Arc<dyn GenerationBackend>,
    limiter: Arc<AdaptiveLimiter>,
    pool: Arc<EvidencePool>,
    groups: Arc<WriterGroups>,
    sanitizer: Sanitizer,
    config: WritingConfig,
    context: SectionContext,
}

impl SectionWorker {
    pub fn new(
        generation: Arc<dyn GenerationBackend>,
        limiter: Arc<AdaptiveLimiter>,
        pool: Arc<EvidencePool>,
        config: WritingConfig,
        context: SectionContext,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            generation,
            limiter,
            pool,
            groups: Arc::new(WriterGroups::new(config.writer_group_concurrency)),
            sanitizer: Sanitizer::new()?,
            config,
            context,
        })
    }

    pub fn chapter(&self) -> u32 {
        self.context.chapter
    }

    /// Stagger, take evidence, generate with retries, post-process.
    /// Exhausted retries yield a failed placeholder, never an error.
    pub async fn write(&self, section: &PreparedSection) -> SectionOutcome {
        let stagger = self
            .config
            .stagger()
            .saturating_mul(u32::try_from(section.index).unwrap_or(u32::MAX));
        if !stagger.is_zero() {
            sleep(stagger).await;
        }

        let _group = match self.groups.acquire(&section.spec.writer_group).await {
            Ok(permit) => Some(permit),
            Err(err) => {
                warn!(section = %section.id, error = %err, "writer group unavailable, continuing without it");
                None
            }
        };

        let started = Instant::now();
        let evidence = self.pool.take_fresh(section.spec.evidence_needed);
        let request = section.build_request(&self.context, &evidence);
        let (outcome, attempts) = self.generate_with_retry(&request).await;

        let result = match outcome {
            Ok(text) => {
                let content = self.sanitizer.link_citations(&text, &evidence);
                SectionResult::completed(
                    section.id.clone(),
                    &section.spec.title,
                    content,
                    evidence,
                    attempts,
                )
            }
            Err(err) => {
                warn!(
                    chapter = self.context.chapter,
                    section = %section.id,
                    attempts,
                    error = %err,
                    "section generation exhausted retries"
                );
                SectionResult::failed(section.id.clone(), &section.spec.title, evidence, attempts, &err)
            }
        };

        SectionOutcome {
            result,
            elapsed: started.elapsed(),
        }
    }

    /// Single extra attempt for a section missing after the main pass.
    pub async fn repair(&self, section: &PreparedSection) -> SectionOutcome {
        let started = Instant::now();
        let evidence = self.pool.take_fresh(section.spec.evidence_needed);
        let request = section.build_request(&self.context, &evidence);

        let result = match self.attempt(&request).await {
            Ok(text) => {
                let content = self.sanitizer.link_citations(&text, &evidence);
                SectionResult::completed(section.id.clone(), &section.spec.title, content, evidence, 1)
            }
            Err(err) => {
                warn!(
                    chapter = self.context.chapter,
                    section = %section.id,
                    error = %err,
                    "section repair failed, inserting placeholder"
                );
                SectionResult::pending(
                    section.id.clone(),
                    &section.spec.title,
                    format!("section was not produced and the repair attempt failed: {}", err),
                )
            }
        };

        SectionOutcome {
            result,
            elapsed: started.elapsed(),
        }
    }

    async fn generate_with_retry(&self, request: &GenerationRequest) -> (Result<String, ApiError>, u32) {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(request).await {
                Ok(text) => return (Ok(text), attempt),
                Err(err) => {
                    let terminal = !err.is_retryable() && !self.config.retry_terminal_errors;
                    if attempt >= max_attempts || terminal {
                        return (Err(err), attempt);
                    }
                    debug!(
                        request_id = %request.id,
                        attempt,
                        error = %err,
                        "generation attempt failed, retrying"
                    );
                    sleep(self.config.retry_delay(attempt)).await;
                }
            }
        }
    }

    /// One backend call under a limiter slot. Timeouts and output that is
    /// empty once metadata is stripped count as failures.
    async fn attempt(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let _permit = self.limiter.acquire().await;
        let timeout = self.config.call_timeout();
        let outcome = match tokio::time::timeout(timeout, self.generation.generate(request)).await {
            Ok(Ok(raw)) => {
                let text = self.sanitizer.strip_metadata(&raw);
                if text.trim().is_empty() {
                    Err(ApiError::GenerationFailed(format!(
                        "{} returned no usable text for {}",
                        self.generation.backend_name(),
                        request.id
                    )))
                } else {
                    Ok(text)
                }
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ApiError::ProviderTimeout(timeout.as_secs())),
        };
        match &outcome {
            Ok(_) => self.limiter.record_success(),
            Err(_) => self.limiter.record_failure(),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimiterConfig;
    use crate::evidence::test_item;
    use crate::provider::MockBackend;
    use crate::writing::document::SectionStatus;
    use crate::writing::plan::{SectionSpec, SectionStyle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn writing_config() -> WritingConfig {
        WritingConfig {
            stagger_ms: 0,
            retry_delay_ms: 1,
            call_timeout_secs: 5,
            ..WritingConfig::default()
        }
    }

    fn section(id: &str, index: usize) -> PreparedSection {
        let spec = SectionSpec {
            id: id.to_string(),
            title: format!("Section {}", id),
            style: SectionStyle::Analysis,
            evidence_needed: 2,
            writer_group: "default".to_string(),
        };
        PreparedSection {
            id: id.parse().unwrap(),
            index,
            builder: spec.style.builder(),
            spec,
        }
    }

    fn context(chapter: u32) -> SectionContext {
        SectionContext {
            topic: "Urban heat".to_string(),
            chapter,
            chapter_title: "Chapter".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            ..SectionContext::default()
        }
    }

    fn worker(backend: Arc<dyn GenerationBackend>, pool: Arc<EvidencePool>, limiter: Arc<AdaptiveLimiter>) -> SectionWorker {
        SectionWorker::new(backend, limiter, pool, writing_config(), context(2)).unwrap()
    }

    /// Fails the first `failures` calls, then succeeds
    struct FlakyBackend {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerationBackend for FlakyBackend {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(ApiError::ProviderRateLimit("slow down".to_string()))
            } else {
                Ok("Recovered text citing (Smith, 2022).".to_string())
            }
        }

        fn backend_name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn success_takes_evidence_and_links_citations() {
        let pool = Arc::new(EvidencePool::new());
        pool.seed(vec![
            test_item("10.1/s", "Ada Smith", 2022),
            test_item("10.1/j", "Bo Jones", 2021),
            test_item("10.1/x", "Cy Lee", 2020),
        ]);
        let backend = Arc::new(MockBackend::new("temperature: 0.7\nHeat rises (Smith, 2022)."));
        let limiter = Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default()));
        let worker = worker(backend.clone(), Arc::clone(&pool), limiter);

        let outcome = worker.write(&section("2.1", 0)).await;
        let result = outcome.result;
        assert_eq!(result.status, SectionStatus::Completed);
        assert_eq!(result.evidence_used.len(), 2);
        assert_eq!(result.content, "Heat rises [(Smith, 2022)](https://doi.org/10.1/s).");
        assert_eq!(result.word_count, 4);
        assert_eq!(pool.remaining(), 1);
        assert_eq!(backend.calls(), vec!["ch02-2.1"]);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_and_recorded() {
        let backend = Arc::new(FlakyBackend {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let limiter = Arc::new(AdaptiveLimiter::new(
            "gen",
            &LimiterConfig {
                initial: 4,
                hard_min: 1,
                hard_max: 8,
                success_threshold: 5,
                failure_threshold: 2,
            },
        ));
        let worker = worker(backend.clone(), Arc::new(EvidencePool::new()), Arc::clone(&limiter));

        let result = worker.write(&section("2.1", 0)).await.result;
        assert_eq!(result.status, SectionStatus::Completed);
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        // Two consecutive failures narrowed the ceiling once
        let state = limiter.snapshot();
        assert_eq!(state.current_ceiling, 3);
        assert_eq!(state.success_streak, 1);
        assert_eq!(state.in_flight, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_store_failed_placeholder() {
        let backend = Arc::new(MockBackend::new("text").failing_on(&["-3.4"]));
        let limiter = Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default()));
        let worker = worker(backend.clone(), Arc::new(EvidencePool::new()), limiter);

        let result = worker.write(&section("3.4", 0)).await.result;
        assert_eq!(result.status, SectionStatus::Failed);
        assert_eq!(result.attempts, 3);
        assert!(result.content.contains("Placeholder"));
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn terminal_errors_stop_early_when_configured() {
        struct AuthFailure;

        #[async_trait]
        impl GenerationBackend for AuthFailure {
            async fn generate(&self, _request: &GenerationRequest) -> Result<String, ApiError> {
                Err(ApiError::ProviderAuthFailed("401".to_string()))
            }

            fn backend_name(&self) -> &str {
                "auth"
            }
        }

        let mut config = writing_config();
        config.retry_terminal_errors = false;
        let worker = SectionWorker::new(
            Arc::new(AuthFailure),
            Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default())),
            Arc::new(EvidencePool::new()),
            config,
            context(2),
        )
        .unwrap();

        let result = worker.write(&section("2.1", 0)).await.result;
        assert_eq!(result.status, SectionStatus::Failed);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_calls_are_retried_and_narrow_the_ceiling() {
        struct StalledBackend {
            calls: AtomicU32,
        }

        #[async_trait]
        impl GenerationBackend for StalledBackend {
            async fn generate(&self, _request: &GenerationRequest) -> Result<String, ApiError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(60)).await;
                Ok("Too late.".to_string())
            }

            fn backend_name(&self) -> &str {
                "stalled"
            }
        }

        let backend = Arc::new(StalledBackend {
            calls: AtomicU32::new(0),
        });
        let limiter = Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default()));
        let worker = worker(backend.clone(), Arc::new(EvidencePool::new()), Arc::clone(&limiter));

        let before = tokio::time::Instant::now();
        let result = worker.write(&section("2.1", 0)).await.result;
        assert_eq!(result.status, SectionStatus::Failed);
        assert_eq!(result.attempts, 3);
        assert!(result.note.unwrap().contains("timed out after 5s"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        // Each attempt is cut at the 5s call timeout
        assert!(before.elapsed() < Duration::from_secs(60));

        // Three failures: the ceiling dropped once and one failure is pending
        let state = limiter.snapshot();
        assert_eq!(state.current_ceiling, 3);
        assert_eq!(state.failure_streak, 1);
        assert_eq!(state.in_flight, 0);
    }

    #[tokio::test]
    async fn metadata_only_output_counts_as_failure() {
        let backend = Arc::new(MockBackend::new("model: test\nmax_tokens: 10\n"));
        let worker = worker(
            backend,
            Arc::new(EvidencePool::new()),
            Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default())),
        );
        let result = worker.write(&section("2.1", 0)).await.result;
        assert_eq!(result.status, SectionStatus::Failed);
    }

    #[tokio::test]
    async fn failed_repair_inserts_pending_placeholder() {
        let backend = Arc::new(MockBackend::new("text").failing_on(&["-2.2"]));
        let worker = worker(
            backend.clone(),
            Arc::new(EvidencePool::new()),
            Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default())),
        );
        let result = worker.repair(&section("2.2", 1)).await.result;
        assert_eq!(result.status, SectionStatus::Pending);
        assert!(result.note.unwrap().contains("repair attempt failed"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_staggered_by_index() {
        let mut config = writing_config();
        config.stagger_ms = 250;
        let worker = SectionWorker::new(
            Arc::new(MockBackend::new("text")),
            Arc::new(AdaptiveLimiter::new("gen", &LimiterConfig::default())),
            Arc::new(EvidencePool::new()),
            config,
            context(2),
        )
        .unwrap();

        let before = tokio::time::Instant::now();
        worker.write(&section("2.3", 2)).await;
        assert!(before.elapsed() >= Duration::from_millis(500));
    }
}
