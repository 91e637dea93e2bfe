//! Configuration System
//!
//! Hierarchical configuration for the orchestrator: built-in defaults, the global
//! config file, workspace config files, then `FOLIO__*` environment variables.
//! Every knob is optional.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioConfig {
    /// Orchestrator knobs
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bounds and tuning for an adaptive concurrency limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Starting ceiling, clamped into `[hard_min, hard_max]`
    #[serde(default = "default_initial")]
    pub initial: usize,
    #[serde(default = "default_hard_min")]
    pub hard_min: usize,
    #[serde(default = "default_hard_max")]
    pub hard_max: usize,
    /// Consecutive successes needed to widen the ceiling by one
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Consecutive failures needed to narrow the ceiling by one
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_initial() -> usize {
    4
}

fn default_hard_min() -> usize {
    1
}

fn default_hard_max() -> usize {
    8
}

fn default_success_threshold() -> u32 {
    5
}

fn default_failure_threshold() -> u32 {
    2
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            initial: default_initial(),
            hard_min: default_hard_min(),
            hard_max: default_hard_max(),
            success_threshold: default_success_threshold(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl LimiterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.hard_min == 0 {
            return Err("hard_min must be at least 1".to_string());
        }
        if self.hard_min > self.hard_max {
            return Err(format!(
                "hard_min ({}) exceeds hard_max ({})",
                self.hard_min, self.hard_max
            ));
        }
        if self.success_threshold == 0 || self.failure_threshold == 0 {
            return Err("streak thresholds must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Section writing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingConfig {
    /// Concurrent sections per writer group
    #[serde(default = "default_writer_group_concurrency")]
    pub writer_group_concurrency: usize,
    /// Start delay per section index
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    /// Generation attempts per section before a failed placeholder is stored
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base retry delay, multiplied by the attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Retry errors classified as terminal too
    #[serde(default = "default_true")]
    pub retry_terminal_errors: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_writer_group_concurrency() -> usize {
    2
}

fn default_stagger_ms() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for WritingConfig {
    fn default() -> Self {
        Self {
            writer_group_concurrency: default_writer_group_concurrency(),
            stagger_ms: default_stagger_ms(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            retry_terminal_errors: default_true(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl WritingConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Evidence search and relevance filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Accepted evidence count below which filters are relaxed once
    #[serde(default = "default_min_pool_target")]
    pub min_pool_target: usize,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    /// Minimum abstract length in characters
    #[serde(default = "default_abstract_floor")]
    pub abstract_floor: usize,
    #[serde(default = "default_max_results_per_query")]
    pub max_results_per_query: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
    /// Attempts per query, timeouts included
    #[serde(default = "default_search_max_attempts")]
    pub max_attempts: u32,
    /// Base retry delay, multiplied by the attempt number
    #[serde(default = "default_search_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_relaxation_factor")]
    pub relaxation_factor: f64,
    #[serde(default = "default_recency_window_years")]
    pub recency_window_years: i32,
    #[serde(default = "default_recency_bonus")]
    pub recency_bonus: f64,
    /// Interval between background search rounds while a chapter is being written
    #[serde(default = "default_background_interval_ms")]
    pub background_interval_ms: u64,
}

fn default_min_pool_target() -> usize {
    20
}

fn default_relevance_threshold() -> f64 {
    0.15
}

fn default_abstract_floor() -> usize {
    100
}

fn default_max_results_per_query() -> usize {
    25
}

fn default_search_timeout_secs() -> u64 {
    30
}

fn default_search_max_attempts() -> u32 {
    3
}

fn default_search_retry_delay_ms() -> u64 {
    500
}

fn default_relaxation_factor() -> f64 {
    0.5
}

fn default_recency_window_years() -> i32 {
    5
}

fn default_recency_bonus() -> f64 {
    0.1
}

fn default_background_interval_ms() -> u64 {
    5_000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_pool_target: default_min_pool_target(),
            relevance_threshold: default_relevance_threshold(),
            abstract_floor: default_abstract_floor(),
            max_results_per_query: default_max_results_per_query(),
            search_timeout_secs: default_search_timeout_secs(),
            max_attempts: default_search_max_attempts(),
            retry_delay_ms: default_search_retry_delay_ms(),
            relaxation_factor: default_relaxation_factor(),
            recency_window_years: default_recency_window_years(),
            recency_bonus: default_recency_bonus(),
            background_interval_ms: default_background_interval_ms(),
        }
    }
}

impl ResearchConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Auditor thresholds and the acceptance gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_min_section_words")]
    pub min_section_words: usize,
    #[serde(default = "default_max_section_words")]
    pub max_section_words: usize,
    #[serde(default = "default_max_sentence_words")]
    pub max_sentence_words: f64,
    #[serde(default = "default_min_transition_ratio")]
    pub min_transition_ratio: f64,
    #[serde(default = "default_min_objective_coverage")]
    pub min_objective_coverage: f64,
}

fn default_min_score() -> f64 {
    60.0
}

fn default_min_section_words() -> usize {
    80
}

fn default_max_section_words() -> usize {
    2500
}

fn default_max_sentence_words() -> f64 {
    32.0
}

fn default_min_transition_ratio() -> f64 {
    0.05
}

fn default_min_objective_coverage() -> f64 {
    0.6
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            min_section_words: default_min_section_words(),
            max_section_words: default_max_section_words(),
            max_sentence_words: default_max_sentence_words(),
            min_transition_ratio: default_min_transition_ratio(),
            min_objective_coverage: default_min_objective_coverage(),
        }
    }
}

/// Orchestrator knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Limiter in front of the generation backend
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Limiter in front of the search backend
    #[serde(default)]
    pub search_limiter: LimiterConfig,
    #[serde(default)]
    pub writing: WritingConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    /// Abort the run when a chapter fails its quality gate
    #[serde(default)]
    pub strict: bool,
    /// Upper bound on a single progress sink call
    #[serde(default = "default_progress_timeout_ms")]
    pub progress_timeout_ms: u64,
}

fn default_progress_timeout_ms() -> u64 {
    2_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            limiter: LimiterConfig::default(),
            search_limiter: LimiterConfig::default(),
            writing: WritingConfig::default(),
            research: ResearchConfig::default(),
            quality: QualityConfig::default(),
            strict: false,
            progress_timeout_ms: default_progress_timeout_ms(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Limiter(String, String),
    Writing(String),
    Research(String),
    Quality(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Limiter(name, msg) => write!(f, "Limiter '{}': {}", name, msg),
            ValidationError::Writing(msg) => write!(f, "Writing: {}", msg),
            ValidationError::Research(msg) => write!(f, "Research: {}", msg),
            ValidationError::Quality(msg) => write!(f, "Quality: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl OrchestratorConfig {
    /// Validate every knob, collecting all violations
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.limiter.validate() {
            errors.push(ValidationError::Limiter("generation".to_string(), e));
        }
        if let Err(e) = self.search_limiter.validate() {
            errors.push(ValidationError::Limiter("search".to_string(), e));
        }

        if self.writing.writer_group_concurrency == 0 {
            errors.push(ValidationError::Writing(
                "writer_group_concurrency must be at least 1".to_string(),
            ));
        }
        if self.writing.max_attempts == 0 {
            errors.push(ValidationError::Writing(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.research.relaxation_factor) {
            errors.push(ValidationError::Research(format!(
                "relaxation_factor {} must be within [0, 1]",
                self.research.relaxation_factor
            )));
        }
        if self.research.max_attempts == 0 {
            errors.push(ValidationError::Research(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.research.max_results_per_query == 0 {
            errors.push(ValidationError::Research(
                "max_results_per_query must be at least 1".to_string(),
            ));
        }

        if self.quality.min_section_words > self.quality.max_section_words {
            errors.push(ValidationError::Quality(format!(
                "min_section_words ({}) exceeds max_section_words ({})",
                self.quality.min_section_words, self.quality.max_section_words
            )));
        }
        if !(0.0..=100.0).contains(&self.quality.min_score) {
            errors.push(ValidationError::Quality(format!(
                "min_score {} must be within [0, 100]",
                self.quality.min_score
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all violations into one error
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    pub fn progress_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_timeout_ms)
    }
}
