//! Error types for the Folio chapter generation orchestrator.

use thiserror::Error;

/// Orchestrator errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider call timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Search call timed out after {0}s")]
    SearchTimeout(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid section id '{0}': expected dotted numeric key such as 2.3.1")]
    InvalidSectionId(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Chapter {chapter} depends on unknown chapter {dependency}")]
    UnknownDependency { chapter: u32, dependency: u32 },

    #[error("Chapter dependency cycle involving chapters {0:?}")]
    DependencyCycle(Vec<u32>),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Persistence failed for chapter {chapter}: {message}")]
    PersistenceFailed { chapter: u32, message: String },

    #[error("Quality gate rejected chapters {0:?}")]
    QualityGateFailed(Vec<u32>),

    #[error("Progress dispatch failed: {0}")]
    ProgressError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ApiError {
    /// Whether a backend error is worth retrying. Terminal errors are still
    /// retried when the writing policy says so.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::ConfigError(_) => false,
            ApiError::ProviderAuthFailed(_) => false,
            ApiError::InvalidSectionId(_) => false,
            ApiError::InvalidPlan(_) => false,
            ApiError::ProviderRateLimit(_) => true,
            ApiError::ProviderRequestFailed(_) => true,
            ApiError::ProviderTimeout(_) => true,
            ApiError::SearchTimeout(_) => true,
            _ => true,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<toml::de::Error> for ApiError {
    fn from(err: toml::de::Error) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
