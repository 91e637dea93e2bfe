//! Event schema for progress telemetry.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub ts: String,
    pub session: String,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

/// An event before the ingestor has assigned its sequence number.
#[derive(Debug, Clone)]
pub struct ProgressEnvelope {
    pub ts: String,
    pub session: String,
    pub event_type: String,
    pub data: Value,
}

impl ProgressEnvelope {
    pub fn with_now(
        session: impl Into<String>,
        event_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            session: session.into(),
            event_type: event_type.into(),
            data,
        }
    }
}

impl ProgressEvent {
    pub fn from_envelope(envelope: ProgressEnvelope, seq: u64) -> Self {
        Self {
            ts: envelope.ts,
            session: envelope.session,
            seq,
            event_type: envelope.event_type,
            data: envelope.data,
        }
    }
}

/// Payload for `section_completed`, `section_failed` and `section_repaired`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionProgressData {
    pub chapter: u32,
    pub section_id: String,
    pub status: String,
    pub word_count: usize,
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterStateData {
    pub chapter: u32,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSummaryData {
    pub chapter: u32,
    pub queries: usize,
    pub failed_queries: usize,
    pub raw_results: usize,
    pub accepted: usize,
    pub relaxed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummaryData {
    pub chapter: u32,
    pub score: f64,
    pub critical_issues: usize,
    pub warnings: usize,
    pub removed_citations: usize,
    pub auditors_failed: Vec<String>,
}
