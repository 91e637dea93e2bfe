//! Progress sinks: where dispatched events end up.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::error::ApiError;
use crate::telemetry::events::ProgressEvent;

/// Receives progress events from the dispatcher. Calls are bounded by the
/// dispatcher timeout, so a slow sink loses events rather than stalling work.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, event: &ProgressEvent) -> Result<(), ApiError>;
}

/// Logs every event through `tracing`.
pub struct TracingSink;

#[async_trait]
impl ProgressSink for TracingSink {
    async fn publish(&self, event: &ProgressEvent) -> Result<(), ApiError> {
        info!(
            target: "folio::progress",
            session = %event.session,
            seq = event.seq,
            event_type = %event.event_type,
            data = %event.data,
            "progress"
        );
        Ok(())
    }
}

/// Appends events as JSON lines to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProgressSink for JsonLinesSink {
    async fn publish(&self, event: &ProgressEvent) -> Result<(), ApiError> {
        let line = serde_json::to_string(event)?;
        let mut file = self.file.lock();
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Keeps events in memory, in dispatch order.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProgressSink for MemorySink {
    async fn publish(&self, event: &ProgressEvent) -> Result<(), ApiError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
