//! Event ingestion: sequence assignment and bounded-time dispatch to a sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::telemetry::events::ProgressEvent;
use crate::telemetry::routing::bus::{BusMessage, ProgressBus};
use crate::telemetry::sinks::ProgressSink;

static RUNS_STARTED: AtomicU64 = AtomicU64::new(0);

/// `folio-<utc start>-<pid>-<n>`, where `n` counts runtimes started by this process.
fn run_session_id() -> String {
    let n = RUNS_STARTED.fetch_add(1, Ordering::Relaxed) + 1;
    format!(
        "folio-{}-{}-{}",
        Utc::now().format("%Y%m%dT%H%M%S"),
        std::process::id(),
        n
    )
}

/// Owns the dispatcher task for one run session.
pub struct ProgressRuntime {
    bus: ProgressBus,
    handle: JoinHandle<u64>,
}

impl ProgressRuntime {
    /// Start a dispatcher on the current tokio runtime.
    pub fn start(sink: Arc<dyn ProgressSink>, publish_timeout: Duration) -> Self {
        let (bus, receiver) = ProgressBus::new_pair(run_session_id());
        let handle = tokio::spawn(dispatch_loop(receiver, sink, publish_timeout));
        Self { bus, handle }
    }

    pub fn bus(&self) -> ProgressBus {
        self.bus.clone()
    }

    pub fn session_id(&self) -> &str {
        self.bus.session_id()
    }

    /// Drain pending events. Outstanding bus clones keep the dispatcher alive,
    /// so this flushes rather than joins when any remain.
    pub async fn shutdown(self) {
        self.bus.flush().await;
        let ProgressRuntime { bus, handle } = self;
        drop(bus);
        match tokio::time::timeout(Duration::from_millis(100), handle).await {
            Ok(Ok(dispatched)) => debug!(dispatched, "progress dispatcher stopped"),
            Ok(Err(err)) => warn!(error = %err, "progress dispatcher panicked"),
            Err(_) => debug!("progress dispatcher still referenced, detaching"),
        }
    }
}

async fn dispatch_loop(
    mut receiver: UnboundedReceiver<BusMessage>,
    sink: Arc<dyn ProgressSink>,
    publish_timeout: Duration,
) -> u64 {
    let mut next_seq = 1u64;
    while let Some(message) = receiver.recv().await {
        match message {
            BusMessage::Event(envelope) => {
                let event = ProgressEvent::from_envelope(envelope, next_seq);
                next_seq += 1;
                match tokio::time::timeout(publish_timeout, sink.publish(&event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(
                        event_type = %event.event_type,
                        seq = event.seq,
                        error = %err,
                        "progress sink rejected event"
                    ),
                    Err(_) => warn!(
                        event_type = %event.event_type,
                        seq = event.seq,
                        timeout_ms = publish_timeout.as_millis(),
                        "progress sink timed out, event dropped"
                    ),
                }
            }
            BusMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    next_seq - 1
}
