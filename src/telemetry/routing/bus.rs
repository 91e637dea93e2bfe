//! In-process event bus for progress events. Emitting never blocks.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::telemetry::events::ProgressEnvelope;

#[derive(Debug)]
pub(crate) enum BusMessage {
    Event(ProgressEnvelope),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct ProgressBus {
    session: String,
    sender: mpsc::UnboundedSender<BusMessage>,
}

impl ProgressBus {
    pub(crate) fn new_pair(session: String) -> (Self, mpsc::UnboundedReceiver<BusMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { session, sender }, receiver)
    }

    pub fn session_id(&self) -> &str {
        &self.session
    }

    pub fn emit(&self, event_type: impl Into<String>, data: Value) -> Result<(), String> {
        let envelope = ProgressEnvelope::with_now(self.session.clone(), event_type, data);
        self.sender
            .send(BusMessage::Event(envelope))
            .map_err(|e| e.to_string())
    }

    /// Emit, logging instead of returning a failure.
    pub fn emit_best_effort(&self, event_type: &str, data: Value) {
        if let Err(err) = self.emit(event_type, data) {
            warn!(
                session_id = %self.session,
                event_type = %event_type,
                error = %err,
                "failed to emit progress event"
            );
        }
    }

    /// Wait until every event emitted before this call has been dispatched.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(BusMessage::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}
