//! Adaptive concurrency limiter.
//!
//! Bounds in-flight backend calls under a ceiling that widens by one after a
//! run of successes and narrows by one after a run of failures. The ceiling
//! never leaves `[hard_min, hard_max]`. Waiters are woken in FIFO order and a
//! freed slot is handed directly to the next waiter, so a later arrival can't
//! overtake a queued caller.

use crate::config::LimiterConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::debug;

/// Snapshot of limiter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterState {
    pub current_ceiling: usize,
    pub hard_max: usize,
    pub hard_min: usize,
    pub in_flight: usize,
    pub success_streak: u32,
    pub failure_streak: u32,
}

struct Inner {
    state: LimiterState,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Inner {
    /// Hand free slots to queued waiters, skipping any that gave up.
    fn dispatch(&mut self) {
        while self.state.in_flight < self.state.current_ceiling {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            if waiter.send(()).is_ok() {
                self.state.in_flight += 1;
            }
        }
    }
}

pub struct AdaptiveLimiter {
    name: String,
    inner: Mutex<Inner>,
    success_threshold: u32,
    failure_threshold: u32,
}

impl AdaptiveLimiter {
    pub fn new(name: impl Into<String>, config: &LimiterConfig) -> Self {
        let hard_min = config.hard_min.max(1);
        let hard_max = config.hard_max.max(hard_min);
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: LimiterState {
                    current_ceiling: config.initial.clamp(hard_min, hard_max),
                    hard_max,
                    hard_min,
                    in_flight: 0,
                    success_streak: 0,
                    failure_streak: 0,
                },
                waiters: VecDeque::new(),
            }),
            success_threshold: config.success_threshold.max(1),
            failure_threshold: config.failure_threshold.max(1),
        }
    }

    /// Wait for a slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> LimiterPermit<'_> {
        let receiver = {
            let mut inner = self.inner.lock();
            if inner.waiters.is_empty() && inner.state.in_flight < inner.state.current_ceiling {
                inner.state.in_flight += 1;
                return LimiterPermit { limiter: self };
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            rx
        };

        let mut pending = PendingAcquire {
            limiter: self,
            receiver,
            granted: false,
        };
        // The sender lives in `waiters` until it is handed a slot; the limiter
        // outlives this borrow, so the channel cannot close unsent.
        let _ = (&mut pending.receiver).await;
        pending.granted = true;
        LimiterPermit { limiter: self }
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.state.in_flight = inner.state.in_flight.saturating_sub(1);
        inner.dispatch();
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state.success_streak += 1;
        inner.state.failure_streak = 0;
        if inner.state.success_streak >= self.success_threshold
            && inner.state.current_ceiling < inner.state.hard_max
        {
            inner.state.current_ceiling += 1;
            inner.state.success_streak = 0;
            debug!(
                limiter = %self.name,
                ceiling = inner.state.current_ceiling,
                "limiter widened"
            );
            inner.dispatch();
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.state.failure_streak += 1;
        inner.state.success_streak = 0;
        if inner.state.failure_streak >= self.failure_threshold
            && inner.state.current_ceiling > inner.state.hard_min
        {
            inner.state.current_ceiling -= 1;
            inner.state.failure_streak = 0;
            debug!(
                limiter = %self.name,
                ceiling = inner.state.current_ceiling,
                "limiter narrowed"
            );
        }
    }

    pub fn snapshot(&self) -> LimiterState {
        self.inner.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Held for the duration of one backend call.
pub struct LimiterPermit<'a> {
    limiter: &'a AdaptiveLimiter,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// Returns a slot that was granted after its waiter was cancelled.
struct PendingAcquire<'a> {
    limiter: &'a AdaptiveLimiter,
    receiver: oneshot::Receiver<()>,
    granted: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        self.receiver.close();
        if self.receiver.try_recv().is_ok() {
            self.limiter.release();
        }
    }
}
