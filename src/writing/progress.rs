//! Completion percentage and ETA for a chapter's sections.

use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    /// Mean section duration times sections remaining
    pub eta_secs: Option<f64>,
}

#[derive(Default)]
struct Totals {
    completed: usize,
    elapsed: Duration,
}

pub struct ProgressTracker {
    total: usize,
    totals: Mutex<Totals>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Count one finished section that took `duration`.
    pub fn record(&self, duration: Duration) -> ProgressSnapshot {
        let mut totals = self.totals.lock();
        totals.completed += 1;
        totals.elapsed += duration;
        self.snapshot_of(&totals)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_of(&self.totals.lock())
    }

    fn snapshot_of(&self, totals: &Totals) -> ProgressSnapshot {
        let completed = totals.completed.min(self.total);
        let percent = if self.total == 0 {
            100.0
        } else {
            (completed as f64 / self.total as f64 * 1000.0).round() / 10.0
        };
        let eta_secs = (totals.completed > 0).then(|| {
            let mean = totals.elapsed.as_secs_f64() / totals.completed as f64;
            mean * (self.total - completed) as f64
        });
        ProgressSnapshot {
            completed,
            total: self.total,
            percent,
            eta_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_is_mean_duration_times_remaining() {
        let tracker = ProgressTracker::new(4);
        assert_eq!(tracker.snapshot().eta_secs, None);

        tracker.record(Duration::from_secs(2));
        let snap = tracker.record(Duration::from_secs(4));
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.percent, 50.0);
        assert_eq!(snap.eta_secs, Some(6.0));
    }

    #[test]
    fn percent_rounds_to_one_decimal() {
        let tracker = ProgressTracker::new(3);
        let snap = tracker.record(Duration::from_millis(10));
        assert_eq!(snap.percent, 33.3);
        tracker.record(Duration::from_millis(10));
        let done = tracker.record(Duration::from_millis(10));
        assert_eq!(done.percent, 100.0);
        assert_eq!(done.eta_secs, Some(0.0));
    }
}
