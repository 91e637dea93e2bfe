//! Per-writer-group concurrency budget.

use crate::error::ApiError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One semaphore per logical writer group, created on first use, so a single
/// group cannot monopolize the shared limiter.
pub struct WriterGroups {
    per_group: usize,
    semaphores: RwLock<HashMap<String, Arc<Semaphore>>>,
}

impl WriterGroups {
    pub fn new(per_group: usize) -> Self {
        Self {
            per_group: per_group.max(1),
            semaphores: RwLock::new(HashMap::new()),
        }
    }

    fn semaphore(&self, group: &str) -> Arc<Semaphore> {
        if let Some(existing) = self.semaphores.read().get(group) {
            return Arc::clone(existing);
        }
        let mut semaphores = self.semaphores.write();
        Arc::clone(
            semaphores
                .entry(group.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_group))),
        )
    }

    pub async fn acquire(&self, group: &str) -> Result<OwnedSemaphorePermit, ApiError> {
        self.semaphore(group)
            .acquire_owned()
            .await
            .map_err(|_| ApiError::GenerationFailed(format!("writer group '{}' closed", group)))
    }

    pub fn per_group(&self) -> usize {
        self.per_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn group_concurrency_is_bounded() {
        let groups = Arc::new(WriterGroups::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let groups = Arc::clone(&groups);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = groups.acquire("writers").await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn groups_do_not_share_budget() {
        let groups = WriterGroups::new(1);
        let _a = groups.acquire("a").await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(50), groups.acquire("b")).await;
        assert!(b.is_ok());
    }
}
