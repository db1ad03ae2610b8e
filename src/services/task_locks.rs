//! Per-task async locks.
//!
//! A read-modify-write of one task holds that task's lock, so two cascades
//! touching the same dependent in one process apply one after the other.
//! Across processes the store's version check takes over.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Entries are pruned once the table grows past this many idle locks.
const PRUNE_THRESHOLD: usize = 1024;

pub type TaskLockGuard = OwnedMutexGuard<()>;

#[derive(Debug, Clone, Default)]
pub struct TaskLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `task_id`.
    pub async fn lock(&self, task_id: Uuid) -> TaskLockGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > PRUNE_THRESHOLD {
                // Only the table holds an idle lock.
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }
            Arc::clone(locks.entry(task_id).or_default())
        };
        mutex.lock_owned().await
    }

    /// Number of tracked locks.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_task_is_exclusive() {
        let locks = TaskLocks::new();
        let id = Uuid::new_v4();

        let guard = locks.lock(id).await;
        let waiting = tokio::time::timeout(Duration::from_millis(20), locks.lock(id)).await;
        assert!(waiting.is_err());

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_millis(20), locks.lock(id)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_release() {
        let locks = TaskLocks::new();
        let id = Uuid::new_v4();

        let guard = locks.lock(id).await;
        let mut waiter = tokio_test::task::spawn(locks.lock(id));
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert!(waiter.is_woken());
        let _guard = tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn test_different_tasks_do_not_contend() {
        let locks = TaskLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(20), locks.lock(Uuid::new_v4())).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
