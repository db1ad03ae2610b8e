//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use taskcascade::adapters::memory::InMemoryTaskRepository;
use taskcascade::domain::models::Task;
use taskcascade::{DomainError, DomainResult, TaskFilter, TaskRepository};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory repository whose `update` fails for selected tasks and whose
/// reads can be slowed down.
///
/// Stands in for a store that momentarily rejects writes to some rows.
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyTaskRepository {
    inner: InMemoryTaskRepository,
    failing: Mutex<HashSet<Uuid>>,
    read_delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl FlakyTaskRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_updates_for(&self, id: Uuid) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Every `get` sleeps for `delay` before reading.
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl TaskRepository for FlakyTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        self.inner.create(task).await
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(id).await
    }

    async fn update(&self, task: &Task) -> DomainResult<u64> {
        if self.failing.lock().unwrap().contains(&task.id) {
            return Err(DomainError::DatabaseError("database is locked".to_string()));
        }
        self.inner.update(task).await
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.inner.delete(id).await
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        self.inner.list(filter).await
    }

    async fn find_blocked_by(&self, prerequisite_id: Uuid) -> DomainResult<Vec<Task>> {
        self.inner.find_blocked_by(prerequisite_id).await
    }

    async fn clear_prerequisite_edge(&self, prerequisite_id: Uuid) -> DomainResult<u64> {
        self.inner.clear_prerequisite_edge(prerequisite_id).await
    }

    async fn remove_reviewer(&self, reviewer_id: Uuid) -> DomainResult<u64> {
        self.inner.remove_reviewer(reviewer_id).await
    }
}
