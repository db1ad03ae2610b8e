use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assigned_user_id: Option<Uuid>,
    pub requirement_id: Option<i64>,
    pub status: Option<TaskStatus>,
    /// `Some(true)` lists only tasks that are eligible to execute.
    pub allowed: Option<bool>,
    /// Tasks this user assigned or had forwarded for review.
    pub reviewer_id: Option<Uuid>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    /// The tasks a user can work on right now.
    pub fn workable_for(user_id: Uuid) -> Self {
        Self {
            assigned_user_id: Some(user_id),
            allowed: Some(true),
            ..Default::default()
        }
    }

    /// The submitted tasks waiting on a review from this user.
    pub fn to_review_by(user_id: Uuid) -> Self {
        Self {
            status: Some(TaskStatus::InReview),
            reviewer_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.assigned_user_id.map_or(true, |u| task.assigned_user_id == u)
            && self.requirement_id.map_or(true, |r| task.requirement_id == r)
            && self.status.map_or(true, |s| task.status == s)
            && self.allowed.map_or(true, |a| task.is_allowed() == a)
            && self.reviewer_id.map_or(true, |r| {
                task.assigner_id == Some(r) || task.reviewers.contains(&r)
            })
    }
}

/// Repository interface for Task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Persist a new task together with its prerequisite edges, atomically.
    async fn create(&self, task: &Task) -> DomainResult<()>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Write back a task read earlier.
    ///
    /// Fails with `ConcurrencyConflict` if the stored version is no longer
    /// `task.version`. Returns the new version.
    async fn update(&self, task: &Task) -> DomainResult<u64>;

    /// Delete a task and its outgoing edges.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List tasks with optional filters, newest first.
    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;

    /// Every task that has `prerequisite_id` among its prerequisites.
    async fn find_blocked_by(&self, prerequisite_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Remove the edges on `prerequisite_id` whose resolution has been
    /// applied to the dependent. Returns the number of edges removed.
    async fn clear_prerequisite_edge(&self, prerequisite_id: Uuid) -> DomainResult<u64>;

    /// Withdraw every review forwarded to `reviewer_id`. Returns the number
    /// of tasks affected.
    async fn remove_reviewer(&self, reviewer_id: Uuid) -> DomainResult<u64>;
}
