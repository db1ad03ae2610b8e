//! Task service implementing the task lifecycle on top of the engine.
//!
//! Completing or deleting a task resolves it for its dependents, so both
//! trigger a cascade. Completion is retry-safe: completing an already
//! completed task re-runs only the cascade.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BatchReport, CascadeReport, EngineConfig, FanOutReport, Reassignment, Task, TaskSpec,
    TaskStatus,
};
use crate::domain::ports::{RequirementRepository, TaskFilter, TaskRepository};
use crate::services::batch_orchestrator::BatchOrchestrator;
use crate::services::cascade_propagator::CascadePropagator;
use crate::services::fan_out::FanOut;
use crate::services::reassignment::ReassignmentService;
use crate::services::task_locks::TaskLocks;

/// A single task whose prerequisites are already durable ids.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub requirement_id: i64,
    pub assigned_user_id: Uuid,
    pub assigner_id: Option<Uuid>,
    pub note: String,
    pub prerequisites: Vec<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
}

pub struct TaskService<R: TaskRepository, Q: RequirementRepository> {
    tasks: Arc<R>,
    requirements: Arc<Q>,
    locks: TaskLocks,
    cascade: CascadePropagator<R>,
    batches: BatchOrchestrator<R>,
    reassignment: ReassignmentService<R>,
}

impl<R: TaskRepository, Q: RequirementRepository> TaskService<R, Q> {
    pub fn new(tasks: Arc<R>, requirements: Arc<Q>, config: &EngineConfig) -> Self {
        let locks = TaskLocks::new();
        let fan_out = FanOut::from_config(config);
        Self {
            cascade: CascadePropagator::new(Arc::clone(&tasks), locks.clone(), fan_out),
            batches: BatchOrchestrator::new(Arc::clone(&tasks), locks.clone(), fan_out),
            reassignment: ReassignmentService::new(Arc::clone(&tasks), locks.clone(), fan_out),
            tasks,
            requirements,
            locks,
        }
    }

    /// Create one task. Every prerequisite must exist; completed ones are
    /// already resolved and are not recorded.
    ///
    /// A prerequisite completed or deleted while the task is being written
    /// is applied before returning, so the task is never left blocked on it.
    #[instrument(skip(self, new_task), fields(requirement_id = new_task.requirement_id), err)]
    pub async fn create_task(&self, new_task: NewTask) -> DomainResult<Task> {
        let mut prerequisites = Vec::with_capacity(new_task.prerequisites.len());
        for id in new_task.prerequisites {
            let existing = self.tasks.get(id).await?.ok_or(DomainError::TaskNotFound(id))?;
            if !existing.is_terminal() {
                prerequisites.push(id);
            }
        }

        let mut task = Task::new(new_task.requirement_id, new_task.assigned_user_id)
            .with_note(new_task.note);
        task.assigner_id = new_task.assigner_id;
        task.deadline = new_task.deadline;
        task.set_prerequisites(prerequisites)?;
        task.validate().map_err(DomainError::ValidationFailed)?;

        self.tasks.create(&task).await?;
        if self.cascade.settle_new_dependent(task.id, task.prerequisites()).await {
            task = self.tasks.get(task.id).await?.ok_or(DomainError::TaskNotFound(task.id))?;
        }
        info!(task_id = %task.id, blocked_by = task.num_of_prerequisite(), "task created");
        Ok(task)
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: Uuid) -> DomainResult<Option<Task>> {
        self.tasks.get(id).await
    }

    /// List tasks with optional filters.
    pub async fn list_tasks(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        self.tasks.list(filter).await
    }

    /// Submitted tasks that `reviewer_id` assigned or had forwarded.
    pub async fn tasks_to_review(&self, reviewer_id: Uuid) -> DomainResult<Vec<Task>> {
        self.tasks.list(TaskFilter::to_review_by(reviewer_id)).await
    }

    /// Tasks assigned to `user_id` that can be worked on now.
    pub async fn workable_tasks(&self, user_id: Uuid) -> DomainResult<Vec<Task>> {
        self.tasks.list(TaskFilter::workable_for(user_id)).await
    }

    #[instrument(skip(self), err)]
    pub async fn submit_for_review(&self, id: Uuid) -> DomainResult<Task> {
        self.transition(id, TaskStatus::InReview).await
    }

    #[instrument(skip(self), err)]
    pub async fn reject_task(&self, id: Uuid) -> DomainResult<Task> {
        self.transition(id, TaskStatus::Rejected).await
    }

    /// Complete a task, mark its requirement fulfilled and unlock dependents.
    #[instrument(skip(self), err)]
    pub async fn complete_task(&self, id: Uuid) -> DomainResult<(Task, CascadeReport)> {
        let task = {
            let _guard = self.locks.lock(id).await;
            let mut task = self.tasks.get(id).await?.ok_or(DomainError::TaskNotFound(id))?;
            if !task.is_terminal() {
                task.transition_to(TaskStatus::Completed)?;
                task.version = self.tasks.update(&task).await?;
                info!(task_id = %id, "task completed");
            }
            task
        };

        self.fulfill_requirement(task.requirement_id).await;
        let report = self.cascade.propagate_removal(id).await?;
        Ok((task, report))
    }

    /// Delete a task. Its dependents are released first; the task row is
    /// removed only if that cascade succeeded.
    #[instrument(skip(self), err)]
    pub async fn delete_task(&self, id: Uuid) -> DomainResult<CascadeReport> {
        let _guard = self.locks.lock(id).await;
        if self.tasks.get(id).await?.is_none() {
            return Err(DomainError::TaskNotFound(id));
        }

        let report = self.cascade.propagate_locked(id).await?;
        self.tasks.delete(id).await?;
        info!(task_id = %id, released = report.affected(), "task deleted");
        Ok(report)
    }

    /// Run (or retry) the cascade for a prerequisite.
    pub async fn propagate_removal(&self, prerequisite_id: Uuid) -> DomainResult<CascadeReport> {
        self.cascade.propagate_removal(prerequisite_id).await
    }

    pub async fn create_batch(&self, specs: Vec<TaskSpec>) -> DomainResult<BatchReport> {
        self.batches.create_batch(specs).await
    }

    pub async fn reassign(&self, reassignments: Vec<Reassignment>) -> FanOutReport {
        self.reassignment.reassign_users(reassignments).await
    }

    pub async fn forward_review(&self, task_id: Uuid, reviewers: Vec<Uuid>) -> FanOutReport {
        self.reassignment.forward_review(task_id, reviewers).await
    }

    /// Withdraw every review forwarded to `reviewer_id`.
    #[instrument(skip(self), err)]
    pub async fn remove_reviewer(&self, reviewer_id: Uuid) -> DomainResult<u64> {
        let withdrawn = self.tasks.remove_reviewer(reviewer_id).await?;
        info!(%reviewer_id, withdrawn, "reviewer removed");
        Ok(withdrawn)
    }

    async fn transition(&self, id: Uuid, status: TaskStatus) -> DomainResult<Task> {
        let _guard = self.locks.lock(id).await;
        let mut task = self.tasks.get(id).await?.ok_or(DomainError::TaskNotFound(id))?;
        task.transition_to(status)?;
        task.version = self.tasks.update(&task).await?;
        info!(task_id = %id, status = %status, "task status changed");
        Ok(task)
    }

    async fn fulfill_requirement(&self, requirement_id: i64) {
        let result = async {
            let mut requirement = self
                .requirements
                .get(requirement_id)
                .await?
                .ok_or(DomainError::RequirementNotFound(requirement_id))?;
            if requirement.mark_fulfilled() {
                self.requirements.update(&requirement).await?;
            }
            Ok::<_, DomainError>(())
        }
        .await;

        if let Err(err) = result {
            warn!(requirement_id, error = %err, "could not mark requirement fulfilled");
        }
    }
}
