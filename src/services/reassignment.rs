//! Reassignment and review forwarding.
//!
//! Same fan-out and join shape as the cascade, but each unit changes a
//! single field and there is no counter to keep consistent.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FanOutReport, Reassignment, TaskFailure};
use crate::domain::ports::TaskRepository;
use crate::services::fan_out::{FanOut, FanOutResult};
use crate::services::task_locks::TaskLocks;

pub struct ReassignmentService<R: TaskRepository> {
    repository: Arc<R>,
    locks: TaskLocks,
    fan_out: FanOut,
}

impl<R: TaskRepository> ReassignmentService<R> {
    pub fn new(repository: Arc<R>, locks: TaskLocks, fan_out: FanOut) -> Self {
        Self {
            repository,
            locks,
            fan_out,
        }
    }

    /// Hand each listed task to its new user.
    #[instrument(skip(self, reassignments), fields(count = reassignments.len()))]
    pub async fn reassign_users(&self, reassignments: Vec<Reassignment>) -> FanOutReport {
        let units: Vec<(Uuid, Reassignment)> =
            reassignments.into_iter().map(|r| (r.task_id, r)).collect();

        let joined = self
            .fan_out
            .run(units, |r| self.reassign_one(r.task_id, r.user_id))
            .await;

        let report = self.collect(joined, TaskFailure::for_task);
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            "reassignment finished"
        );
        report
    }

    /// Forward a task to each reviewer. `succeeded` lists reviewer ids.
    #[instrument(skip(self, reviewers), fields(count = reviewers.len()))]
    pub async fn forward_review(&self, task_id: Uuid, reviewers: Vec<Uuid>) -> FanOutReport {
        let units: Vec<(Uuid, Uuid)> = reviewers.into_iter().map(|r| (r, r)).collect();

        let joined = self
            .fan_out
            .run(units, |reviewer_id| self.forward_one(task_id, reviewer_id))
            .await;

        let report = self.collect(joined, |reviewer_id, error| TaskFailure {
            label: Some(reviewer_id.to_string()),
            task_id: Some(task_id),
            error,
        });
        info!(
            %task_id,
            forwarded = report.succeeded.len(),
            failed = report.failures.len(),
            "review forwarding finished"
        );
        report
    }

    fn collect(
        &self,
        joined: FanOutResult<Uuid, DomainResult<()>>,
        failure: impl Fn(Uuid, DomainError) -> TaskFailure,
    ) -> FanOutReport {
        let mut report = FanOutReport::default();
        for (key, outcome) in joined.completed {
            match outcome {
                Ok(()) => report.succeeded.push(key),
                Err(err) => {
                    warn!(%key, error = %err, "unit failed");
                    report.failures.push(failure(key, err));
                }
            }
        }
        for key in joined.unfinished {
            report
                .failures
                .push(failure(key, DomainError::JoinTimeout(self.fan_out.deadline_ms())));
        }
        report
    }

    async fn reassign_one(&self, task_id: Uuid, user_id: Uuid) -> DomainResult<()> {
        let _guard = self.locks.lock(task_id).await;
        let mut task = self
            .repository
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        if task.assigned_user_id == user_id {
            return Ok(());
        }
        task.reassign(user_id);
        self.repository.update(&task).await?;
        Ok(())
    }

    async fn forward_one(&self, task_id: Uuid, reviewer_id: Uuid) -> DomainResult<()> {
        let _guard = self.locks.lock(task_id).await;
        let mut task = self
            .repository
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        if task.forward_to(reviewer_id) {
            self.repository.update(&task).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTaskRepository;
    use crate::domain::models::Task;

    fn service(repo: &Arc<InMemoryTaskRepository>) -> ReassignmentService<InMemoryTaskRepository> {
        ReassignmentService::new(Arc::clone(repo), TaskLocks::new(), FanOut::default())
    }

    #[tokio::test]
    async fn test_reassign_users_reports_missing_tasks() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let task = Task::new(1, Uuid::new_v4());
        repo.create(&task).await.unwrap();

        let new_user = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let report = service(&repo)
            .reassign_users(vec![
                Reassignment { task_id: task.id, user_id: new_user },
                Reassignment { task_id: missing, user_id: new_user },
            ])
            .await;

        assert_eq!(report.succeeded, vec![task.id]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].task_id, Some(missing));
        assert_eq!(repo.get(task.id).await.unwrap().unwrap().assigned_user_id, new_user);
    }

    #[tokio::test]
    async fn test_forward_review_to_several_reviewers() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let task = Task::new(1, Uuid::new_v4());
        repo.create(&task).await.unwrap();

        let reviewers = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let report = service(&repo).forward_review(task.id, reviewers.clone()).await;

        assert!(report.is_complete());
        let stored = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.num_of_reviewer(), 3);
        for r in reviewers {
            assert!(stored.reviewers.contains(&r));
        }
    }
}
