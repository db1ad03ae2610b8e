//! Batch task assignment.
//!
//! Identifier assignment is sequential and finishes before any task is
//! resolved, so every unit of the concurrent persist phase sees the complete
//! label map. Units succeed or fail independently; a failure never rolls
//! back a sibling.
//!
//! An external prerequisite that completes or is deleted while its dependent
//! is being written is applied to the dependent right after the write.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AcceptedTask, BatchReport, LabelMap, Task, TaskFailure, TaskSpec};
use crate::domain::ports::TaskRepository;
use crate::services::cascade_propagator::CascadePropagator;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::fan_out::FanOut;
use crate::services::task_locks::TaskLocks;

/// A task with its durable id assigned, waiting for resolution.
struct PendingTask {
    task: Task,
    labels: Vec<String>,
}

pub struct BatchOrchestrator<R: TaskRepository> {
    repository: Arc<R>,
    resolver: DependencyResolver,
    cascade: CascadePropagator<R>,
    fan_out: FanOut,
}

impl<R: TaskRepository> BatchOrchestrator<R> {
    pub fn new(repository: Arc<R>, locks: TaskLocks, fan_out: FanOut) -> Self {
        Self {
            cascade: CascadePropagator::new(Arc::clone(&repository), locks, fan_out),
            repository,
            resolver: DependencyResolver::new(),
            fan_out,
        }
    }

    /// Create every task of a batch and report per-task outcomes.
    ///
    /// Returns an error only when the batch as a whole is rejected
    /// (duplicate labels or a prerequisite cycle); nothing is created then.
    #[instrument(skip(self, specs), fields(batch_size = specs.len()), err)]
    pub async fn create_batch(&self, specs: Vec<TaskSpec>) -> DomainResult<BatchReport> {
        self.resolver.validate_batch(&specs)?;

        // Phase 1: durable ids and the label map
        let mut map = LabelMap::new();
        let mut units = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut task = Task::new(spec.requirement_id, spec.assigned_user_id).with_note(spec.note);
            task.assigner_id = spec.assigner_id;
            task.deadline = spec.deadline;

            map.insert(spec.label.clone(), task.id);
            units.push(((spec.label, task.id), PendingTask {
                task,
                labels: spec.prerequisites,
            }));
        }
        debug!(labels = map.len(), "assigned durable ids");

        // Phase 2: resolve and persist concurrently
        let joined = self
            .fan_out
            .run(units, |pending| self.persist(pending, &map))
            .await;

        let mut report = BatchReport::default();
        let mut persisted: Vec<Task> = Vec::new();
        for ((label, task_id), outcome) in joined.completed {
            match outcome {
                Ok(task) => {
                    report.accepted.push(AcceptedTask {
                        label,
                        task_id,
                        allowed: task.is_allowed(),
                    });
                    persisted.push(task);
                }
                Err(err) => {
                    warn!(%label, %task_id, error = %err, "batch task rejected");
                    report.failures.push(TaskFailure::for_label(label, task_id, err));
                }
            }
        }
        for (label, task_id) in joined.unfinished {
            report.failures.push(TaskFailure::for_label(
                label,
                task_id,
                DomainError::JoinTimeout(self.fan_out.deadline_ms()),
            ));
        }

        report.orphaned = orphaned_tasks(&persisted, &report.failures);
        if !report.orphaned.is_empty() {
            warn!(
                orphaned = report.orphaned.len(),
                "accepted tasks depend on batch tasks that were not created"
            );
        }

        info!(
            accepted = report.accepted_count(),
            failed = report.failures.len(),
            "batch assignment finished"
        );
        Ok(report)
    }

    /// One unit of phase 2.
    async fn persist(&self, pending: PendingTask, map: &LabelMap) -> DomainResult<Task> {
        let PendingTask { mut task, labels } = pending;
        let resolved = self.resolver.resolve(&labels, map)?;

        let mut prerequisites = resolved.in_batch;
        let mut external = Vec::with_capacity(resolved.external.len());
        for external_id in resolved.external {
            let existing = self
                .repository
                .get(external_id)
                .await?
                .ok_or(DomainError::TaskNotFound(external_id))?;

            if existing.is_terminal() {
                debug!(task_id = %task.id, prerequisite_id = %external_id, "prerequisite already completed");
            } else {
                prerequisites.push(external_id);
                external.push(external_id);
            }
        }

        task.set_prerequisites(prerequisites)?;
        task.validate().map_err(DomainError::ValidationFailed)?;
        self.repository.create(&task).await?;

        // In-batch ids are not visible to anyone until the batch returns.
        if self.cascade.settle_new_dependent(task.id, &external).await {
            task = self
                .repository
                .get(task.id)
                .await?
                .ok_or(DomainError::TaskNotFound(task.id))?;
        }
        Ok(task)
    }
}

/// Accepted tasks with an in-batch prerequisite that failed to persist.
fn orphaned_tasks(persisted: &[Task], failures: &[TaskFailure]) -> Vec<Uuid> {
    let failed: HashSet<Uuid> = failures.iter().filter_map(|f| f.task_id).collect();
    persisted
        .iter()
        .filter(|t| t.prerequisites().iter().any(|p| failed.contains(p)))
        .map(|t| t.id)
        .collect()
}
