//! Propagates the resolution of a prerequisite to the tasks it blocks.
//!
//! Every dependent is updated in its own unit: lock, re-read, apply, write
//! back. The edge on the prerequisite is cleared only after every unit
//! succeeded, so a failed cascade can be retried as a whole; dependents that
//! were already updated report `AlreadySatisfied` the second time.
//!
//! A cascade holds the prerequisite's lock from `find_blocked_by` to the
//! edge clear, and takes each dependent's lock inside that. Locks are always
//! taken prerequisite first, so the acyclic graph rules out lock cycles.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CascadeReport, PrerequisiteResolution};
use crate::domain::ports::TaskRepository;
use crate::services::fan_out::FanOut;
use crate::services::task_locks::TaskLocks;

pub struct CascadePropagator<R: TaskRepository> {
    repository: Arc<R>,
    locks: TaskLocks,
    fan_out: FanOut,
}

impl<R: TaskRepository> Clone for CascadePropagator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            locks: self.locks.clone(),
            fan_out: self.fan_out,
        }
    }
}

impl<R: TaskRepository> CascadePropagator<R> {
    pub fn new(repository: Arc<R>, locks: TaskLocks, fan_out: FanOut) -> Self {
        Self {
            repository,
            locks,
            fan_out,
        }
    }

    /// Apply the removal or completion of `prerequisite_id` to every task it
    /// blocks, then clear its edges.
    ///
    /// Returns `PartialCascadeFailure` naming the dependents that could not
    /// be updated; in that case no edge is cleared.
    #[instrument(skip(self), err)]
    pub async fn propagate_removal(&self, prerequisite_id: Uuid) -> DomainResult<CascadeReport> {
        let _guard = self.locks.lock(prerequisite_id).await;
        self.propagate_locked(prerequisite_id).await
    }

    /// [`Self::propagate_removal`] for a caller already holding the lock on
    /// `prerequisite_id`.
    pub(crate) async fn propagate_locked(&self, prerequisite_id: Uuid) -> DomainResult<CascadeReport> {
        let dependents = self.repository.find_blocked_by(prerequisite_id).await?;
        let mut report = CascadeReport::new(prerequisite_id);

        if dependents.is_empty() {
            debug!(%prerequisite_id, "no dependents to update");
        }

        let units: Vec<(Uuid, Uuid)> = dependents.iter().map(|t| (t.id, t.id)).collect();
        let joined = self
            .fan_out
            .run(units, |task_id| self.apply_to_dependent(task_id, prerequisite_id))
            .await;

        let mut failed = Vec::new();
        for (task_id, outcome) in joined.completed {
            match outcome {
                Ok(Some(PrerequisiteResolution::Unlocked)) => report.unlocked.push(task_id),
                Ok(Some(PrerequisiteResolution::StillBlocked(remaining))) => {
                    debug!(%task_id, remaining, "dependent still blocked");
                    report.still_blocked.push(task_id);
                }
                Ok(Some(PrerequisiteResolution::AlreadySatisfied)) => {
                    report.already_satisfied.push(task_id);
                }
                Ok(None) => debug!(%task_id, "dependent deleted during cascade"),
                Err(err @ DomainError::InvariantViolation { .. }) => {
                    error!(%task_id, %prerequisite_id, error = %err, "invariant violation in cascade");
                    failed.push(task_id);
                }
                Err(err) => {
                    warn!(%task_id, %prerequisite_id, error = %err, "failed to update dependent");
                    failed.push(task_id);
                }
            }
        }

        if !joined.unfinished.is_empty() {
            warn!(
                %prerequisite_id,
                unfinished = joined.unfinished.len(),
                deadline_ms = self.fan_out.deadline_ms(),
                "cascade join deadline elapsed"
            );
            failed.extend(joined.unfinished);
        }

        if !failed.is_empty() {
            return Err(DomainError::PartialCascadeFailure {
                prerequisite_id,
                failed,
            });
        }

        report.edges_cleared = self.repository.clear_prerequisite_edge(prerequisite_id).await?;

        info!(
            %prerequisite_id,
            unlocked = report.unlocked.len(),
            still_blocked = report.still_blocked.len(),
            already_satisfied = report.already_satisfied.len(),
            edges_cleared = report.edges_cleared,
            "cascade complete"
        );

        Ok(report)
    }

    /// Resolve the edges of a task just written whose prerequisites may have
    /// completed or been deleted after they were checked. A cascade that ran
    /// in between could not see the new task, so its edge is applied here.
    ///
    /// Returns true if any edge was resolved. A failure is logged and leaves
    /// the edge for a later `propagate_removal`.
    pub(crate) async fn settle_new_dependent(&self, task_id: Uuid, prerequisites: &[Uuid]) -> bool {
        let mut settled = false;
        for &prerequisite_id in prerequisites {
            let _guard = self.locks.lock(prerequisite_id).await;
            let result = async {
                let resolved = self
                    .repository
                    .get(prerequisite_id)
                    .await?
                    .map_or(true, |p| p.is_terminal());
                if !resolved {
                    return Ok(false);
                }
                self.apply_to_dependent(task_id, prerequisite_id).await?;
                self.repository.clear_prerequisite_edge(prerequisite_id).await?;
                Ok::<_, DomainError>(true)
            }
            .await;

            match result {
                Ok(true) => {
                    debug!(%task_id, %prerequisite_id, "prerequisite resolved while task was created");
                    settled = true;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(%task_id, %prerequisite_id, error = %err, "could not settle new task edge");
                }
            }
        }
        settled
    }

    /// One unit of the cascade. `None` when the dependent no longer exists.
    async fn apply_to_dependent(
        &self,
        task_id: Uuid,
        prerequisite_id: Uuid,
    ) -> DomainResult<Option<PrerequisiteResolution>> {
        let _guard = self.locks.lock(task_id).await;

        let Some(mut task) = self.repository.get(task_id).await? else {
            return Ok(None);
        };
        // Another writer applied and cleared this edge after it was found.
        if !task.depends_on(prerequisite_id) {
            return Ok(Some(PrerequisiteResolution::AlreadySatisfied));
        }

        let outcome = task.resolve_prerequisite(prerequisite_id)?;
        if outcome.changed() {
            self.repository.update(&task).await?;
        }
        if outcome == PrerequisiteResolution::Unlocked {
            info!(%task_id, %prerequisite_id, "task unlocked");
        }

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTaskRepository;
    use crate::domain::models::Task;

    async fn store_with_dependents(n: usize) -> (Arc<InMemoryTaskRepository>, Task, Vec<Task>) {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let p = Task::new(1, Uuid::new_v4());
        repo.create(&p).await.unwrap();

        let mut dependents = Vec::new();
        for _ in 0..n {
            let mut t = Task::new(2, Uuid::new_v4());
            t.set_prerequisites(vec![p.id]).unwrap();
            repo.create(&t).await.unwrap();
            dependents.push(t);
        }
        (repo, p, dependents)
    }

    fn propagator(repo: &Arc<InMemoryTaskRepository>) -> CascadePropagator<InMemoryTaskRepository> {
        CascadePropagator::new(Arc::clone(repo), TaskLocks::new(), FanOut::default())
    }

    #[tokio::test]
    async fn test_cascade_unlocks_single_prerequisite_dependents() {
        let (repo, p, dependents) = store_with_dependents(3).await;
        let report = propagator(&repo).propagate_removal(p.id).await.unwrap();

        assert_eq!(report.unlocked.len(), 3);
        assert_eq!(report.edges_cleared, 3);
        for t in dependents {
            let stored = repo.get(t.id).await.unwrap().unwrap();
            assert!(stored.is_allowed());
            assert_eq!(stored.num_of_prerequisite(), 0);
            stored.check_invariants().unwrap();
        }
    }

    #[tokio::test]
    async fn test_cascade_with_no_dependents_is_noop() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let report = propagator(&repo).propagate_removal(Uuid::new_v4()).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(report.edges_cleared, 0);
    }

    #[tokio::test]
    async fn test_second_cascade_after_clear_is_noop() {
        let (repo, p, _) = store_with_dependents(2).await;
        let cascade = propagator(&repo);
        cascade.propagate_removal(p.id).await.unwrap();

        let again = cascade.propagate_removal(p.id).await.unwrap();
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_dependent_with_two_prerequisites_stays_blocked() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let a = Task::new(1, Uuid::new_v4());
        let b = Task::new(1, Uuid::new_v4());
        repo.create(&a).await.unwrap();
        repo.create(&b).await.unwrap();

        let mut t = Task::new(1, Uuid::new_v4());
        t.set_prerequisites(vec![a.id, b.id]).unwrap();
        repo.create(&t).await.unwrap();

        let cascade = propagator(&repo);
        let first = cascade.propagate_removal(a.id).await.unwrap();
        assert_eq!(first.still_blocked, vec![t.id]);
        assert!(!repo.get(t.id).await.unwrap().unwrap().is_allowed());

        let second = cascade.propagate_removal(b.id).await.unwrap();
        assert_eq!(second.unlocked, vec![t.id]);
        assert!(repo.get(t.id).await.unwrap().unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_cascade_waits_for_prerequisite_lock() {
        let (repo, p, dependents) = store_with_dependents(1).await;
        let locks = TaskLocks::new();
        let cascade = CascadePropagator::new(Arc::clone(&repo), locks.clone(), FanOut::default());

        let held = locks.lock(p.id).await;
        let prerequisite_id = p.id;
        let pending = tokio::spawn(async move { cascade.propagate_removal(prerequisite_id).await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        assert!(!repo.get(dependents[0].id).await.unwrap().unwrap().is_allowed());

        drop(held);
        let report = pending.await.unwrap().unwrap();
        assert_eq!(report.unlocked, vec![dependents[0].id]);
    }

    #[tokio::test]
    async fn test_settle_resolves_edge_to_vanished_prerequisite() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let gone = Uuid::new_v4();
        let mut t = Task::new(1, Uuid::new_v4());
        t.set_prerequisites(vec![gone]).unwrap();
        repo.create(&t).await.unwrap();

        assert!(propagator(&repo).settle_new_dependent(t.id, &[gone]).await);
        let stored = repo.get(t.id).await.unwrap().unwrap();
        assert!(stored.is_allowed());
        assert!(stored.prerequisites().is_empty());
        stored.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_settle_leaves_open_prerequisite_alone() {
        let (repo, p, dependents) = store_with_dependents(1).await;
        assert!(!propagator(&repo).settle_new_dependent(dependents[0].id, &[p.id]).await);
        assert!(!repo.get(dependents[0].id).await.unwrap().unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_dependent_read_after_clear_counts_as_satisfied() {
        let (repo, p, dependents) = store_with_dependents(1).await;
        let cascade = propagator(&repo);
        cascade.propagate_removal(p.id).await.unwrap();

        let outcome = cascade.apply_to_dependent(dependents[0].id, p.id).await.unwrap();
        assert_eq!(outcome, Some(PrerequisiteResolution::AlreadySatisfied));
        assert_eq!(repo.get(dependents[0].id).await.unwrap().unwrap().version, 2);
    }
}
