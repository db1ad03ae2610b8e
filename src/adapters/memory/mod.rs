//! In-memory adapters.
//!
//! Same semantics as the SQLite adapters, including optimistic versioning
//! and satisfied-only edge clearing. Used by tests and by callers that embed
//! the engine without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Requirement, Task};
use crate::domain::ports::{RequirementRepository, TaskFilter, TaskRepository};

#[derive(Default)]
struct TaskTable {
    tasks: HashMap<Uuid, Task>,
    /// Insertion order, oldest first.
    order: Vec<Uuid>,
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    table: RwLock<TaskTable>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let mut table = self.table.write().await;
        if table.tasks.contains_key(&task.id) {
            return Err(DomainError::DatabaseError(format!(
                "UNIQUE constraint failed: tasks.id ({})",
                task.id
            )));
        }
        table.tasks.insert(task.id, task.clone());
        table.order.push(task.id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        Ok(self.table.read().await.tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> DomainResult<u64> {
        let mut table = self.table.write().await;
        let stored = table
            .tasks
            .get_mut(&task.id)
            .ok_or(DomainError::TaskNotFound(task.id))?;

        if stored.version != task.version {
            return Err(DomainError::task_conflict(task.id));
        }

        // The edge set is owned by the store; only satisfaction marks move.
        for prerequisite_id in &task.satisfied_prerequisites {
            if stored.prerequisites.contains(prerequisite_id)
                && !stored.satisfied_prerequisites.contains(prerequisite_id)
            {
                stored.satisfied_prerequisites.push(*prerequisite_id);
            }
        }
        for reviewer_id in &task.reviewers {
            if !stored.reviewers.contains(reviewer_id) {
                stored.reviewers.push(*reviewer_id);
            }
        }

        stored.assigner_id = task.assigner_id;
        stored.assigned_user_id = task.assigned_user_id;
        stored.note.clone_from(&task.note);
        stored.status = task.status;
        stored.num_of_prerequisite = task.num_of_prerequisite;
        stored.allowed = task.allowed;
        stored.deadline = task.deadline;
        stored.updated_at = task.updated_at;
        stored.version += 1;

        Ok(stored.version)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let mut table = self.table.write().await;
        if table.tasks.remove(&id).is_none() {
            return Err(DomainError::TaskNotFound(id));
        }
        table.order.retain(|t| *t != id);
        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let table = self.table.read().await;
        let mut tasks: Vec<Task> = table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.tasks.get(id))
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn find_blocked_by(&self, prerequisite_id: Uuid) -> DomainResult<Vec<Task>> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.tasks.get(id))
            .filter(|t| t.depends_on(prerequisite_id))
            .cloned()
            .collect())
    }

    async fn clear_prerequisite_edge(&self, prerequisite_id: Uuid) -> DomainResult<u64> {
        let mut table = self.table.write().await;
        let mut cleared = 0;
        for task in table.tasks.values_mut() {
            if task.satisfied_prerequisites.contains(&prerequisite_id) {
                task.prerequisites.retain(|p| *p != prerequisite_id);
                task.satisfied_prerequisites.retain(|p| *p != prerequisite_id);
                task.updated_at = Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn remove_reviewer(&self, reviewer_id: Uuid) -> DomainResult<u64> {
        let mut table = self.table.write().await;
        let mut affected = 0;
        for task in table.tasks.values_mut() {
            if task.withdraw_from(reviewer_id) {
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[derive(Default)]
pub struct InMemoryRequirementRepository {
    requirements: RwLock<HashMap<i64, Requirement>>,
}

impl InMemoryRequirementRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequirementRepository for InMemoryRequirementRepository {
    async fn create(&self, requirement: &Requirement) -> DomainResult<()> {
        let mut requirements = self.requirements.write().await;
        if requirements.contains_key(&requirement.id) {
            return Err(DomainError::DatabaseError(format!(
                "UNIQUE constraint failed: requirements.id ({})",
                requirement.id
            )));
        }
        requirements.insert(requirement.id, requirement.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> DomainResult<Option<Requirement>> {
        Ok(self.requirements.read().await.get(&id).cloned())
    }

    async fn update(&self, requirement: &Requirement) -> DomainResult<()> {
        let mut requirements = self.requirements.write().await;
        match requirements.get_mut(&requirement.id) {
            Some(stored) => {
                *stored = requirement.clone();
                Ok(())
            }
            None => Err(DomainError::RequirementNotFound(requirement.id)),
        }
    }
}
