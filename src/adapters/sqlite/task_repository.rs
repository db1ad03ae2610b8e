//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_relations(&self, task: &mut Task) -> DomainResult<()> {
        let edges: Vec<(String, bool)> = sqlx::query_as(
            "SELECT prerequisite_id, satisfied FROM task_prerequisites WHERE task_id = ? ORDER BY rowid",
        )
        .bind(task.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        task.prerequisites.clear();
        task.satisfied_prerequisites.clear();
        for (prerequisite_id, satisfied) in edges {
            let id = parse_uuid(&prerequisite_id)?;
            task.prerequisites.push(id);
            if satisfied {
                task.satisfied_prerequisites.push(id);
            }
        }

        let reviewers: Vec<(String,)> = sqlx::query_as(
            "SELECT reviewer_id FROM task_reviewers WHERE task_id = ? ORDER BY forwarded_at, rowid",
        )
        .bind(task.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        task.reviewers = reviewers
            .iter()
            .map(|(id,)| parse_uuid(id))
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(())
    }

    async fn hydrate(&self, rows: Vec<TaskRow>) -> DomainResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let mut task: Task = row.try_into()?;
            self.load_relations(&mut task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO tasks (id, requirement_id, assigner_id, assigned_user_id, note, status,
               num_of_prerequisite, allowed, deadline, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.requirement_id)
        .bind(task.assigner_id.map(|id| id.to_string()))
        .bind(task.assigned_user_id.to_string())
        .bind(&task.note)
        .bind(task.status.as_str())
        .bind(i64::from(task.num_of_prerequisite))
        .bind(task.allowed)
        .bind(task.deadline.map(|d| d.to_rfc3339()))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version as i64)
        .execute(&mut *tx)
        .await?;

        for prerequisite_id in &task.prerequisites {
            sqlx::query(
                "INSERT INTO task_prerequisites (task_id, prerequisite_id, satisfied) VALUES (?, ?, ?)",
            )
            .bind(task.id.to_string())
            .bind(prerequisite_id.to_string())
            .bind(task.satisfied_prerequisites.contains(prerequisite_id))
            .execute(&mut *tx)
            .await?;
        }

        for reviewer_id in &task.reviewers {
            sqlx::query(
                "INSERT OR IGNORE INTO task_reviewers (task_id, reviewer_id, forwarded_at) VALUES (?, ?, ?)",
            )
            .bind(task.id.to_string())
            .bind(reviewer_id.to_string())
            .bind(task.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let mut task: Task = r.try_into()?;
                self.load_relations(&mut task).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, task: &Task) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE tasks SET assigner_id = ?, assigned_user_id = ?, note = ?, status = ?,
               num_of_prerequisite = ?, allowed = ?, deadline = ?, updated_at = ?,
               version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(task.assigner_id.map(|id| id.to_string()))
        .bind(task.assigned_user_id.to_string())
        .bind(&task.note)
        .bind(task.status.as_str())
        .bind(i64::from(task.num_of_prerequisite))
        .bind(task.allowed)
        .bind(task.deadline.map(|d| d.to_rfc3339()))
        .bind(task.updated_at.to_rfc3339())
        .bind(task.id.to_string())
        .bind(task.version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT version FROM tasks WHERE id = ?")
                .bind(task.id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => DomainError::task_conflict(task.id),
                None => DomainError::TaskNotFound(task.id),
            });
        }

        for prerequisite_id in &task.satisfied_prerequisites {
            sqlx::query(
                "UPDATE task_prerequisites SET satisfied = 1 WHERE task_id = ? AND prerequisite_id = ?",
            )
            .bind(task.id.to_string())
            .bind(prerequisite_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        let forwarded_at = Utc::now().to_rfc3339();
        for reviewer_id in &task.reviewers {
            sqlx::query(
                "INSERT OR IGNORE INTO task_reviewers (task_id, reviewer_id, forwarded_at) VALUES (?, ?, ?)",
            )
            .bind(task.id.to_string())
            .bind(reviewer_id.to_string())
            .bind(&forwarded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(task.version + 1)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }

        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE 1=1");

        if let Some(user_id) = filter.assigned_user_id {
            query.push(" AND assigned_user_id = ").push_bind(user_id.to_string());
        }
        if let Some(requirement_id) = filter.requirement_id {
            query.push(" AND requirement_id = ").push_bind(requirement_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(allowed) = filter.allowed {
            query.push(" AND allowed = ").push_bind(allowed);
        }
        if let Some(reviewer_id) = filter.reviewer_id {
            let reviewer_id = reviewer_id.to_string();
            query
                .push(" AND (assigner_id = ")
                .push_bind(reviewer_id.clone())
                .push(" OR id IN (SELECT task_id FROM task_reviewers WHERE reviewer_id = ")
                .push_bind(reviewer_id)
                .push("))");
        }

        query.push(" ORDER BY created_at DESC, rowid DESC");

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<TaskRow> = query.build_query_as::<TaskRow>().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn find_blocked_by(&self, prerequisite_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT t.* FROM tasks t
               INNER JOIN task_prerequisites p ON p.task_id = t.id
               WHERE p.prerequisite_id = ?
               ORDER BY t.created_at"#,
        )
        .bind(prerequisite_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn clear_prerequisite_edge(&self, prerequisite_id: Uuid) -> DomainResult<u64> {
        let result = sqlx::query(
            "DELETE FROM task_prerequisites WHERE prerequisite_id = ? AND satisfied = 1",
        )
        .bind(prerequisite_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove_reviewer(&self, reviewer_id: Uuid) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM task_reviewers WHERE reviewer_id = ?")
            .bind(reviewer_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    requirement_id: i64,
    assigner_id: Option<String>,
    assigned_user_id: String,
    note: String,
    status: String,
    num_of_prerequisite: i64,
    allowed: bool,
    deadline: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let id = parse_uuid(&row.id)?;
        let status = TaskStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid status: {}", row.status))
        })?;
        let num_of_prerequisite = u32::try_from(row.num_of_prerequisite).map_err(|_| {
            DomainError::SerializationError(format!(
                "Invalid prerequisite counter {} for task {id}",
                row.num_of_prerequisite
            ))
        })?;

        Ok(Task {
            id,
            requirement_id: row.requirement_id,
            assigner_id: parse_optional_uuid(row.assigner_id)?,
            assigned_user_id: parse_uuid(&row.assigned_user_id)?,
            note: row.note,
            prerequisites: Vec::new(),
            satisfied_prerequisites: Vec::new(),
            num_of_prerequisite,
            allowed: row.allowed,
            status,
            reviewers: Vec::new(),
            deadline: parse_optional_datetime(row.deadline)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::initialize_in_memory;

    async fn setup_test_repo() -> SqliteTaskRepository {
        let pool = initialize_in_memory().await.unwrap();
        SqliteTaskRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_task_with_edges() {
        let repo = setup_test_repo().await;
        let prereq = Task::new(1, Uuid::new_v4());
        repo.create(&prereq).await.unwrap();

        let mut task = Task::new(2, Uuid::new_v4()).with_note("wire the form");
        task.set_prerequisites(vec![prereq.id]).unwrap();
        repo.create(&task).await.unwrap();

        let loaded = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.prerequisites(), &[prereq.id]);
        assert_eq!(loaded.num_of_prerequisite(), 1);
        assert!(!loaded.is_allowed());
        assert_eq!(loaded.note, "wire the form");
        loaded.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let repo = setup_test_repo().await;
        let task = Task::new(1, Uuid::new_v4());
        repo.create(&task).await.unwrap();

        let mut first = repo.get(task.id).await.unwrap().unwrap();
        let mut second = first.clone();

        first.note = "first".to_string();
        let new_version = repo.update(&first).await.unwrap();
        assert_eq!(new_version, 2);

        second.note = "second".to_string();
        let err = repo.update(&second).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

        let stored = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.note, "first");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_update_missing_task_is_not_found() {
        let repo = setup_test_repo().await;
        let task = Task::new(1, Uuid::new_v4());
        let err = repo.update(&task).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(id) if id == task.id));
    }

    #[tokio::test]
    async fn test_clear_edge_only_removes_satisfied_rows() {
        let repo = setup_test_repo().await;
        let p = Task::new(1, Uuid::new_v4());
        repo.create(&p).await.unwrap();

        let mut applied = Task::new(2, Uuid::new_v4());
        applied.set_prerequisites(vec![p.id]).unwrap();
        repo.create(&applied).await.unwrap();

        let mut pending = Task::new(3, Uuid::new_v4());
        pending.set_prerequisites(vec![p.id]).unwrap();
        repo.create(&pending).await.unwrap();

        let mut loaded = repo.get(applied.id).await.unwrap().unwrap();
        loaded.resolve_prerequisite(p.id).unwrap();
        repo.update(&loaded).await.unwrap();

        let cleared = repo.clear_prerequisite_edge(p.id).await.unwrap();
        assert_eq!(cleared, 1);

        let remaining = repo.find_blocked_by(p.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, pending.id);

        let unlocked = repo.get(applied.id).await.unwrap().unwrap();
        assert!(unlocked.is_allowed());
        assert!(unlocked.prerequisites().is_empty());
        unlocked.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_list_workable_for_user() {
        let repo = setup_test_repo().await;
        let user = Uuid::new_v4();

        let open = Task::new(1, user);
        repo.create(&open).await.unwrap();

        let mut blocked = Task::new(1, user);
        blocked.set_prerequisites(vec![open.id]).unwrap();
        repo.create(&blocked).await.unwrap();

        repo.create(&Task::new(1, Uuid::new_v4())).await.unwrap();

        let tasks = repo.list(TaskFilter::workable_for(user)).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, open.id);
    }

    #[tokio::test]
    async fn test_delete_removes_outgoing_edges() {
        let repo = setup_test_repo().await;
        let p = Task::new(1, Uuid::new_v4());
        repo.create(&p).await.unwrap();
        let mut task = Task::new(1, Uuid::new_v4());
        task.set_prerequisites(vec![p.id]).unwrap();
        repo.create(&task).await.unwrap();

        repo.delete(task.id).await.unwrap();
        assert!(repo.find_blocked_by(p.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete(task.id).await,
            Err(DomainError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reviewers_persist_through_update() {
        let repo = setup_test_repo().await;
        let task = Task::new(1, Uuid::new_v4());
        repo.create(&task).await.unwrap();

        let mut loaded = repo.get(task.id).await.unwrap().unwrap();
        let reviewer = Uuid::new_v4();
        loaded.forward_to(reviewer);
        repo.update(&loaded).await.unwrap();

        let stored = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.reviewers, vec![reviewer]);
    }

    #[tokio::test]
    async fn test_list_to_review_by_assigner_or_forwarded_reviewer() {
        let repo = setup_test_repo().await;
        let assigner = Uuid::new_v4();
        let reviewer = Uuid::new_v4();

        let mut submitted = Task::new(1, Uuid::new_v4()).with_assigner(assigner);
        submitted.transition_to(TaskStatus::InReview).unwrap();
        repo.create(&submitted).await.unwrap();

        let mut forwarded = Task::new(1, Uuid::new_v4());
        forwarded.transition_to(TaskStatus::InReview).unwrap();
        forwarded.forward_to(reviewer);
        repo.create(&forwarded).await.unwrap();

        let mut not_submitted = Task::new(1, Uuid::new_v4()).with_assigner(assigner);
        not_submitted.forward_to(reviewer);
        repo.create(&not_submitted).await.unwrap();

        let for_assigner = repo.list(TaskFilter::to_review_by(assigner)).await.unwrap();
        assert_eq!(for_assigner.iter().map(|t| t.id).collect::<Vec<_>>(), vec![submitted.id]);

        let for_reviewer = repo.list(TaskFilter::to_review_by(reviewer)).await.unwrap();
        assert_eq!(for_reviewer.iter().map(|t| t.id).collect::<Vec<_>>(), vec![forwarded.id]);
    }

    #[tokio::test]
    async fn test_remove_reviewer_withdraws_every_forward() {
        let repo = setup_test_repo().await;
        let reviewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut first = Task::new(1, Uuid::new_v4());
        first.forward_to(reviewer);
        first.forward_to(other);
        let mut second = Task::new(1, Uuid::new_v4());
        second.forward_to(reviewer);
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();

        assert_eq!(repo.remove_reviewer(reviewer).await.unwrap(), 2);
        assert_eq!(repo.get(first.id).await.unwrap().unwrap().reviewers, vec![other]);
        assert!(repo.get(second.id).await.unwrap().unwrap().reviewers.is_empty());
        assert_eq!(repo.remove_reviewer(reviewer).await.unwrap(), 0);
    }
}
