mod helpers;

use std::sync::Arc;
use uuid::Uuid;

use taskcascade::adapters::sqlite::{initialize_database, SqliteTaskRepository};
use taskcascade::domain::models::{DatabaseConfig, EngineConfig, Task, TaskStatus};
use taskcascade::services::{CascadePropagator, FanOut, TaskLocks};
use taskcascade::{DomainError, TaskFilter, TaskRepository};

use helpers::database::{setup_test_db, teardown_test_db};

#[tokio::test]
async fn test_satisfied_marks_survive_reload() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let p = Task::new(1, Uuid::new_v4());
    let q = Task::new(1, Uuid::new_v4());
    let mut dependent = Task::new(1, Uuid::new_v4());
    dependent.set_prerequisites([p.id, q.id]).unwrap();
    for task in [&p, &q, &dependent] {
        repo.create(task).await.unwrap();
    }

    let mut loaded = repo.get(dependent.id).await.unwrap().unwrap();
    loaded.resolve_prerequisite(p.id).unwrap();
    let version = repo.update(&loaded).await.unwrap();
    assert_eq!(version, loaded.version + 1);

    let reloaded = repo.get(dependent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.satisfied_prerequisites(), &[p.id]);
    assert_eq!(reloaded.remaining_prerequisites(), vec![q.id]);
    assert_eq!(reloaded.num_of_prerequisite(), 1);
    reloaded.check_invariants().unwrap();

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_stale_writer_gets_conflict() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let p = Task::new(1, Uuid::new_v4());
    let mut dependent = Task::new(1, Uuid::new_v4());
    dependent.set_prerequisites([p.id]).unwrap();
    repo.create(&p).await.unwrap();
    repo.create(&dependent).await.unwrap();

    let mut first = repo.get(dependent.id).await.unwrap().unwrap();
    let mut second = first.clone();

    first.resolve_prerequisite(p.id).unwrap();
    repo.update(&first).await.unwrap();

    second.resolve_prerequisite(p.id).unwrap();
    let err = repo.update(&second).await.unwrap_err();
    assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

    let stored = repo.get(dependent.id).await.unwrap().unwrap();
    assert_eq!(stored.num_of_prerequisite(), 0);
    assert!(stored.is_allowed());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_file_database_cascade() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("nested/cascade.db").display().to_string(),
        max_connections: 4,
        ..DatabaseConfig::default()
    };
    let pool = initialize_database(&config).await.unwrap();
    let repo = Arc::new(SqliteTaskRepository::new(pool.clone()));

    let p = Task::new(1, Uuid::new_v4());
    repo.create(&p).await.unwrap();
    let mut ids = Vec::new();
    for _ in 0..8 {
        let mut task = Task::new(1, Uuid::new_v4());
        task.set_prerequisites([p.id]).unwrap();
        repo.create(&task).await.unwrap();
        ids.push(task.id);
    }

    let cascade = CascadePropagator::new(
        Arc::clone(&repo),
        TaskLocks::new(),
        FanOut::from_config(&EngineConfig::default()),
    );
    let report = cascade.propagate_removal(p.id).await.unwrap();
    assert_eq!(report.unlocked.len(), 8);
    assert_eq!(report.edges_cleared, 8);

    let allowed = repo
        .list(TaskFilter {
            allowed: Some(true),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(allowed.len(), 9);

    pool.close().await;
}
