//! Domain errors for the taskcascade engine.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `a -> b -> c -> a`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

fn format_id_list(ids: &[Uuid]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain-level errors that can occur in the engine.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Requirement not found: {0}")]
    RequirementNotFound(i64),

    /// A counter or eligibility rule would be broken by the operation.
    #[error("Invariant violation on task {task_id}: {reason}")]
    InvariantViolation { task_id: Uuid, reason: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Storage read or write failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    /// One or more dependents of `prerequisite_id` could not be updated; the
    /// prerequisite edge was left in place.
    #[error(
        "Cascade for prerequisite {prerequisite_id} failed for {} task(s): {}",
        .failed.len(),
        format_id_list(.failed)
    )]
    PartialCascadeFailure {
        prerequisite_id: Uuid,
        failed: Vec<Uuid>,
    },

    #[error("Join deadline of {0}ms elapsed before all units finished")]
    JoinTimeout(u64),
}

impl DomainError {
    pub fn invariant(task_id: Uuid, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            task_id,
            reason: reason.into(),
        }
    }

    pub fn task_conflict(id: Uuid) -> Self {
        Self::ConcurrencyConflict {
            entity: "task".to_string(),
            id: id.to_string(),
        }
    }

    /// Whether this error belongs to the not-found class.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound(_) | Self::RequirementNotFound(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = DomainError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Task dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn test_partial_cascade_message_counts_failures() {
        let p = Uuid::new_v4();
        let failed = vec![Uuid::new_v4(), Uuid::new_v4()];
        let err = DomainError::PartialCascadeFailure {
            prerequisite_id: p,
            failed: failed.clone(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 task(s)"));
        assert!(msg.contains(&failed[0].to_string()));
        assert!(msg.contains(&p.to_string()));
    }

    #[test]
    fn test_not_found_class() {
        assert!(DomainError::TaskNotFound(Uuid::new_v4()).is_not_found());
        assert!(DomainError::RequirementNotFound(7).is_not_found());
        assert!(!DomainError::invariant(Uuid::new_v4(), "x").is_not_found());
    }
}
