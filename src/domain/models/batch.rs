//! Batch assignment models.
//!
//! A batch is submitted as a list of [`TaskSpec`]s that reference each other
//! by label, since none of them has a durable identifier yet. The
//! [`LabelMap`] built during identifier assignment translates those labels;
//! it lives only for the duration of one batch call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// One task of a batch as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Batch-local placeholder, unique within the batch.
    pub label: String,
    pub requirement_id: i64,
    pub assigned_user_id: Uuid,
    #[serde(default)]
    pub assigner_id: Option<Uuid>,
    #[serde(default)]
    pub note: String,
    /// Labels of other tasks in the batch, or durable ids of existing tasks.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskSpec {
    pub fn new(label: impl Into<String>, requirement_id: i64, assigned_user_id: Uuid) -> Self {
        Self {
            label: label.into(),
            requirement_id,
            assigned_user_id,
            assigner_id: None,
            note: String::new(),
            prerequisites: Vec::new(),
            deadline: None,
        }
    }

    pub fn after(mut self, label: impl Into<String>) -> Self {
        self.prerequisites.push(label.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// Batch-scoped mapping from label to the durable id assigned to it.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    entries: HashMap<String, Uuid>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label. Returns the previous id if the label was already taken.
    pub fn insert(&mut self, label: impl Into<String>, id: Uuid) -> Option<Uuid> {
        self.entries.insert(label.into(), id)
    }

    pub fn get(&self, label: &str) -> Option<Uuid> {
        self.entries.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A task of the batch that was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedTask {
    pub label: String,
    pub task_id: Uuid,
    pub allowed: bool,
}

/// A unit of work that failed, identified by label and/or task id.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub label: Option<String>,
    pub task_id: Option<Uuid>,
    #[serde(serialize_with = "serialize_error")]
    pub error: DomainError,
}

impl TaskFailure {
    pub fn for_task(task_id: Uuid, error: DomainError) -> Self {
        Self {
            label: None,
            task_id: Some(task_id),
            error,
        }
    }

    pub fn for_label(label: impl Into<String>, task_id: Uuid, error: DomainError) -> Self {
        Self {
            label: Some(label.into()),
            task_id: Some(task_id),
            error,
        }
    }
}

fn serialize_error<S: Serializer>(error: &DomainError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

/// Result of a batch assignment. Partial success is normal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub accepted: Vec<AcceptedTask>,
    pub failures: Vec<TaskFailure>,
    /// Accepted tasks that depend on a batch sibling which failed to persist.
    /// They remain blocked until that prerequisite edge is removed.
    pub orphaned: Vec<Uuid>,
}

impl BatchReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn task_id(&self, label: &str) -> Option<Uuid> {
        self.accepted
            .iter()
            .find(|a| a.label == label)
            .map(|a| a.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_spec_deserializes_with_defaults() {
        let yaml = r#"
label: design
requirement_id: 4
assigned_user_id: 7f1c56c2-4b7e-4c2b-9d55-3c8f0b1a2e11
"#;
        let spec: TaskSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.label, "design");
        assert!(spec.prerequisites.is_empty());
        assert!(spec.note.is_empty());
    }

    #[test]
    fn test_label_map_reports_duplicates() {
        let mut map = LabelMap::new();
        assert!(map.insert("a", Uuid::new_v4()).is_none());
        assert!(map.insert("a", Uuid::new_v4()).is_some());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_report_serializes_errors_as_text() {
        let id = Uuid::new_v4();
        let report = BatchReport {
            accepted: vec![],
            failures: vec![TaskFailure::for_label("x", id, DomainError::TaskNotFound(id))],
            orphaned: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        let msg = json["failures"][0]["error"].as_str().unwrap();
        assert!(msg.starts_with("Task not found"));
    }
}
