//! CLI command implementations.

pub mod batch;
pub mod init;
pub mod propagate;
pub mod requirement;
pub mod task;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteRequirementRepository, SqliteTaskRepository};
use crate::domain::models::{CascadeReport, Config, Task};
use crate::infrastructure::config::ConfigLoader;
use crate::services::TaskService;

use super::output::{short_id, CommandOutput};

pub type SqliteTaskService = TaskService<SqliteTaskRepository, SqliteRequirementRepository>;

/// Load configuration and open the migrated database.
pub async fn open_database() -> Result<(Config, SqlitePool)> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database. Run 'taskcascade init' first.")?;
    Ok((config, pool))
}

pub async fn open_service() -> Result<SqliteTaskService> {
    let (config, pool) = open_database().await?;
    Ok(TaskService::new(
        Arc::new(SqliteTaskRepository::new(pool.clone())),
        Arc::new(SqliteRequirementRepository::new(pool)),
        &config.engine,
    ))
}

#[derive(Debug, Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub requirement_id: i64,
    pub status: String,
    pub allowed: bool,
    pub num_of_prerequisite: u32,
    pub prerequisites: Vec<String>,
    pub assigned_user_id: String,
    pub assigner_id: Option<String>,
    pub reviewers: Vec<String>,
    pub note: String,
    pub deadline: Option<String>,
    pub version: u64,
}

impl From<&Task> for TaskOutput {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            requirement_id: task.requirement_id,
            status: task.status.as_str().to_string(),
            allowed: task.is_allowed(),
            num_of_prerequisite: task.num_of_prerequisite(),
            prerequisites: task
                .remaining_prerequisites()
                .iter()
                .map(ToString::to_string)
                .collect(),
            assigned_user_id: task.assigned_user_id.to_string(),
            assigner_id: task.assigner_id.map(|id| id.to_string()),
            reviewers: task.reviewers.iter().map(ToString::to_string).collect(),
            note: task.note.clone(),
            deadline: task.deadline.map(|d| d.to_rfc3339()),
            version: task.version,
        }
    }
}

impl CommandOutput for TaskOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Task: {}", self.id),
            format!("Status: {}", self.status),
            format!("Allowed: {}", if self.allowed { "yes" } else { "no" }),
            format!("Requirement: {}", self.requirement_id),
            format!("Assigned to: {}", self.assigned_user_id),
        ];
        if let Some(assigner) = &self.assigner_id {
            lines.push(format!("Assigned by: {assigner}"));
        }
        if !self.note.is_empty() {
            lines.push(format!("Note: {}", self.note));
        }
        if let Some(deadline) = &self.deadline {
            lines.push(format!("Deadline: {deadline}"));
        }
        if !self.prerequisites.is_empty() {
            lines.push(format!("\nBlocked by {} task(s):", self.num_of_prerequisite));
            for p in &self.prerequisites {
                lines.push(format!("  - {p}"));
            }
        }
        if !self.reviewers.is_empty() {
            lines.push("\nReviewers:".to_string());
            for r in &self.reviewers {
                lines.push(format!("  - {r}"));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct CascadeOutput {
    pub message: String,
    pub report: CascadeReport,
}

impl CommandOutput for CascadeOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.report.is_noop() {
            lines.push("No dependents were waiting on it.".to_string());
            return lines.join("\n");
        }
        if !self.report.unlocked.is_empty() {
            lines.push(format!("Unlocked {} task(s):", self.report.unlocked.len()));
            lines.extend(self.report.unlocked.iter().map(|id| format!("  - {id}")));
        }
        if !self.report.still_blocked.is_empty() {
            let ids: Vec<String> = self.report.still_blocked.iter().map(short_id).collect();
            lines.push(format!("Still blocked: {}", ids.join(", ")));
        }
        if !self.report.already_satisfied.is_empty() {
            lines.push(format!(
                "{} task(s) were updated by an earlier attempt",
                self.report.already_satisfied.len()
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
