//! Task CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::commands::{open_service, CascadeOutput, TaskOutput};
use crate::cli::output::{failure_lines, output, task_table, CommandOutput};
use crate::domain::models::{FanOutReport, Reassignment, Task, TaskStatus};
use crate::domain::ports::TaskFilter;
use crate::services::NewTask;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a single task
    Add {
        /// Requirement the task fulfills
        #[arg(short, long)]
        requirement: i64,
        /// User the task is assigned to
        #[arg(short, long)]
        user: Uuid,
        /// User handing out the task
        #[arg(long)]
        assigner: Option<Uuid>,
        /// Free-form note
        #[arg(short, long, default_value = "")]
        note: String,
        /// Prerequisite task ids (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        after: Vec<Uuid>,
        /// Deadline (RFC 3339)
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Show task details
    Show { id: Uuid },
    /// List tasks
    List {
        /// Only tasks assigned to this user
        #[arg(short, long)]
        user: Option<Uuid>,
        /// Filter by status (pending, in_review, completed, rejected)
        #[arg(short, long)]
        status: Option<String>,
        /// Only tasks that can be worked on now
        #[arg(long)]
        allowed: bool,
        /// Only submitted tasks this user assigned or had forwarded
        #[arg(long, value_name = "USER", conflicts_with = "status")]
        review: Option<Uuid>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Submit an allowed task for review
    Submit { id: Uuid },
    /// Complete a task and unlock its dependents
    Complete { id: Uuid },
    /// Reject a task under review
    Reject { id: Uuid },
    /// Delete a task after releasing its dependents
    Delete { id: Uuid },
    /// Hand tasks to a different user
    Reassign {
        /// Tasks to reassign (comma-separated)
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<Uuid>,
        /// New assignee
        #[arg(short, long)]
        user: Uuid,
    },
    /// Forward a task to reviewers
    Forward {
        id: Uuid,
        /// Reviewer ids (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        reviewers: Vec<Uuid>,
    },
    /// Withdraw every review forwarded to a user
    Unforward { reviewer: Uuid },
}

#[derive(Debug, serde::Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskOutput>,
    pub total: usize,
    #[serde(skip)]
    rendered: String,
}

impl TaskListOutput {
    fn new(tasks: &[Task]) -> Self {
        Self {
            tasks: tasks.iter().map(TaskOutput::from).collect(),
            total: tasks.len(),
            rendered: task_table(tasks),
        }
    }
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.total == 0 {
            return "No tasks found.".to_string();
        }
        format!("Found {} task(s):\n{}", self.total, self.rendered)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskActionOutput {
    pub success: bool,
    pub message: String,
    pub task: TaskOutput,
}

impl CommandOutput for TaskActionOutput {
    fn to_human(&self) -> String {
        format!("{}\n\n{}", self.message, self.task.to_human())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct FanOutOutput {
    pub message: String,
    #[serde(flatten)]
    pub report: FanOutReport,
}

impl CommandOutput for FanOutOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} ({} succeeded)", self.message, self.report.succeeded.len())];
        if !self.report.failures.is_empty() {
            lines.push(format!("Failed {}:", self.report.failures.len()));
            lines.extend(failure_lines(&self.report.failures));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReviewerRemovedOutput {
    pub reviewer_id: Uuid,
    pub withdrawn: u64,
}

impl CommandOutput for ReviewerRemovedOutput {
    fn to_human(&self) -> String {
        format!("Withdrew {} review(s) from {}", self.withdrawn, self.reviewer_id)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn action(message: String, task: &Task) -> TaskActionOutput {
    TaskActionOutput {
        success: true,
        message,
        task: TaskOutput::from(task),
    }
}

pub async fn execute(args: TaskArgs, json_mode: bool) -> Result<()> {
    let service = open_service().await?;

    match args.command {
        TaskCommands::Add { requirement, user, assigner, note, after, deadline } => {
            let task = service
                .create_task(NewTask {
                    requirement_id: requirement,
                    assigned_user_id: user,
                    assigner_id: assigner,
                    note,
                    prerequisites: after,
                    deadline,
                })
                .await
                .context("Failed to create task")?;
            output(&action(format!("Task created: {}", task.id), &task), json_mode);
        }

        TaskCommands::Show { id } => {
            let task = service
                .get_task(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Task {id} not found. Use 'taskcascade task list' to see available tasks."))?;
            output(&TaskOutput::from(&task), json_mode);
        }

        TaskCommands::List { user, status, allowed, review, limit } => {
            let status = match status {
                Some(s) => Some(
                    TaskStatus::from_str(&s).ok_or_else(|| anyhow::anyhow!("Invalid status: {s}"))?,
                ),
                None => None,
            };
            let base = review.map(TaskFilter::to_review_by).unwrap_or_default();
            let filter = TaskFilter {
                assigned_user_id: user,
                status: status.or(base.status),
                allowed: allowed.then_some(true),
                limit: Some(limit),
                ..base
            };
            let tasks = service.list_tasks(filter).await?;
            output(&TaskListOutput::new(&tasks), json_mode);
        }

        TaskCommands::Submit { id } => {
            let task = service.submit_for_review(id).await?;
            output(&action(format!("Task submitted for review: {id}"), &task), json_mode);
        }

        TaskCommands::Complete { id } => {
            let (_, report) = service
                .complete_task(id)
                .await
                .with_context(|| format!("Failed to complete task {id}"))?;
            let out = CascadeOutput {
                message: format!("Task completed: {id}"),
                report,
            };
            output(&out, json_mode);
        }

        TaskCommands::Reject { id } => {
            let task = service.reject_task(id).await?;
            output(&action(format!("Task rejected: {id}"), &task), json_mode);
        }

        TaskCommands::Delete { id } => {
            let report = service
                .delete_task(id)
                .await
                .with_context(|| format!("Failed to delete task {id}"))?;
            let out = CascadeOutput {
                message: format!("Task deleted: {id}"),
                report,
            };
            output(&out, json_mode);
        }

        TaskCommands::Reassign { ids, user } => {
            let reassignments = ids
                .into_iter()
                .map(|task_id| Reassignment { task_id, user_id: user })
                .collect();
            let report = service.reassign(reassignments).await;
            let out = FanOutOutput {
                message: format!("Reassigned to {user}"),
                report,
            };
            output(&out, json_mode);
        }

        TaskCommands::Forward { id, reviewers } => {
            let report = service.forward_review(id, reviewers).await;
            let out = FanOutOutput {
                message: format!("Forwarded {id} for review"),
                report,
            };
            output(&out, json_mode);
        }

        TaskCommands::Unforward { reviewer } => {
            let withdrawn = service
                .remove_reviewer(reviewer)
                .await
                .with_context(|| format!("Failed to remove reviewer {reviewer}"))?;
            output(&ReviewerRemovedOutput { reviewer_id: reviewer, withdrawn }, json_mode);
        }
    }

    Ok(())
}
