//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{Task, TaskFailure};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum length, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// First eight characters of an id, for tables.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Borderless table with bold headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).add_attribute(Attribute::Bold)),
        );
    table
}

pub fn task_table(tasks: &[Task]) -> String {
    let mut table = list_table(&["id", "status", "allowed", "blocked by", "user", "note"]);
    for task in tasks {
        table.add_row(vec![
            Cell::new(short_id(&task.id)),
            Cell::new(task.status.as_str()),
            Cell::new(if task.is_allowed() { "yes" } else { "no" }),
            Cell::new(task.num_of_prerequisite()),
            Cell::new(short_id(&task.assigned_user_id)),
            Cell::new(truncate(&task.note, 40)),
        ]);
    }
    table.to_string()
}

pub fn failure_lines(failures: &[TaskFailure]) -> Vec<String> {
    failures
        .iter()
        .map(|f| {
            let subject = match (&f.label, f.task_id) {
                (Some(label), _) => label.clone(),
                (None, Some(id)) => id.to_string(),
                (None, None) => "-".to_string(),
            };
            format!("  - {subject}: {}", f.error)
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ErrorOutput {
    success: bool,
    error: String,
    causes: Vec<String>,
}

impl CommandOutput for ErrorOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Error: {}", self.error)];
        for cause in &self.causes {
            lines.push(format!("  caused by: {cause}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Print a command failure and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let out = ErrorOutput {
        success: false,
        error: err.to_string(),
        causes: err.chain().skip(1).map(ToString::to_string).collect(),
    };
    if json_mode {
        output(&out, true);
    } else {
        eprintln!("{}", out.to_human());
    }
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer note here", 10), "a longe...");
    }

    #[test]
    fn test_error_output_lists_causes() {
        let err = anyhow::anyhow!("disk full").context("Failed to save task");
        let out = ErrorOutput {
            success: false,
            error: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        };
        assert_eq!(out.to_human(), "Error: Failed to save task\n  caused by: disk full");
    }
}
