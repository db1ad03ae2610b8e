//! `taskcascade batch <file>`: create several interdependent tasks at once.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::cli::commands::open_service;
use crate::cli::output::{failure_lines, output, CommandOutput};
use crate::domain::models::{BatchReport, TaskSpec};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// JSON or YAML file holding a list of task specs
    pub file: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct BatchOutput {
    pub submitted: usize,
    pub accepted_count: usize,
    #[serde(flatten)]
    pub report: BatchReport,
}

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Accepted {} of {} task(s)",
            self.accepted_count, self.submitted
        )];
        for accepted in &self.report.accepted {
            lines.push(format!(
                "  {:<16} {} {}",
                accepted.label,
                accepted.task_id,
                if accepted.allowed { "(allowed)" } else { "(blocked)" }
            ));
        }
        if !self.report.failures.is_empty() {
            lines.push(format!("\nFailed {} task(s):", self.report.failures.len()));
            lines.extend(failure_lines(&self.report.failures));
        }
        if !self.report.orphaned.is_empty() {
            lines.push(format!(
                "\n{} task(s) wait on a prerequisite that was not created",
                self.report.orphaned.len()
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Read task specs from a file. `.json` files are parsed as JSON, anything
/// else as YAML.
pub fn read_specs(path: &Path) -> Result<Vec<TaskSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let specs = if is_json {
        serde_json::from_str(&content).context("Invalid JSON task list")?
    } else {
        serde_yaml::from_str(&content).context("Invalid YAML task list")?
    };
    Ok(specs)
}

pub async fn execute(args: BatchArgs, json_mode: bool) -> Result<()> {
    let specs = read_specs(&args.file)?;
    let submitted = specs.len();

    let service = open_service().await?;
    let report = service
        .create_batch(specs)
        .await
        .context("Batch was rejected")?;

    let out = BatchOutput {
        submitted,
        accepted_count: report.accepted_count(),
        report,
    };
    output(&out, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_yaml_specs() {
        let user = uuid::Uuid::new_v4();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "- label: design\n  requirement_id: 1\n  assigned_user_id: {user}\n\
             - label: build\n  requirement_id: 1\n  assigned_user_id: {user}\n  prerequisites: [design]"
        )
        .unwrap();

        let specs = read_specs(file.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].prerequisites, vec!["design".to_string()]);
    }

    #[test]
    fn test_read_json_specs() {
        let user = uuid::Uuid::new_v4();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"label":"a","requirement_id":2,"assigned_user_id":"{user}","note":"first"}}]"#
        )
        .unwrap();

        let specs = read_specs(file.path()).unwrap();
        assert_eq!(specs[0].note, "first");
        assert!(specs[0].prerequisites.is_empty());
    }
}
