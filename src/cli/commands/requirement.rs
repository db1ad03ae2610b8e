//! Requirement CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::adapters::sqlite::SqliteRequirementRepository;
use crate::cli::commands::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Requirement;
use crate::domain::ports::RequirementRepository;

#[derive(Args, Debug)]
pub struct RequirementArgs {
    #[command(subcommand)]
    pub command: RequirementCommands,
}

#[derive(Subcommand, Debug)]
pub enum RequirementCommands {
    /// Record a requirement tasks can fulfill
    Add {
        /// Requirement id, referenced by tasks
        id: i64,
        /// What is being asked for
        request: String,
        #[arg(short, long)]
        expected_outcome: Option<String>,
        /// Order the requirement belongs to
        #[arg(short, long)]
        order: Option<Uuid>,
    },
    /// Show a requirement
    Show { id: i64 },
}

#[derive(Debug, serde::Serialize)]
pub struct RequirementOutput {
    #[serde(flatten)]
    pub requirement: Requirement,
}

impl CommandOutput for RequirementOutput {
    fn to_human(&self) -> String {
        let r = &self.requirement;
        let mut lines = vec![
            format!("Requirement: {}", r.id),
            format!("Request: {}", r.request),
            format!("Fulfilled: {}", if r.fulfilled { "yes" } else { "no" }),
        ];
        if !r.expected_outcome.is_empty() {
            lines.push(format!("Expected outcome: {}", r.expected_outcome));
        }
        if let Some(order) = r.order_id {
            lines.push(format!("Order: {order}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RequirementArgs, json_mode: bool) -> Result<()> {
    let (_, pool) = open_database().await?;
    let repo = SqliteRequirementRepository::new(pool);

    let requirement = match args.command {
        RequirementCommands::Add { id, request, expected_outcome, order } => {
            let mut requirement = Requirement::new(id, request);
            if let Some(outcome) = expected_outcome {
                requirement = requirement.with_expected_outcome(outcome);
            }
            if let Some(order) = order {
                requirement = requirement.with_order(order);
            }
            requirement.validate().map_err(|e| anyhow::anyhow!(e))?;
            repo.create(&requirement).await.context("Failed to save requirement")?;
            requirement
        }
        RequirementCommands::Show { id } => repo
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Requirement {id} not found"))?,
    };

    output(&RequirementOutput { requirement }, json_mode);
    Ok(())
}
