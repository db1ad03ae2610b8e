//! `taskcascade propagate <id>`: run or retry a cascade.

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::cli::commands::{open_service, CascadeOutput};
use crate::cli::output::output;

#[derive(Args, Debug)]
pub struct PropagateArgs {
    /// Prerequisite whose resolution should reach its dependents
    pub id: Uuid,
}

pub async fn execute(args: PropagateArgs, json_mode: bool) -> Result<()> {
    let service = open_service().await?;
    let report = service
        .propagate_removal(args.id)
        .await
        .with_context(|| format!("Cascade for {} did not complete; it is safe to retry", args.id))?;

    let out = CascadeOutput {
        message: format!("Propagated {}", args.id),
        report,
    };
    output(&out, json_mode);
    Ok(())
}
