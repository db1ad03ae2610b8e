//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

pub use output::handle_error;

#[derive(Parser, Debug)]
#[command(name = "taskcascade")]
#[command(about = "Task dependency and unlocking engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration and database
    Init(commands::init::InitArgs),
    /// Create a batch of tasks from a JSON or YAML file
    Batch(commands::batch::BatchArgs),
    /// Task management commands
    Task(commands::task::TaskArgs),
    /// Requirement management commands
    Requirement(commands::requirement::RequirementArgs),
    /// Run or retry the cascade for a resolved prerequisite
    Propagate(commands::propagate::PropagateArgs),
}
