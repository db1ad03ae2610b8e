//! Taskcascade CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskcascade::cli::{commands, Cli, Commands};
use taskcascade::infrastructure::config::ConfigLoader;
use taskcascade::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configured logging once a project exists; stderr otherwise so `init`
    // and config errors still get reported.
    let logger = ConfigLoader::load()
        .ok()
        .and_then(|config| LoggerImpl::init(&LogConfig::from(&config.logging)).ok());
    if logger.is_none() {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Batch(args) => commands::batch::execute(args, cli.json).await,
        Commands::Task(args) => commands::task::execute(args, cli.json).await,
        Commands::Requirement(args) => commands::requirement::execute(args, cli.json).await,
        Commands::Propagate(args) => commands::propagate::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        taskcascade::cli::handle_error(err, cli.json);
    }
}
