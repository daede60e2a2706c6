mod cli;
mod config;
mod model;
mod providers;
mod sync;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use sync::orchestrator::SyncOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A local .env may carry the token and project settings
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply(&mut config);
    let project = config.project_ref()?;

    let board = providers::create_board(&config)?;
    tracing::info!(
        "Synchronizing fields of project {}/{} ({})",
        project.owner,
        project.number,
        project.owner_type.graphql_field()
    );

    SyncOrchestrator::new(board, project, config.sync.options())
        .run()
        .await?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
