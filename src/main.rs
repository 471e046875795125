use anyhow::Result;
use call_sync::config::Config;
use call_sync::credentials::Credentials;
use call_sync::logging;
use call_sync::pipeline::SyncPipeline;
use call_sync::window::TimeWindow;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "call-sync")]
#[command(about = "Replicates call detail records from the hosted telephony reports API into a relational store")]
#[command(version)]
struct Cli {
    /// Which block of history to fetch, counted back from now
    /// (1 = the most recent block, 2 = the one before it; fractions allowed)
    block_index: f64,

    /// Path to a configuration file (defaults to call-sync.toml, then the
    /// user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    };

    // The guard keeps the file appender flushing until the process ends.
    let _log_guard = match logging::init(&config.logging, &config.paths.log_directory) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    };

    if let Err(err) = run(cli, config).await {
        // Make the failure visible in the log stream before the process dies.
        tracing::error!(error = %format!("{err:#}"), "run aborted");
        eprintln!("Error: {err:#}");
        // exit() skips destructors; flush the file appender by hand.
        drop(_log_guard);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    // The window contract is checked before any network or database activity.
    let window =
        TimeWindow::from_block_index(cli.block_index, config.window.block_hours, Utc::now())?;

    let credentials = Credentials::load(&config.paths.credentials_file)?;

    let pipeline = SyncPipeline::new(config, credentials);
    pipeline.run(&window).await?;

    Ok(())
}
