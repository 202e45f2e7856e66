// FPL manager entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (stderr; stdout carries the recommendation report)
// 3. Load config, applying the --mode override
// 4. Run the pipeline, or the account diagnostic

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use fpl_manager::app::{self, DecisionPhase};
use fpl_manager::config;
use fpl_manager::diagnose;
use fpl_manager::engine::decision::AutonomyMode;

#[derive(Debug, Parser)]
#[command(name = "fpl-manager", version, about = "Fantasy Premier League transfer manager")]
struct Cli {
    /// Override the configured autonomy mode (suggest, hybrid or auto).
    #[arg(long)]
    mode: Option<AutonomyMode>,

    /// Directory holding config/ and defaults/.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check login, account entry id and team access.
    Diagnose,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("FPL manager starting up");

    let mut config =
        config::load_config(&cli.base_dir).context("failed to load configuration")?;
    if let Some(mode) = cli.mode {
        config.manager.mode = mode;
    }
    info!(
        team_id = config.manager.team_id,
        mode = %config.manager.mode,
        "Config loaded"
    );

    match cli.command {
        Some(Command::Diagnose) => {
            let steps = diagnose::run(&config).await?;
            for step in steps {
                println!("OK: {step:?}");
            }
        }
        None => {
            let report = app::run(&config).await?;
            if let DecisionPhase::DecisionFailed(reason) = &report.decision {
                eprintln!("Decision phase failed: {reason}");
            }
            info!(
                summarized = report.summary.logged.len(),
                "FPL manager run complete"
            );
        }
    }

    Ok(())
}

/// Initialize tracing to stderr.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fpl_manager=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
