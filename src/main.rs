//! Hearth CLI - vacation/home step execution engine

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use hearth::config::mask_token;
use hearth::{
    Engine, FixSuggestion, HearthConfig, HearthError, Mode, Run, StepCatalog, StepState,
};

/// How often `hearth run` polls for progress
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Hearth - vacation/home step execution engine for Home Assistant")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/hearth/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP control surface
    Serve {
        /// Listen address (overrides config)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Execute a mode and wait for it to finish
    Run {
        /// vacation or home
        mode: String,

        /// Log actions without calling Home Assistant
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the catalog and list the steps of a mode
    Steps {
        /// vacation or home
        mode: String,
    },

    /// Show away-mode state and the suggested mode
    Away,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<HearthError>()
            .and_then(|err| err.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => HearthConfig::load_from(path)?,
        None => HearthConfig::load()?,
    }
    .with_env();

    match cli.command {
        Commands::Serve { listen } => serve(&config, listen).await,
        Commands::Run { mode, dry_run } => run_mode(&config, &mode, dry_run).await,
        Commands::Steps { mode } => Ok(list_steps(&config, &mode)?),
        Commands::Away => Ok(show_away(&config).await?),
    }
}

async fn serve(config: &HearthConfig, listen: Option<String>) -> anyhow::Result<()> {
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let addr: SocketAddr = listen.parse().map_err(|e| HearthError::ConfigError {
        reason: format!("Invalid listen address '{}': {}", listen, e),
    })?;

    let engine = Engine::from_config(config)?;
    println!(
        "{} Home Assistant at {} (token {})",
        "→".cyan(),
        config.hass_url()?.cyan(),
        mask_token(config.hass_token()?, 6)
    );
    println!("{} Listening on http://{}", "→".cyan(), addr);

    hearth::server::serve(engine, addr).await
}

async fn run_mode(config: &HearthConfig, mode: &str, dry_run: bool) -> anyhow::Result<()> {
    let mode: Mode = mode.parse()?;
    let engine = Engine::from_config(config)?;

    let run_id = engine.start_execution(mode, dry_run)?;
    println!(
        "{} Run {} started ({}{})",
        "→".cyan(),
        run_id.cyan().bold(),
        mode,
        if dry_run { ", dry run" } else { "" }
    );

    let run = engine
        .wait_for(&run_id, POLL_INTERVAL)
        .await
        .ok_or_else(|| HearthError::RunNotFound {
            run_id: run_id.to_string(),
        })?;

    print_outcome(&run);

    let failed = run.failed();
    if failed > 0 {
        anyhow::bail!("{} of {} steps failed", failed, run.steps.len());
    }
    Ok(())
}

fn print_outcome(run: &Run) {
    for step in &run.steps {
        let attempts = if step.attempt > 1 {
            format!(" ({} attempts)", step.attempt)
        } else {
            String::new()
        };
        match step.status {
            StepState::Success => {
                println!("  {} {}{}", "✓".green(), step.alias, attempts.dimmed())
            }
            _ => {
                println!("  {} {}{}", "✗".red(), step.alias.red(), attempts.dimmed());
                if let Some(error) = &step.error {
                    println!("      {}", error.dimmed());
                }
            }
        }
    }
    println!(
        "{} {} succeeded, {} failed",
        "Done:".cyan().bold(),
        run.succeeded().to_string().green(),
        run.failed().to_string().red()
    );
}

fn list_steps(config: &HearthConfig, mode: &str) -> Result<(), HearthError> {
    let mode: Mode = mode.parse()?;
    let catalog = StepCatalog::load(&config.catalog_path())?;
    let steps = catalog.steps(mode);

    println!("{} {} steps for {}", "✓".green(), steps.len(), mode.as_str().bold());
    for (i, step) in steps.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            step.alias,
            format!("[{}, {} actions]", step.icon, step.actions.len()).dimmed()
        );
        for action in &step.actions {
            println!("       {} {}", "·".dimmed(), action.label());
        }
    }
    Ok(())
}

async fn show_away(config: &HearthConfig) -> Result<(), HearthError> {
    let engine = Engine::from_config(config)?;
    let away = engine.get_away_mode_state().await?;
    println!(
        "{} away mode is {}, suggested mode: {}",
        "→".cyan(),
        if away { "on".yellow() } else { "off".green() },
        Mode::suggested(away).as_str().bold()
    );
    Ok(())
}
