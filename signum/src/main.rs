use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::Term;
use signum::cli::{Cli, Commands};
use signum::{commands, AppContext};
use signum_core::config::{AppEnvironment, EnvironmentKey, WorkspaceSettings};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Used when the build does not set `SIGNUM_BUNDLE_ID`.
const DEFAULT_BUNDLE_ID: &str = "app.signum.terminal";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file if present

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let environment = AppEnvironment::new()
        .with(EnvironmentKey::AppName, env!("CARGO_PKG_NAME"))
        .with(EnvironmentKey::Version, env!("CARGO_PKG_VERSION"))
        .with(
            EnvironmentKey::BundleId,
            option_env!("SIGNUM_BUNDLE_ID").unwrap_or(DEFAULT_BUNDLE_ID),
        )
        .overlay(|key| std::env::var(key).ok());
    // Nothing runs with incomplete metadata.
    environment
        .validate()
        .context("Application metadata is incomplete")?;
    debug!(
        "Starting {} {}",
        environment.get(EnvironmentKey::AppName)?,
        environment.get(EnvironmentKey::Version)?
    );

    let mut settings = WorkspaceSettings::default()
        .overlay(|key| std::env::var(key).ok())
        .context("Invalid workspace settings")?;
    if let Some(millis) = cli.analysis_delay_ms {
        settings.analysis_delay = Duration::from_millis(millis);
    }

    let cx = AppContext {
        environment,
        settings,
        interactive: Term::stdout().is_term() && Term::stderr().is_term(),
    };

    match cli.command {
        Commands::Import(args) => commands::handle_import(args, cx).await?,
        Commands::Inspect(args) => commands::handle_inspect(args).await?,
        Commands::Review(args) => commands::handle_review(args, cx).await?,
        Commands::Rename(args) => commands::handle_rename(args, cx).await?,
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    // RUST_LOG wins over the flags.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("signum={level},signum_core={level}")));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
