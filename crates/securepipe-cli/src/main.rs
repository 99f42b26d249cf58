mod display;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use securepipe_core::{CancelToken, Config, Pipeline};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "securepipe",
    version,
    about = "SecurePipe — Lightweight DevSecOps Security Scanner",
    long_about = "Run Bandit and Checkov against a local repository and summarize what they found.\n\nReports and console logs are written to the reports directory on every run."
)]
struct Cli {
    /// Config file (defaults to $SECUREPIPE_CONFIG, then ./.securepipe.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a repository with every enabled scanner
    Scan {
        /// Path to local repo directory
        #[arg(long = "repo", value_name = "PATH")]
        repo: PathBuf,

        /// Directory for reports and console logs
        #[arg(long)]
        reports_dir: Option<PathBuf>,

        /// Per-scanner timeout in seconds (0 disables)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Run scanners concurrently
        #[arg(long)]
        parallel: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Serve the HTTP scan trigger
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Scan {
            repo,
            reports_dir,
            timeout,
            parallel,
            format,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(dir) = reports_dir {
                config.reports_dir = dir;
            }
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            config.parallel |= parallel;
            cmd_scan(&repo, &config, &format).await
        }
        Commands::Serve { host, port } => {
            server::serve(&host, port, cli.config.clone(), cli.verbose).await
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "securepipe=debug,securepipe_core=debug"
    } else {
        "securepipe=info,securepipe_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::discover(path).context("Failed to load configuration")
}

async fn cmd_scan(repo: &Path, config: &Config, format: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config);
    let cancel = CancelToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping scanners");
            on_interrupt.cancel();
        }
    });

    let summary = pipeline
        .run(repo, &cancel)
        .await
        .with_context(|| format!("Scan of '{}' could not run", repo.display()))?;

    match format {
        "json" => display::print_scan_summary_json(&summary)?,
        _ => display::print_scan_summary(&summary),
    }

    Ok(())
}
