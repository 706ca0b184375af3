//! # clonescan CLI
//!
//! Compares a target codebase against comparison codebases and reports
//! identical and near-identical source files.
//!
//! ## Usage
//!
//! ```bash
//! clonescan [--config ./clonescan.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clonescan scan [TARGET] [COMPARISON...]` | Run a detection and print the report |
//! | `clonescan check-config` | Validate the config and print effective settings |
//! | `clonescan sources` | List configured corpora and whether they look usable |
//!
//! ## Examples
//!
//! ```bash
//! # Local target against a remote repository and a local checkout
//! clonescan scan ./service octo/upstream ../vendor-drop
//!
//! # JSON report, give up after ten minutes
//! clonescan scan https://github.com/octo/app ./suspect --json --timeout 600
//!
//! # Every checkout under ./stolen-repos is a comparison corpus
//! clonescan scan ./service --local-base ./stolen-repos
//!
//! # Use the corpora listed in the config file
//! clonescan scan --config ./clonescan.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clonescan::cancel::CancelToken;
use clonescan::config::{self, Config};
use clonescan::detect::run_detection;
use clonescan::progress::ProgressMode;
use clonescan::report::{render_json, render_summary};
use clonescan::source::local_base_corpora;
use clonescan::sources;

const DEFAULT_CONFIG: &str = "./clonescan.toml";

/// clonescan: find source files a target repository shares with others.
///
/// Configuration is read from `--config`, or `./clonescan.toml` when that
/// file exists, or built-in defaults otherwise.
#[derive(Parser)]
#[command(
    name = "clonescan",
    about = "Find identical and near-identical source files shared between repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a target corpus against comparison corpora.
    ///
    /// Each corpus is a local directory, `owner/repo`, or a GitHub URL.
    /// When omitted, corpora come from the `[corpora]` config section.
    Scan {
        /// Target corpus.
        target: Option<String>,

        /// Comparison corpora.
        comparisons: Vec<String>,

        /// Add every subdirectory of this path as a local comparison corpus.
        /// Overrides `[corpora].local_base`.
        #[arg(long)]
        local_base: Option<PathBuf>,

        /// Print the report as JSON instead of the text summary.
        #[arg(long)]
        json: bool,

        /// Cancel the run after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Progress output on stderr. Defaults to `human` on a TTY, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Validate the configuration and print the effective settings.
    CheckConfig,

    /// List configured corpora and their status.
    Sources,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => config::load_config(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => config::load_config(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("loading config {}", DEFAULT_CONFIG)),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            target,
            comparisons,
            local_base,
            json,
            timeout,
            progress,
        } => {
            let Some(target) = target.or_else(|| cfg.corpora.target.clone()) else {
                bail!("no target corpus: pass TARGET or set [corpora].target in the config");
            };
            let mut comparisons = if comparisons.is_empty() {
                cfg.corpora.comparisons.clone()
            } else {
                comparisons
            };
            let local_base =
                local_base.or_else(|| cfg.corpora.local_base.as_ref().map(PathBuf::from));
            if let Some(base) = local_base {
                let found = local_base_corpora(&base)
                    .with_context(|| format!("reading local base {}", base.display()))?;
                info!(base = %base.display(), corpora = found.len(), "expanded local base");
                comparisons.extend(found.iter().map(|dir| dir.display().to_string()));
            }
            if comparisons.is_empty() {
                warn!("no comparison corpora given; the report will be empty");
            }

            let cancel = CancelToken::new();
            spawn_interrupt_handler(cancel.clone());
            if let Some(secs) = timeout {
                spawn_deadline(cancel.clone(), Duration::from_secs(secs));
            }

            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            let report =
                run_detection(&cfg, &target, &comparisons, &cancel, mode.reporter()).await?;

            if json {
                println!("{}", render_json(&report).context("serializing report")?);
            } else {
                print!("{}", render_summary(&report));
            }
        }
        Commands::CheckConfig => {
            let risk = cfg.risk_thresholds()?;
            let extensions: Vec<&str> = cfg.scan.code_extensions.iter().map(String::as_str).collect();
            println!("Configuration OK");
            println!();
            println!("  Extensions:        {}", extensions.join(" "));
            println!("  Min file size:     {} chars", cfg.scan.min_file_size);
            match cfg.scan.max_files_per_corpus {
                Some(n) => println!("  Files per corpus:  {}", n),
                None => println!("  Files per corpus:  unbounded"),
            }
            println!(
                "  Similarity:        >= {} (high confidence >= {})",
                cfg.thresholds.similarity, cfg.thresholds.high_confidence
            );
            println!(
                "  Risk (T1..T4):     {} / {} / {} / {}  (preset: {})",
                risk.critical_identical,
                display_bound(risk.critical_high_confidence),
                risk.high_high_confidence,
                risk.medium_high_confidence,
                cfg.risk.preset.as_deref().unwrap_or("enhanced")
            );
            println!(
                "  Fetch:             {} concurrent, {}s timeout, {}s rate-limit backoff",
                cfg.fetch.max_concurrent_fetches,
                cfg.fetch.per_request_timeout_secs,
                cfg.fetch.rate_limit_backoff_secs
            );
        }
        Commands::Sources => {
            sources::list_sources(&cfg);
        }
    }

    Ok(())
}

fn display_bound(n: usize) -> String {
    if n == usize::MAX {
        "unbounded".to_string()
    } else {
        n.to_string()
    }
}

fn spawn_interrupt_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}

fn spawn_deadline(cancel: CancelToken, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        warn!(timeout_secs = after.as_secs(), "run timed out, cancelling");
        cancel.cancel();
    });
}
