//! # greenwall
//!
//! Fills a contribution graph with empty, backdated commits.
//!
//! Features:
//! - `greenwall run` clones (or inits) the target branch, commits, and pushes
//! - `greenwall plan` prints the days and commit counts a run would use
//! - `greenwall config` prints the resolved configuration
//!
//! Settings come from an optional TOML file (`--config`) overridden by the
//! environment (`GITHUB_ACTOR`, `GIT_COMMIT_MESSAGE`, `BACKFILL`, ...).

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use greenwall::{RemoteConfig, RunConfig, cmd_config, cmd_plan, cmd_run, load_settings, parse_instant};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "greenwall",
    version,
    about = "greenwall - populate a contribution graph with backdated empty commits",
    arg_required_else_help = true
)]
struct Cli {
    /// TOML settings file; environment variables take precedence
    #[arg(long, global = true, env = "GREENWALL_CONFIG")]
    config: Option<PathBuf>,

    /// Reference instant instead of the current time (YYYY-MM-DD or RFC 3339)
    #[arg(long, global = true)]
    now: Option<String>,

    /// Seed for the commit-count generator (reproducible plans)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Commit across the planned days and push to the target branch
    Run,
    /// Print planned days and drawn commit counts without committing
    Plan {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration (token redacted)
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(cmd) = cli.cmd else {
        return Ok(());
    };

    let now = match cli.now.as_deref() {
        Some(s) => parse_instant(s).context("invalid --now")?,
        None => Utc::now(),
    };
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let settings = load_settings(cli.config.as_deref())?;
    let cfg = RunConfig::resolve(&settings, now)?;

    match cmd {
        Cmd::Run => {
            let remote = RemoteConfig::resolve(&settings)?;
            cmd_run(&cfg, &remote, &mut rng)
        }
        Cmd::Plan { json } => cmd_plan(&cfg, json, &mut rng),
        Cmd::Config => cmd_config(&cfg, &RemoteConfig::resolve(&settings)),
    }
}
