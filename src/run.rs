use anyhow::Result as AnyResult;
use colored::Colorize;
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::{RemoteConfig, RunConfig};
use crate::error::{Error, Result};
use crate::git::{Credentials, Identity, Workspace};
use crate::plan::plan_days;
use crate::progress::with_spinner;
use crate::sequence::{SequenceReport, draw_plan, run_sequence};

/// Where a run publishes to and as whom.
#[derive(Clone)]
pub struct PublishTarget {
    /// URL handed to git, possibly with embedded credentials.
    pub url: String,
    /// URL safe to print.
    pub display_url: String,
    pub identity: Identity,
    pub creds: Option<Credentials>,
}

impl From<&RemoteConfig> for PublishTarget {
    fn from(remote: &RemoteConfig) -> Self {
        PublishTarget {
            url: remote.url(),
            display_url: remote.redacted_url(),
            identity: remote.identity(),
            creds: Some(Credentials {
                username: remote.actor.clone(),
                password: remote.token.clone(),
            }),
        }
    }
}

/// The working copy must be new or empty; it is owned by this run alone.
fn prepare_dir(path: &Path) -> Result<()> {
    if path.exists() {
        let mut entries = fs::read_dir(path)
            .map_err(|e| Error::workspace(format!("read {}", path.display()), e))?;
        if entries.next().is_some() {
            return Err(Error::workspace(
                format!("prepare {}", path.display()),
                "working copy directory already exists and is not empty",
            ));
        }
    }
    fs::create_dir_all(path)
        .map_err(|e| Error::workspace(format!("mkdir {}", path.display()), e))
}

/// Full pipeline: plan, prepare the working copy, commit, push.
///
/// 1. Plan the days (configuration errors surface before touching disk).
/// 2. Create the working copy directory.
/// 3. `init` when force-pushing, otherwise single-branch `clone` of the target branch.
/// 4. Write the committer identity.
/// 5. Run the commit sequence.
/// 6. Push HEAD to the target branch, forced if configured.
pub fn execute<R: Rng + ?Sized>(
    cfg: &RunConfig,
    target: &PublishTarget,
    rng: &mut R,
) -> Result<SequenceReport> {
    let days = plan_days(cfg)?;
    prepare_dir(&cfg.clone_dir)?;

    let mut ws = if cfg.force_push {
        info!(path = %cfg.clone_dir.display(), "initializing fresh working copy");
        Workspace::init(&cfg.clone_dir)?
    } else {
        with_spinner(
            format!("cloning {} ({})", target.display_url, cfg.branch),
            || {
                Workspace::clone(
                    &target.url,
                    &cfg.clone_dir,
                    &cfg.branch,
                    target.creds.as_ref(),
                )
            },
        )?
    };
    ws.configure(target.identity.clone())?;

    let report = run_sequence(days, cfg.bounds, &cfg.message, &mut ws, rng)?;
    info!(
        days = report.days,
        commits = report.commits,
        "commit sequence finished"
    );

    with_spinner(
        format!("pushing HEAD to {} ({})", target.display_url, cfg.branch),
        || ws.push(&target.url, &cfg.branch, cfg.force_push, target.creds.as_ref()),
    )?;
    info!(branch = %cfg.branch, force = cfg.force_push, "pushed");
    Ok(report)
}

/// CLI command: run the whole pipeline against the configured remote.
pub fn cmd_run<R: Rng + ?Sized>(
    cfg: &RunConfig,
    remote: &RemoteConfig,
    rng: &mut R,
) -> AnyResult<()> {
    let target = PublishTarget::from(remote);
    execute(cfg, &target, rng)?;
    Ok(())
}

/// CLI command: show the planned days and drawn commit counts without
/// touching any repository.
///
/// Example output:
/// ```text
/// 2024-09-15T10:00:00.000Z Sun 3 commits
/// 2024-09-14T10:00:00.000Z Sat 1 commit
/// 2 days, 4 commits
/// ```
pub fn cmd_plan<R: Rng + ?Sized>(cfg: &RunConfig, json: bool, rng: &mut R) -> AnyResult<()> {
    let plan = draw_plan(plan_days(cfg)?, cfg.bounds, rng);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let mut total = 0u64;
    for p in &plan {
        total += u64::from(p.commits);
        let weekday = p.day.instant().format("%a").to_string();
        println!(
            "{} {} {}",
            p.day,
            weekday.cyan(),
            plural(u64::from(p.commits), "commit").green()
        );
    }
    println!(
        "{}, {}",
        plural(plan.len() as u64, "day"),
        plural(total, "commit")
    );
    Ok(())
}

/// CLI command: print the resolved configuration as JSON, token redacted.
///
/// A remote that fails to resolve is reported with its error instead of
/// failing the command, since `plan` does not need one.
pub fn cmd_config(cfg: &RunConfig, remote: &Result<RemoteConfig>) -> AnyResult<()> {
    println!("{}", serde_json::to_string_pretty(cfg)?);
    println!("{}", describe_remote(remote));
    Ok(())
}

fn describe_remote(remote: &Result<RemoteConfig>) -> String {
    match remote {
        Ok(r) => format!("remote: {} ({} <{}>)", r.redacted_url(), r.actor, r.email),
        Err(e) => format!("remote: {e}"),
    }
}

fn plural(n: u64, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}
