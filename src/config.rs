use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::git::Identity;
use crate::sequence::{CommitBounds, CommitMessage};

const DEFAULT_HOST: &str = "github.com";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_START_DATE: &str = "2024-09-13";
const DEFAULT_MAX_DAYS: i64 = 365;
const DEFAULT_FOOTER: &str = "Committed via greenwall";
const DEFAULT_CLONE_DIR: &str = "./clone";

/// How the Date Planner anchors the contribution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannerMode {
    /// `ceil((now - start) / 1 day)` days, walking back from now.
    #[default]
    NowAnchored,
    /// `max_days` days, walking forward from the origin.
    OriginAnchored,
}

impl FromStr for PlannerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "now-anchored" | "now" => Ok(PlannerMode::NowAnchored),
            "origin-anchored" | "origin" => Ok(PlannerMode::OriginAnchored),
            other => Err(Error::config(format!("unknown planner mode: {other}"))),
        }
    }
}

impl fmt::Display for PlannerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerMode::NowAnchored => f.write_str("now-anchored"),
            PlannerMode::OriginAnchored => f.write_str("origin-anchored"),
        }
    }
}

/// Raw, unvalidated settings as read from `greenwall.toml` and the environment.
///
/// Every field is optional so that the file and the environment can each
/// provide a subset. Resolution into [`RunConfig`] / [`RemoteConfig`] applies
/// defaults and validation.
///
/// Example TOML:
/// ```toml
/// repository = "octocat/hello"
/// email = "octocat@example.com"
/// commit_message = "chore: keep the lights on"
/// min_commits_per_day = 1
/// max_commits_per_day = 4
/// backfill = true
/// skip_weekends = true
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub actor: Option<String>,
    pub token: Option<String>,
    pub host: Option<String>,
    pub repository: Option<String>,
    pub email: Option<String>,
    pub ssh_command: Option<String>,
    pub branch: Option<String>,
    pub origin_timestamp: Option<i64>,
    pub start_date: Option<String>,
    pub mode: Option<PlannerMode>,
    pub max_days: Option<i64>,
    pub backfill: Option<bool>,
    pub skip_weekends: Option<bool>,
    pub force_push: Option<bool>,
    pub min_commits_per_day: Option<i64>,
    pub max_commits_per_day: Option<i64>,
    pub commit_message: Option<String>,
    pub commit_footer: Option<String>,
    pub clone_dir: Option<PathBuf>,
}

impl Settings {
    /// Parse a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&txt)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Overlay values found through `lookup` (normally `std::env::var`).
    ///
    /// Variables that are unset or empty leave the current value untouched.
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_ACTOR") {
            self.actor = Some(v);
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = get("GIT_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = get("GITHUB_REPOSITORY") {
            self.repository = Some(v);
        }
        if let Some(v) = get("GIT_EMAIL") {
            self.email = Some(v);
        }
        if let Some(v) = get("GIT_SSH_COMMAND") {
            self.ssh_command = Some(v);
        }
        if let Some(v) = get("GIT_BRANCH") {
            self.branch = Some(v);
        } else if let Some(v) = get("GITHUB_REF") {
            self.branch = Some(branch_from_ref(&v));
        }
        if let Some(v) = get("ORIGIN_TIMESTAMP") {
            self.origin_timestamp = Some(parse_int("ORIGIN_TIMESTAMP", &v)?);
        }
        if let Some(v) = get("START_DATE") {
            self.start_date = Some(v);
        }
        if let Some(v) = get("PLAN_MODE") {
            self.mode = Some(v.parse()?);
        }
        if let Some(v) = get("MAX_DAYS") {
            self.max_days = Some(parse_int("MAX_DAYS", &v)?);
        }
        if let Some(v) = get("BACKFILL") {
            self.backfill = Some(parse_flag(&v));
        }
        if let Some(v) = get("SKIP_WEEKENDS") {
            self.skip_weekends = Some(parse_flag(&v));
        }
        if let Some(v) = get("FORCE_PUSH") {
            self.force_push = Some(parse_flag(&v));
        }
        if let Some(v) = get("MIN_COMMITS_PER_DAY") {
            self.min_commits_per_day = Some(parse_int("MIN_COMMITS_PER_DAY", &v)?);
        }
        if let Some(v) = get("MAX_COMMITS_PER_DAY") {
            self.max_commits_per_day = Some(parse_int("MAX_COMMITS_PER_DAY", &v)?);
        }
        if let Some(v) = get("GIT_COMMIT_MESSAGE") {
            self.commit_message = Some(v);
        }
        if let Some(v) = get("GIT_COMMIT_FOOTER") {
            self.commit_footer = Some(v);
        }
        if let Some(v) = get("CLONE_DIR") {
            self.clone_dir = Some(PathBuf::from(v));
        }
        Ok(self)
    }
}

/// Load settings from an optional TOML file, then the process environment.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// [`load_settings`] with the environment read through `lookup`.
pub fn load_settings_with<F>(path: Option<&Path>, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match path {
        Some(p) => Settings::from_file(p)?,
        None => Settings::default(),
    };
    base.overlay_env(lookup)
}

/// Only the literal `true` (any case) enables a flag.
fn parse_flag(v: &str) -> bool {
    v.trim().eq_ignore_ascii_case("true")
}

fn parse_int(key: &str, v: &str) -> Result<i64> {
    v.trim()
        .parse::<i64>()
        .map_err(|_| Error::config(format!("{key} is not an integer: {v:?}")))
}

fn branch_from_ref(r: &str) -> String {
    let re = Regex::new(r"^refs/heads/").expect("static regex");
    re.replace(r, "").into_owned()
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| Error::config(format!("invalid date: {s}")));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::config(format!("invalid timestamp {s:?}: {e}")))
}

/// Immutable configuration of one run.
///
/// Built once at startup and handed by reference to the planner and the
/// sequencer; nothing mutates it afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub origin: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub mode: PlannerMode,
    pub backfill: bool,
    pub skip_weekends: bool,
    pub max_days: i64,
    pub bounds: CommitBounds,
    pub message: CommitMessage,
    pub branch: String,
    pub force_push: bool,
    pub clone_dir: PathBuf,
}

impl RunConfig {
    /// Apply defaults to `s` and validate the result against `now`.
    pub fn resolve(s: &Settings, now: DateTime<Utc>) -> Result<Self> {
        let origin = match s.origin_timestamp {
            Some(ts) => DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| Error::config(format!("ORIGIN_TIMESTAMP out of range: {ts}")))?,
            None => now,
        };
        let start = parse_instant(s.start_date.as_deref().unwrap_or(DEFAULT_START_DATE))?;

        let min = s.min_commits_per_day.unwrap_or(1);
        let max = s.max_commits_per_day.unwrap_or(1);
        let bounds = CommitBounds::new(
            to_count("MIN_COMMITS_PER_DAY", min)?,
            to_count("MAX_COMMITS_PER_DAY", max)?,
        )?;

        let subject = s
            .commit_message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| Error::config("GIT_COMMIT_MESSAGE is required"))?;
        let footer = s
            .commit_footer
            .clone()
            .unwrap_or_else(|| DEFAULT_FOOTER.to_string());

        let branch = s
            .branch
            .clone()
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        if branch.trim().is_empty() {
            return Err(Error::config("branch name is empty"));
        }

        let max_days = s.max_days.unwrap_or(DEFAULT_MAX_DAYS);
        if max_days < 0 {
            return Err(Error::config(format!(
                "MAX_DAYS must not be negative: {max_days}"
            )));
        }

        Ok(RunConfig {
            origin,
            start,
            now,
            mode: s.mode.unwrap_or_default(),
            backfill: s.backfill.unwrap_or(false),
            skip_weekends: s.skip_weekends.unwrap_or(false),
            max_days,
            bounds,
            message: CommitMessage::new(subject, footer),
            branch,
            force_push: s.force_push.unwrap_or(false),
            clone_dir: s
                .clone_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLONE_DIR)),
        })
    }
}

fn to_count(key: &str, v: i64) -> Result<u32> {
    u32::try_from(v)
        .map_err(|_| Error::config(format!("{key} must be between 0 and {}: {v}", u32::MAX)))
}

/// Where to publish and as whom.
#[derive(Clone)]
pub struct RemoteConfig {
    pub actor: String,
    pub token: String,
    pub host: String,
    pub repository: String,
    pub email: String,
    pub ssh_command: Option<String>,
}

impl RemoteConfig {
    pub fn resolve(s: &Settings) -> Result<Self> {
        let required = |v: &Option<String>, key: &str| {
            v.clone()
                .ok_or_else(|| Error::config(format!("{key} is required")))
        };
        let repository = required(&s.repository, "GITHUB_REPOSITORY")?;
        let re = Regex::new(r"^[\w.-]+/[\w.-]+$").expect("static regex");
        if !re.is_match(&repository) {
            return Err(Error::config(format!(
                "GITHUB_REPOSITORY must look like owner/name: {repository}"
            )));
        }

        Ok(RemoteConfig {
            actor: required(&s.actor, "GITHUB_ACTOR")?,
            token: required(&s.token, "GITHUB_TOKEN")?,
            host: s.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            repository,
            email: required(&s.email, "GIT_EMAIL")?,
            ssh_command: s.ssh_command.clone(),
        })
    }

    /// Authenticated HTTPS URL. Never log this; use [`RemoteConfig::redacted_url`].
    pub fn url(&self) -> String {
        format!(
            "https://{}:{}@{}/{}",
            self.actor, self.token, self.host, self.repository
        )
    }

    pub fn redacted_url(&self) -> String {
        format!("https://{}:***@{}/{}", self.actor, self.host, self.repository)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            name: self.actor.clone(),
            email: self.email.clone(),
            ssh_command: self.ssh_command.clone(),
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("actor", &self.actor)
            .field("token", &"***")
            .field("host", &self.host)
            .field("repository", &self.repository)
            .field("email", &self.email)
            .field("ssh_command", &self.ssh_command)
            .finish()
    }
}
