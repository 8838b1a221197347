//! Crate entry point for **greenwall**.
//!
//! Plans a window of calendar days, makes a random number of empty,
//! backdated commits for each of them in a local working copy, and pushes
//! the result to a branch. The `greenwall` binary is a thin clap wrapper
//! around the `cmd_*` functions re-exported here.

mod config;
mod error;
mod git;
mod plan;
mod progress;
mod run;
mod sequence;

pub use config::{
    PlannerMode, RemoteConfig, RunConfig, Settings, load_settings, load_settings_with,
    parse_instant,
};
pub use error::{Error, Result};
pub use git::{Credentials, Identity, Workspace};
pub use plan::{TargetDay, TargetDays, plan_days};
pub use run::{PublishTarget, cmd_config, cmd_plan, cmd_run, execute};
pub use sequence::{
    CommitBounds, CommitMessage, CommitSink, CommitUnit, DayPlan, SequenceReport, draw_plan,
    run_sequence,
};
