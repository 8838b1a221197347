use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures a run can end with.
///
/// Every variant is fatal: nothing in the crate retries. The CLI maps any
/// of them to a non-zero exit status.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or contradictory settings. Raised before any commit is made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Preparing the working copy (mkdir, clone, init, config) failed.
    #[error("workspace error: {context}: {source}")]
    Workspace {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("commit {index} on {day} failed: {source}")]
    CommitExecution {
        day: DateTime<Utc>,
        index: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("push failed: {0}")]
    Publish(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn workspace(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Workspace {
            context: context.into(),
            source: source.into(),
        }
    }
}
