//! Git integration layer.
//!
//! Wraps the `git2` backend behind [`Workspace`], the only type the rest of
//! the crate talks to. It implements [`crate::sequence::CommitSink`] so the
//! sequencer never sees `git2` directly.

mod git2_backend;

pub use git2_backend::{Credentials, Identity, Workspace};
