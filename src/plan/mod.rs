//! Date Planner.
//!
//! Turns a [`RunConfig`] into the ordered, lazily generated list of days
//! that should receive commits. Pure: no I/O and no randomness.

mod calendar;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::config::{PlannerMode, RunConfig};
use crate::error::{Error, Result};

pub use calendar::{day_span, is_weekend};

/// A day selected to receive commits. Every commit for it uses this exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetDay(DateTime<Utc>);

impl TargetDay {
    pub fn new(instant: DateTime<Utc>) -> Self {
        TargetDay(instant)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }
}

/// RFC 3339 in UTC with milliseconds, e.g. `2024-09-13T00:00:00.000Z`.
impl fmt::Display for TargetDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Serialized with the same text as [`fmt::Display`], so dry-run output
/// matches the commit log.
impl Serialize for TargetDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// `anchor - offset`: most recent first.
    Backward,
    /// `anchor + offset`: origin forward.
    Forward,
}

/// Lazy, finite iterator over the planned days.
///
/// Weekend filtering happens while iterating, so `size_hint` only gives an
/// upper bound.
#[derive(Debug, Clone)]
pub struct TargetDays {
    anchor: DateTime<Utc>,
    direction: Direction,
    next_offset: i64,
    len: i64,
    skip_weekends: bool,
}

impl TargetDays {
    fn new(
        anchor: DateTime<Utc>,
        direction: Direction,
        len: i64,
        skip_weekends: bool,
    ) -> Result<Self> {
        if len < 0 {
            return Err(Error::config(format!("negative day count: {len}")));
        }
        let days = TargetDays {
            anchor,
            direction,
            next_offset: 0,
            len,
            skip_weekends,
        };
        // Reject windows whose far end is not representable up front, so
        // iteration itself cannot fail.
        if len > 0 && days.day_at(len - 1).is_none() {
            return Err(Error::config(format!(
                "{len} days from {} leaves the supported date range",
                anchor.to_rfc3339()
            )));
        }
        Ok(days)
    }

    fn day_at(&self, offset: i64) -> Option<DateTime<Utc>> {
        let delta = TimeDelta::try_days(offset)?;
        match self.direction {
            Direction::Backward => self.anchor.checked_sub_signed(delta),
            Direction::Forward => self.anchor.checked_add_signed(delta),
        }
    }

    /// Day count before weekend filtering.
    pub fn unfiltered_len(&self) -> i64 {
        self.len
    }
}

impl Iterator for TargetDays {
    type Item = TargetDay;

    fn next(&mut self) -> Option<TargetDay> {
        while self.next_offset < self.len {
            let offset = self.next_offset;
            self.next_offset += 1;
            let instant = self.day_at(offset)?;
            if self.skip_weekends && is_weekend(instant) {
                continue;
            }
            return Some(TargetDay(instant));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.len - self.next_offset).unwrap_or(0);
        if self.skip_weekends {
            (0, Some(remaining))
        } else {
            (remaining, Some(remaining))
        }
    }
}

/// Plan the days for a run.
///
/// - `NowAnchored`: `ceil((now - start) / 1 day)` days, `now - offset`.
/// - `OriginAnchored`: `max_days` days, `origin + offset`.
///
/// With `backfill` disabled both modes target a single day, offset 0.
///
/// # Errors
/// [`Error::Configuration`] when `start` is after `now`, when `max_days`
/// is negative, or when the window leaves chrono's date range.
pub fn plan_days(cfg: &RunConfig) -> Result<TargetDays> {
    let (anchor, direction, len) = match cfg.mode {
        PlannerMode::NowAnchored => {
            let len = if cfg.backfill {
                day_span(cfg.start, cfg.now)?
            } else {
                1
            };
            (cfg.now, Direction::Backward, len)
        }
        PlannerMode::OriginAnchored => {
            let len = if cfg.backfill { cfg.max_days } else { 1 };
            (cfg.origin, Direction::Forward, len)
        }
    };
    tracing::debug!(
        mode = %cfg.mode,
        anchor = %anchor.to_rfc3339(),
        days = len,
        skip_weekends = cfg.skip_weekends,
        "planned contribution window"
    );
    TargetDays::new(anchor, direction, len, cfg.skip_weekends)
}
