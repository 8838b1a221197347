//! Commit Sequencer.
//!
//! Consumes planned days one at a time, draws a commit count for each, and
//! issues the commits through a [`CommitSink`] strictly in order. The first
//! failing commit aborts the whole sequence.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::plan::TargetDay;

/// Inclusive range for the per-day commit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitBounds {
    min: u32,
    max: u32,
}

impl CommitBounds {
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min > max {
            return Err(Error::config(format!(
                "min commits per day ({min}) is greater than max ({max})"
            )));
        }
        Ok(CommitBounds { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Uniform draw in `min..=max`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.max)
    }
}

/// Subject line plus footer line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitMessage {
    subject: String,
    footer: String,
}

impl CommitMessage {
    pub fn new(subject: impl Into<String>, footer: impl Into<String>) -> Self {
        CommitMessage {
            subject: subject.into(),
            footer: footer.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    /// Paragraphs joined the way `git commit -m a -m b` joins them.
    pub fn to_git_message(&self) -> String {
        if self.footer.is_empty() {
            format!("{}\n", self.subject)
        } else {
            format!("{}\n\n{}\n", self.subject, self.footer)
        }
    }
}

/// Something that can record one empty commit at a given author date.
///
/// The git working copy implements this; tests use in-memory recorders.
pub trait CommitSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Make one empty commit on top of the current head and return its id.
    fn commit_empty(
        &mut self,
        message: &CommitMessage,
        when: DateTime<Utc>,
    ) -> std::result::Result<String, Self::Error>;
}

/// One commit to make: `index` is 1-based within the day's `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitUnit {
    pub day: TargetDay,
    pub index: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub days: usize,
    pub commits: usize,
}

/// A day paired with its drawn commit count, for dry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayPlan {
    pub day: TargetDay,
    pub commits: u32,
}

fn units(day: TargetDay, total: u32) -> impl Iterator<Item = CommitUnit> {
    (1..=total).map(move |index| CommitUnit { day, index, total })
}

/// Make every planned commit, one after another.
///
/// The count for each day is drawn once, when the day is reached. Commits
/// are issued in planner order and, within a day, in ascending index order;
/// each call to the sink completes before the next one starts.
///
/// # Errors
/// [`Error::CommitExecution`] from the first failing commit. Nothing after
/// it is attempted and commits already made are left in place.
pub fn run_sequence<I, S, R>(
    days: I,
    bounds: CommitBounds,
    message: &CommitMessage,
    sink: &mut S,
    rng: &mut R,
) -> Result<SequenceReport>
where
    I: IntoIterator<Item = TargetDay>,
    S: CommitSink + ?Sized,
    R: Rng + ?Sized,
{
    let mut report = SequenceReport::default();
    for day in days {
        let total = bounds.draw(rng);
        debug!(%day, total, "drew commit count");
        for unit in units(day, total) {
            let id = sink
                .commit_empty(message, unit.day.instant())
                .map_err(|source| Error::CommitExecution {
                    day: unit.day.instant(),
                    index: unit.index,
                    source: Box::new(source),
                })?;
            info!(
                "Successfully committed {} on {} ({} / {})",
                id, unit.day, unit.index, unit.total
            );
            report.commits += 1;
        }
        report.days += 1;
    }
    Ok(report)
}

/// Draw counts for every day without committing anything.
pub fn draw_plan<I, R>(days: I, bounds: CommitBounds, rng: &mut R) -> Vec<DayPlan>
where
    I: IntoIterator<Item = TargetDay>,
    R: Rng + ?Sized,
{
    days.into_iter()
        .map(|day| DayPlan {
            day,
            commits: bounds.draw(rng),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| l.trim().to_string())
                .collect()
        }
    }

    #[derive(Default)]
    struct Recorder {
        made: Vec<DateTime<Utc>>,
        fail_at: Option<usize>,
    }

    impl CommitSink for Recorder {
        type Error = io::Error;

        fn commit_empty(
            &mut self,
            _message: &CommitMessage,
            when: DateTime<Utc>,
        ) -> std::result::Result<String, io::Error> {
            if self.fail_at == Some(self.made.len()) {
                return Err(io::Error::other("index.lock exists"));
            }
            self.made.push(when);
            Ok(format!("{:07x}", self.made.len()))
        }
    }

    fn day(n: i64) -> TargetDay {
        TargetDay::new(Utc.with_ymd_and_hms(2024, 9, 15, 10, 0, 0).unwrap() - Duration::days(n))
    }

    fn message() -> CommitMessage {
        CommitMessage::new("subject", "footer")
    }

    #[test]
    fn bounds_reject_min_above_max() {
        assert!(matches!(
            CommitBounds::new(3, 2),
            Err(Error::Configuration(_))
        ));
        assert!(CommitBounds::new(0, 0).is_ok());
    }

    #[test]
    fn draws_stay_within_bounds() {
        let bounds = CommitBounds::new(2, 6).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 7];
        for _ in 0..1000 {
            let n = bounds.draw(&mut rng);
            assert!((2..=6).contains(&n));
            seen[n as usize] = true;
        }
        assert!(seen[2] && seen[6], "both ends of the range are reachable");
    }

    #[test]
    fn equal_bounds_always_draw_that_value() {
        let bounds = CommitBounds::new(4, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..100).all(|_| bounds.draw(&mut rng) == 4));
    }

    #[test]
    fn commits_follow_day_order_and_share_the_day_instant() {
        let days = vec![day(0), day(1), day(2)];
        let mut sink = Recorder::default();
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = CommitBounds::new(1, 3).unwrap();

        let report = run_sequence(days.clone(), bounds, &message(), &mut sink, &mut rng).unwrap();

        let plan = draw_plan(days.clone(), bounds, &mut StdRng::seed_from_u64(42));
        let expected: Vec<DateTime<Utc>> = plan
            .iter()
            .flat_map(|p| std::iter::repeat_n(p.day.instant(), p.commits as usize))
            .collect();
        assert_eq!(sink.made, expected);
        assert_eq!(report.days, 3);
        assert_eq!(report.commits, expected.len());
    }

    #[test]
    fn three_day_window_with_one_commit_each() {
        let days = vec![day(0), day(1), day(2)];
        let mut sink = Recorder::default();
        let report = run_sequence(
            days.clone(),
            CommitBounds::new(1, 1).unwrap(),
            &message(),
            &mut sink,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(report, SequenceReport { days: 3, commits: 3 });
        assert_eq!(
            sink.made,
            days.iter().map(|d| d.instant()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn first_failure_stops_everything_after_it() {
        let days = vec![day(0), day(1), day(2), day(3)];
        let mut sink = Recorder {
            fail_at: Some(3),
            ..Default::default()
        };
        let err = run_sequence(
            days,
            CommitBounds::new(2, 2).unwrap(),
            &message(),
            &mut sink,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();

        // Day 0 got both commits, day 1 only its first; days 2 and 3 untouched.
        assert_eq!(sink.made, vec![day(0).instant(), day(0).instant(), day(1).instant()]);
        match err {
            Error::CommitExecution { day: d, index, .. } => {
                assert_eq!(d, day(1).instant());
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_commit_days_make_no_calls() {
        let mut sink = Recorder::default();
        let report = run_sequence(
            vec![day(0), day(1)],
            CommitBounds::new(0, 0).unwrap(),
            &message(),
            &mut sink,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert!(sink.made.is_empty());
        assert_eq!(report, SequenceReport { days: 2, commits: 0 });
    }

    #[test]
    fn sequence_consumes_days_lazily() {
        let mut pulled = 0;
        let days = (0..10).map(|n| {
            pulled += 1;
            day(n)
        });
        let mut sink = Recorder {
            fail_at: Some(1),
            ..Default::default()
        };
        let res = run_sequence(
            days,
            CommitBounds::new(1, 1).unwrap(),
            &message(),
            &mut sink,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(res.is_err());
        assert_eq!(pulled, 2);
    }

    #[test]
    fn each_commit_logs_one_success_line() {
        let buf = LogBuffer::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .with_level(false)
            .with_target(false)
            .finish();

        let day = TargetDay::new(Utc.with_ymd_and_hms(2024, 9, 13, 0, 0, 0).unwrap());
        let mut sink = Recorder::default();
        tracing::subscriber::with_default(subscriber, || {
            run_sequence(
                vec![day],
                CommitBounds::new(2, 2).unwrap(),
                &message(),
                &mut sink,
                &mut StdRng::seed_from_u64(0),
            )
            .unwrap();
        });

        assert_eq!(
            buf.lines(),
            vec![
                "Successfully committed 0000001 on 2024-09-13T00:00:00.000Z (1 / 2)",
                "Successfully committed 0000002 on 2024-09-13T00:00:00.000Z (2 / 2)",
            ]
        );
    }

    #[test]
    fn git_message_joins_paragraphs() {
        assert_eq!(message().to_git_message(), "subject\n\nfooter\n");
        assert_eq!(CommitMessage::new("only", "").to_git_message(), "only\n");
    }
}
