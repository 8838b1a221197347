use chrono::{DateTime, Datelike, Utc, Weekday};

use crate::error::{Error, Result};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Number of whole-or-partial days between `start` and `now`, rounded up.
///
/// Exactly 48h gives 2, 48h plus one millisecond gives 3. A `start` after
/// `now` is a configuration error.
pub fn day_span(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<i64> {
    let ms = (now - start).num_milliseconds();
    if ms < 0 {
        return Err(Error::config(format!(
            "start date {} is after now ({})",
            start.to_rfc3339(),
            now.to_rfc3339()
        )));
    }
    Ok((ms + DAY_MS - 1) / DAY_MS)
}

/// Saturday or Sunday, by UTC weekday.
pub fn is_weekend(t: DateTime<Utc>) -> bool {
    matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn span_rounds_partial_days_up() {
        assert_eq!(day_span(at(2024, 9, 13, 0), at(2024, 9, 15, 0)).unwrap(), 2);
        assert_eq!(day_span(at(2024, 9, 13, 0), at(2024, 9, 15, 1)).unwrap(), 3);
        assert_eq!(day_span(at(2024, 9, 13, 0), at(2024, 9, 13, 0)).unwrap(), 0);
    }

    #[test]
    fn span_rejects_future_start() {
        let err = day_span(at(2024, 9, 16, 0), at(2024, 9, 15, 0)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn weekend_is_saturday_and_sunday() {
        // 2024-09-14 is a Saturday.
        assert!(!is_weekend(at(2024, 9, 13, 12)));
        assert!(is_weekend(at(2024, 9, 14, 0)));
        assert!(is_weekend(at(2024, 9, 15, 23)));
        assert!(!is_weekend(at(2024, 9, 16, 0)));
    }
}
