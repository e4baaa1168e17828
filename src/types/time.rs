//! Time-of-day codec.
//!
//! Card times are plain millisecond offsets from local midnight. There is no
//! date component: a rally is assumed to run within a single day, so an
//! arrival that falls after 24:00 cannot be represented.

use chrono::{NaiveTime, Timelike};

use crate::{RallyError, Result};

/// Milliseconds, either an offset from local midnight or a duration.
pub type Millis = i64;

/// Sentinel for "not set". Shares its value with exact midnight.
pub const UNSET: Millis = 0;

pub const MS_PER_SECOND: Millis = 1_000;
pub const MS_PER_MINUTE: Millis = 60_000;
pub const MS_PER_HOUR: Millis = 3_600_000;
pub const MS_PER_DAY: Millis = 86_400_000;

/// Largest representable time of day (23:59:59.999).
pub const MAX_TIME_OF_DAY: Millis = MS_PER_DAY - 1;

/// A time of day split into display components.
///
/// `fraction` stays in milliseconds but is rounded to two significant digits,
/// so 456 ms becomes 460 and is shown as "46".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeParts {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub fraction: i64,
}

impl TimeParts {
    /// Two-digit hundredths for display.
    ///
    /// Clamped to 99. A fraction that rounded up to a whole second has to be
    /// carried first, as [`format_time_precise`] does.
    pub fn hundredths(&self) -> i64 {
        (self.fraction / 10).min(99)
    }

    /// Recompose into milliseconds.
    pub fn to_ms(self) -> Millis {
        parts_to_ms(self.hours, self.minutes, self.seconds, self.fraction)
    }
}

/// Split a millisecond offset into hours, minutes, seconds and a rounded fraction.
pub fn ms_to_parts(ms: Millis) -> TimeParts {
    TimeParts {
        hours: ms.rem_euclid(MS_PER_DAY) / MS_PER_HOUR,
        minutes: ms.rem_euclid(MS_PER_HOUR) / MS_PER_MINUTE,
        seconds: ms.rem_euclid(MS_PER_MINUTE) / MS_PER_SECOND,
        fraction: round_two_significant(ms.rem_euclid(MS_PER_SECOND)),
    }
}

/// Compose a millisecond offset. `fraction` is added as milliseconds.
pub fn parts_to_ms(hours: i64, minutes: i64, seconds: i64, fraction: i64) -> Millis {
    hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + seconds * MS_PER_SECOND + fraction
}

/// Round a sub-second remainder (0..1000) to two significant digits, half up.
///
/// Remainders below 100 already have at most two significant digits and are
/// returned unchanged. 995 and above round up to 1000.
pub fn round_two_significant(remainder: Millis) -> Millis {
    if remainder < 100 { remainder } else { (remainder + 5) / 10 * 10 }
}

/// Whether `ms` survives `ms_to_parts` followed by `parts_to_ms` unchanged.
pub fn round_trips_exactly(ms: Millis) -> bool {
    let remainder = ms.rem_euclid(MS_PER_SECOND);
    remainder < 100 || remainder % 10 == 0
}

/// Milliseconds since local midnight for a wall-clock time, truncated to whole seconds.
pub fn ms_from_midnight<T: Timelike>(time: &T) -> Millis {
    parts_to_ms(i64::from(time.hour()), i64::from(time.minute()), i64::from(time.second()), 0)
}

/// Check that a value lies inside the single-day range.
pub fn validate_time_of_day(field: &str, value: Millis) -> Result<Millis> {
    if (0..=MAX_TIME_OF_DAY).contains(&value) {
        Ok(value)
    } else {
        Err(RallyError::invalid_time(field, value))
    }
}

/// Format as `HH:MM:SS`.
pub fn format_time(ms: Millis) -> String {
    let parts = ms_to_parts(ms);
    format!("{:02}:{:02}:{:02}", parts.hours, parts.minutes, parts.seconds)
}

/// Format as `HH:MM:SS.hh`.
pub fn format_time_precise(ms: Millis) -> String {
    let mut parts = ms_to_parts(ms);
    if parts.fraction >= MS_PER_SECOND {
        parts = ms_to_parts(parts.to_ms());
    }
    format!(
        "{:02}:{:02}:{:02}.{:02}",
        parts.hours,
        parts.minutes,
        parts.seconds,
        parts.hundredths()
    )
}

/// Parse `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff` into milliseconds since midnight.
pub fn parse_time(input: &str) -> Result<Millis> {
    let trimmed = input.trim();
    let time = NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|err| {
            RallyError::parse("time of day", format!("'{input}' is not HH:MM[:SS[.fff]]: {err}"))
        })?;
    let millis = i64::from(time.nanosecond() / 1_000_000).min(999);
    Ok(ms_from_midnight(&time) + millis)
}
