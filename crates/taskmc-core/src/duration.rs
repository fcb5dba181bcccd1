use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const CALENDAR_DAY: u64 = 24 * HOUR;
const CALENDAR_MONTH: u64 = 30 * CALENDAR_DAY;
const CALENDAR_YEAR: u64 = 365 * CALENDAR_DAY;

pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;
pub const DEFAULT_DAYS_PER_WEEK: f64 = 5.0;

/// A span of time in whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Duration(u64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn from_secs(secs: u64) -> Self {
        Duration(secs)
    }

    pub const fn as_secs(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / HOUR;
        let minutes = (self.0 % HOUR) / MINUTE;
        let seconds = self.0 % MINUTE;
        let mut parts = Vec::new();
        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 || parts.is_empty() {
            parts.push(format!("{}s", seconds));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Length of a working day and a working week.
///
/// Shorthand durations such as `2d` or `1wk` are measured in working time, and
/// the projector uses the same calendar to spread working time over wall-clock
/// hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkCalendar {
    pub hours_per_day: f64,
    pub days_per_week: f64,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self {
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            days_per_week: DEFAULT_DAYS_PER_WEEK,
        }
    }
}

impl WorkCalendar {
    pub fn working_day_secs(&self) -> f64 {
        self.hours_per_day * HOUR as f64
    }

    pub fn working_week_secs(&self) -> f64 {
        self.days_per_week * self.working_day_secs()
    }

    /// Wall-clock seconds that elapse per second of working time.
    pub fn calendar_scale(&self) -> f64 {
        (7.0 / self.days_per_week) * (24.0 / self.hours_per_day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Empty duration")]
    Empty,
    #[error("Unrecognized duration: {0:?}")]
    Unrecognized(String),
    #[error("Unknown duration unit {unit:?} in {input:?}")]
    UnknownUnit { input: String, unit: String },
    #[error("Duration out of range: {0:?}")]
    Overflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    WorkDay,
    WorkWeek,
}

impl Unit {
    fn from_suffix(suffix: &str) -> Option<Unit> {
        match suffix.to_ascii_lowercase().as_str() {
            "" | "s" | "sec" | "secs" | "second" | "seconds" => Some(Unit::Second),
            "min" | "mins" | "minute" | "minutes" => Some(Unit::Minute),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Unit::Hour),
            "d" | "day" | "days" => Some(Unit::WorkDay),
            "w" | "wk" | "wks" | "week" | "weeks" => Some(Unit::WorkWeek),
            _ => None,
        }
    }
}

fn iso_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("regex")
    })
}

fn shorthand_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\s*([A-Za-z]*)$").expect("regex"))
}

/// Parse a duration string into whole seconds.
///
/// Accepted forms, tried in order:
/// - ISO-8601 style `P[n]Y[n]M[n]DT[n]H[n]M[n]S`, measured in calendar time
///   (a day is 24h, a month 30 days, a year 365 days).
/// - `<n><unit>` shorthand (`90min`, `3h`, `2d`, `1wk`), where days and weeks
///   are working days and working weeks of `calendar`.
/// - a bare integer, taken as seconds.
pub fn parse_duration(text: &str, calendar: &WorkCalendar) -> Result<Duration, FormatError> {
    let input = text.trim();
    if input.is_empty() {
        return Err(FormatError::Empty);
    }

    if input.starts_with('P') {
        return parse_iso(input);
    }

    let caps = shorthand_pattern()
        .captures(input)
        .ok_or_else(|| FormatError::Unrecognized(input.to_string()))?;
    let amount = caps
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse::<u64>()
        .map_err(|_| FormatError::Overflow(input.to_string()))?;
    let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let unit = Unit::from_suffix(suffix).ok_or_else(|| FormatError::UnknownUnit {
        input: input.to_string(),
        unit: suffix.to_string(),
    })?;

    let secs = match unit {
        Unit::Second => Some(amount),
        Unit::Minute => amount.checked_mul(MINUTE),
        Unit::Hour => amount.checked_mul(HOUR),
        Unit::WorkDay => scaled(amount, calendar.working_day_secs()),
        Unit::WorkWeek => scaled(amount, calendar.working_week_secs()),
    };
    secs.map(Duration)
        .ok_or_else(|| FormatError::Overflow(input.to_string()))
}

fn parse_iso(input: &str) -> Result<Duration, FormatError> {
    let caps = iso_pattern()
        .captures(input)
        .ok_or_else(|| FormatError::Unrecognized(input.to_string()))?;
    let weights = [
        (1, CALENDAR_YEAR),
        (2, CALENDAR_MONTH),
        (3, CALENDAR_DAY),
        (4, HOUR),
        (5, MINUTE),
        (6, 1),
    ];
    let mut total: u64 = 0;
    for (group, weight) in weights {
        let Some(field) = caps.get(group) else {
            continue;
        };
        let secs = field
            .as_str()
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(weight))
            .and_then(|value| total.checked_add(value))
            .ok_or_else(|| FormatError::Overflow(input.to_string()))?;
        total = secs;
    }
    Ok(Duration(total))
}

fn scaled(amount: u64, unit_secs: f64) -> Option<u64> {
    let secs = (amount as f64 * unit_secs).round();
    if secs.is_finite() && secs >= 0.0 && secs < u64::MAX as f64 {
        Some(secs as u64)
    } else {
        None
    }
}
