//! HTTP date parsing for freshness comparison.
//!
//! Dates are folded into a single ordinal with fixed per-unit weights (a year
//! is 31 556 926 s, a month 2 629 744 s). The ordinal orders dates but is not
//! a timestamp: it only has to agree with itself.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

const YEAR: i64 = 31_556_926;
const MONTH: i64 = 2_629_744;
const DAY: i64 = 86_400;
const HOUR: i64 = 3_600;
const MINUTE: i64 = 60;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Errors from parsing an HTTP date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("date {0:?} is missing fields")]
    MissingField(String),

    #[error("unknown month {0:?}")]
    Month(String),

    #[error("invalid or out-of-range number {0:?}")]
    Number(String),
}

/// A parsed `<Wkday>, <DD> <Mon> <YYYY> <HH>:<MM>:<SS> <TZ>` date.
///
/// Equality and ordering go through [`HttpDate::ordinal`] only.
#[derive(Debug, Clone, Copy)]
pub struct HttpDate {
    pub year: i64,
    /// 1-based month.
    pub month: i64,
    pub day: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl HttpDate {
    /// Parse a date. Weekday and zone are not checked.
    pub fn parse(value: &str) -> Result<Self, DateError> {
        let missing = || DateError::MissingField(value.to_string());
        let fields: Vec<&str> = value.split_whitespace().collect();
        let (day, month, year, clock) = match fields.as_slice() {
            [_, day, month, year, clock, ..] => (*day, *month, *year, *clock),
            _ => return Err(missing()),
        };

        let month = MONTHS
            .iter()
            .position(|name| *name == month)
            .ok_or_else(|| DateError::Month(month.to_string()))?;

        let mut clock = clock.split(':');
        let mut next_clock = |max| {
            clock
                .next()
                .ok_or_else(missing)
                .and_then(|field| number(field, 0..=max))
        };
        let (hours, minutes, seconds) = (next_clock(23)?, next_clock(59)?, next_clock(60)?);

        Ok(Self {
            year: number(year, 0..=9999)?,
            month: month as i64 + 1,
            day: number(day, 1..=31)?,
            hours,
            minutes,
            seconds,
        })
    }

    /// Scalar used for every comparison.
    pub fn ordinal(&self) -> i64 {
        self.year * YEAR
            + self.month * MONTH
            + self.day * DAY
            + self.hours * HOUR
            + self.minutes * MINUTE
            + self.seconds
    }
}

/// Parse a numeric field, rejecting values outside `range`.
///
/// Bounding every field keeps [`HttpDate::ordinal`] far from overflow.
fn number(field: &str, range: RangeInclusive<i64>) -> Result<i64, DateError> {
    field
        .parse()
        .ok()
        .filter(|value| range.contains(value))
        .ok_or_else(|| DateError::Number(field.to_string()))
}

impl FromStr for HttpDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for HttpDate {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal() == other.ordinal()
    }
}

impl Eq for HttpDate {}

impl PartialOrd for HttpDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HttpDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl fmt::Display for HttpDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02} {} {:04} {:02}:{:02}:{:02}",
            self.day,
            MONTHS.get((self.month - 1) as usize).copied().unwrap_or("???"),
            self.year,
            self.hours,
            self.minutes,
            self.seconds
        )
    }
}
