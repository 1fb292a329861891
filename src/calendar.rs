//! Calendar anchoring and month-index arithmetic
//!
//! Every relative index in the crate is measured against a [`MonthAnchor`]:
//! a (year, month) pair pinned to 00:00 UTC on the first of the month.
//! Inputs are normalized before any comparison, so day components and local
//! offsets never leak into an index.
//!
//! Year-end convention: the value "at the end of year Y" is sampled at the
//! first month of Y+1 ([`year_end_month_index`]). Sampling at December of Y
//! instead is off by one month.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Zero-based month offset from a simulation start anchor
pub type MonthIndex = i64;

/// `YYYY-MM` with an optional `-DD`; a trailing time part is ignored
static ISO_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})(?:-(\d{2}))?").expect("ISO date pattern is valid")
});

/// Day-first `DD.MM.YYYY`
static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})\.(\d{2})\.(\d{4})").expect("day-first date pattern is valid")
});

/// A calendar month normalized to its first instant in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthAnchor {
    year: i32,
    /// 1-12
    month: u32,
}

impl MonthAnchor {
    /// Returned by [`normalize_to_month_start`] when the input cannot be read.
    /// Treat it as "unknown", never as a real month zero.
    pub const EPOCH: MonthAnchor = MonthAnchor { year: 1970, month: 1 };

    /// Earliest representable month; offsets below it saturate here
    pub const MIN: MonthAnchor = MonthAnchor { year: i32::MIN, month: 1 };

    /// Latest representable month; offsets above it saturate here
    pub const MAX: MonthAnchor = MonthAnchor { year: i32::MAX, month: 12 };

    /// Create an anchor; `month` is 1-based and must be in 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::EPOCH
    }

    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Self {
        match i32::try_from(ordinal.div_euclid(12)) {
            Ok(year) => Self {
                year,
                month: ordinal.rem_euclid(12) as u32 + 1,
            },
            Err(_) if ordinal < 0 => Self::MIN,
            Err(_) => Self::MAX,
        }
    }

    /// Anchor `months` months after this one (negative goes back),
    /// saturating at [`Self::MIN`] / [`Self::MAX`]
    pub fn offset(&self, months: MonthIndex) -> Self {
        Self::from_ordinal(self.ordinal().saturating_add(months))
    }

    /// Whole months from `self` to `target`
    pub fn months_until(&self, target: MonthAnchor) -> MonthIndex {
        target.ordinal() - self.ordinal()
    }

    /// 00:00:00 UTC on the first day of the month
    pub fn to_utc(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Canonical `YYYY-MM` label
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Anything that can be normalized to a month anchor
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    Text(&'a str),
    Date(NaiveDate),
    Instant(DateTime<Utc>),
    Anchor(MonthAnchor),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(text: &'a str) -> Self {
        DateInput::Text(text)
    }
}

impl<'a> From<&'a String> for DateInput<'a> {
    fn from(text: &'a String) -> Self {
        DateInput::Text(text.as_str())
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(date: NaiveDate) -> Self {
        DateInput::Date(date)
    }
}

impl From<DateTime<Utc>> for DateInput<'_> {
    fn from(instant: DateTime<Utc>) -> Self {
        DateInput::Instant(instant)
    }
}

impl From<MonthAnchor> for DateInput<'_> {
    fn from(anchor: MonthAnchor) -> Self {
        DateInput::Anchor(anchor)
    }
}

fn parse_text(text: &str) -> Option<MonthAnchor> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // ISO wins over every other reading, including out-of-range months
    if let Some(caps) = ISO_PREFIX.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return MonthAnchor::new(year, month);
    }

    if let Some(caps) = DAY_FIRST.captures(text) {
        let month = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        return MonthAnchor::new(year, month);
    }

    // Anything ISO-like, RFC 3339 included, was taken by the prefix above
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
        .and_then(|utc| MonthAnchor::new(utc.year(), utc.month()))
}

/// Normalize a date-like input, or `None` when it cannot be read
pub fn try_normalize<'a>(input: impl Into<DateInput<'a>>) -> Option<MonthAnchor> {
    match input.into() {
        DateInput::Text(text) => parse_text(text),
        DateInput::Date(date) => MonthAnchor::new(date.year(), date.month()),
        DateInput::Instant(instant) => MonthAnchor::new(instant.year(), instant.month()),
        DateInput::Anchor(anchor) => Some(anchor),
    }
}

/// Normalize a date-like input to the first month instant in UTC.
///
/// Unreadable or empty input yields [`MonthAnchor::EPOCH`]; check
/// [`MonthAnchor::is_sentinel`] before trusting any index derived from it.
pub fn normalize_to_month_start<'a>(input: impl Into<DateInput<'a>>) -> MonthAnchor {
    let input = input.into();
    try_normalize(input).unwrap_or_else(|| {
        debug!("unreadable date {:?}, using epoch sentinel", input);
        MonthAnchor::EPOCH
    })
}

/// `(targetYear - startYear) * 12 + (targetMonth - startMonth)` after normalizing both
pub fn month_index_of<'a, 'b>(
    start: impl Into<DateInput<'a>>,
    target: impl Into<DateInput<'b>>,
) -> MonthIndex {
    normalize_to_month_start(start).months_until(normalize_to_month_start(target))
}

/// `YYYY-MM` label of the month `index` months after `start`
pub fn year_month_label_of(start: MonthAnchor, index: MonthIndex) -> String {
    start.offset(index).label()
}

/// `YYYY-MM-01` for the month `index` months after `start`
pub fn iso_date_of(start: MonthAnchor, index: MonthIndex) -> String {
    format!("{}-01", start.offset(index).label())
}

/// Index of January of `year`
pub fn year_start_month_index(start: MonthAnchor, year: i32) -> MonthIndex {
    i64::from(year) * 12 - start.ordinal()
}

/// Index representing the end of `year`, i.e. January of `year + 1`
pub fn year_end_month_index(start: MonthAnchor, year: i32) -> MonthIndex {
    (i64::from(year) + 1) * 12 - start.ordinal()
}

/// Latest year whose year-end index is at most `month`
pub fn last_year_ending_by(start: MonthAnchor, month: MonthIndex) -> i32 {
    let year = (start.ordinal().saturating_add(month)).div_euclid(12) - 1;
    year.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Months from `start` to `end`, at least 1
pub fn horizon_months_until(start: MonthAnchor, end: MonthAnchor) -> u32 {
    start.months_until(end).clamp(1, i64::from(u32::MAX)) as u32
}
