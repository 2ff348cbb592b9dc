//! Season calendar for rosterline.
//!
//! Every event is bucketed into a calendar day in the season timezone. Instants
//! from upstream (epoch millis, RFC 3339 stamps, naive wall-clock strings) are
//! all normalized through one [`SeasonClock`].

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Minutes in a day; offsets must stay strictly inside this bound
const MINUTES_PER_DAY: i32 = 24 * 60;

/// Fixed-offset season timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonClock {
    /// Offset from UTC in minutes (negative = west of Greenwich)
    pub offset_minutes: i32,
}

impl SeasonClock {
    /// US Eastern daylight time, where the regular season is played
    pub const DEFAULT_OFFSET_MINUTES: i32 = -240;

    /// Create a clock with the given UTC offset
    ///
    /// # Errors
    ///
    /// Returns error if the offset is a day or more
    pub fn new(offset_minutes: i32) -> CoreResult<Self> {
        if offset_minutes.abs() >= MINUTES_PER_DAY {
            return Err(CoreError::Validation {
                field: "offset_minutes".to_string(),
                reason: format!("{} is not a valid UTC offset", offset_minutes),
            });
        }
        Ok(Self { offset_minutes })
    }

    /// Clock pinned to UTC
    #[must_use]
    pub const fn utc() -> Self {
        Self { offset_minutes: 0 }
    }

    /// The chrono offset for this clock
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Calendar day of an instant in the season timezone
    #[must_use]
    pub fn date_of<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    /// Calendar day of a Unix epoch timestamp in milliseconds
    ///
    /// # Errors
    ///
    /// Returns error if the timestamp is out of range
    pub fn date_of_epoch_millis(&self, millis: i64) -> CoreResult<NaiveDate> {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|instant| self.date_of(&instant))
            .ok_or_else(|| CoreError::InvalidDate {
                value: millis.to_string(),
            })
    }

    /// Parse a date or instant string into a season calendar day
    ///
    /// Accepts `YYYY-MM-DD` (already a season day), RFC 3339 instants,
    /// naive `YYYY-MM-DD HH:MM:SS` wall-clock times (taken as season-local),
    /// and bare epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns error if no accepted format matches
    pub fn parse_date(&self, raw: &str) -> CoreResult<NaiveDate> {
        let raw = raw.trim();

        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(date);
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Ok(self.date_of(&instant));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(wall) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(wall.date());
            }
        }
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(millis) = raw.parse::<i64>() {
                return self.date_of_epoch_millis(millis);
            }
        }

        Err(CoreError::InvalidDate {
            value: raw.to_string(),
        })
    }
}

impl Default for SeasonClock {
    fn default() -> Self {
        Self {
            offset_minutes: Self::DEFAULT_OFFSET_MINUTES,
        }
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    /// Days from `start` through `end`, both inclusive; empty if `start > end`
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            next: (start <= end).then_some(start),
            end,
        }
    }

    /// Number of days left in the range
    #[must_use]
    pub fn remaining(&self) -> usize {
        match self.next {
            Some(next) => (self.end - next).num_days() as usize + 1,
            None => 0,
        }
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.end);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}
