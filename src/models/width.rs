//! Window width parsing and calendar arithmetic
//!
//! Widths are written as a count followed by a unit letter: `m` (minutes),
//! `h` (hours), `d` (days), or `M` (calendar months), e.g. `8h` or `1d`.

use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::BackupError;

/// Calendar unit a window width is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidthUnit {
    Minutes,
    Hours,
    Days,
    Months,
}

impl WidthUnit {
    fn suffix(self) -> char {
        match self {
            Self::Minutes => 'm',
            Self::Hours => 'h',
            Self::Days => 'd',
            Self::Months => 'M',
        }
    }

    fn from_suffix(c: char) -> Option<Self> {
        match c {
            'm' => Some(Self::Minutes),
            'h' => Some(Self::Hours),
            'd' => Some(Self::Days),
            'M' => Some(Self::Months),
            _ => None,
        }
    }
}

/// A positive window width, e.g. "8 hours" or "1 month"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowWidth {
    count: u32,
    unit: WidthUnit,
}

impl WindowWidth {
    /// Create a width, rejecting a zero count
    pub fn new(count: u32, unit: WidthUnit) -> Result<Self, BackupError> {
        if count == 0 {
            return Err(BackupError::config("window width must be positive"));
        }
        Ok(Self { count, unit })
    }

    pub fn minutes(count: u32) -> Result<Self, BackupError> {
        Self::new(count, WidthUnit::Minutes)
    }

    pub fn hours(count: u32) -> Result<Self, BackupError> {
        Self::new(count, WidthUnit::Hours)
    }

    pub fn days(count: u32) -> Result<Self, BackupError> {
        Self::new(count, WidthUnit::Days)
    }

    pub fn months(count: u32) -> Result<Self, BackupError> {
        Self::new(count, WidthUnit::Months)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn unit(&self) -> WidthUnit {
        self.unit
    }

    /// Fixed duration of this width, or `None` for calendar months
    pub fn duration(&self) -> Option<TimeDelta> {
        let count = i64::from(self.count);
        match self.unit {
            WidthUnit::Minutes => TimeDelta::try_minutes(count),
            WidthUnit::Hours => TimeDelta::try_hours(count),
            WidthUnit::Days => TimeDelta::try_days(count),
            WidthUnit::Months => None,
        }
    }

    /// Move an instant forward by one width
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.unit {
            WidthUnit::Months => from.checked_add_months(Months::new(self.count)),
            _ => from.checked_add_signed(self.duration()?),
        }
    }

    /// Move an instant back by `times` widths
    pub fn retreat(&self, from: DateTime<Utc>, times: u32) -> Option<DateTime<Utc>> {
        let total = self.count.checked_mul(times)?;
        match self.unit {
            WidthUnit::Months => from.checked_sub_months(Months::new(total)),
            _ => {
                let step = self.duration()?;
                from.checked_sub_signed(step.checked_mul(i32::try_from(times).ok()?)?)
            }
        }
    }

    /// Truncate an instant down to the boundary of this width's unit
    ///
    /// Minutes align to the minute, hours to the hour, days to midnight UTC,
    /// and months to the first of the month.
    pub fn align_down(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let date = instant.date_naive();
        let aligned = match self.unit {
            WidthUnit::Minutes => date.and_hms_opt(instant.hour(), instant.minute(), 0),
            WidthUnit::Hours => date.and_hms_opt(instant.hour(), 0, 0),
            WidthUnit::Days => date.and_hms_opt(0, 0, 0),
            WidthUnit::Months => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };
        aligned.map(|naive| naive.and_utc()).unwrap_or(instant)
    }
}

impl fmt::Display for WindowWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl FromStr for WindowWidth {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || {
            BackupError::config(format!(
                "invalid interval '{}': expected a number followed by 'm' (minutes), \
                 'h' (hours), 'd' (days) or 'M' (months)",
                s
            ))
        };

        let unit_char = s.chars().last().ok_or_else(invalid)?;
        let unit = WidthUnit::from_suffix(unit_char).ok_or_else(invalid)?;
        let digits = &s[..s.len() - unit_char.len_utf8()];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let count: u32 = digits.parse().map_err(|_| invalid())?;

        Self::new(count, unit)
    }
}
