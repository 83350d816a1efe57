use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidMonthError;

/// A reporting period: one calendar month of one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    first: NaiveDate,
}

impl MonthKey {
    pub const MIN_YEAR: i32 = 1970;
    pub const MAX_YEAR: i32 = 2999;

    pub fn new(year: i32, month: u32) -> Result<Self, InvalidMonthError> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(InvalidMonthError { year, month });
        }

        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Self { first })
            .ok_or(InvalidMonthError { year, month })
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first + Months::new(1) - Days::new(1)
    }

    pub fn day_count(&self) -> u32 {
        self.last_day().day()
    }

    /// Every date of the month, ascending. Each call starts over from day 1.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        self.first.iter_days().take(self.day_count() as usize)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = String;

    /// Accepts `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid month '{s}': expected YYYY-MM"))?;

        if year.len() != 4 || month.len() != 2 {
            return Err(format!("invalid month '{s}': expected YYYY-MM"));
        }

        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;

        MonthKey::new(year, month).map_err(|e| e.to_string())
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

pub fn days_in_month(month: MonthKey) -> Vec<NaiveDate> {
    month.days().collect()
}

pub fn is_within_month(date: NaiveDate, month: MonthKey) -> bool {
    month.contains(date)
}

/// Monday to Friday.
pub const WORK_WEEK: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

pub fn falls_on(date: NaiveDate, weekdays: &[Weekday]) -> bool {
    weekdays.contains(&date.weekday())
}
