use chrono::{Datelike, NaiveDate, Utc};
use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

static MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// One reporting period. Orders chronologically and prints as `YYYY-MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(Error::InvalidMonth(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// The calendar month before the one containing `date`.
    pub fn preceding(date: NaiveDate) -> Self {
        let this = Self {
            year: date.year(),
            month: date.month(),
        };
        this.previous()
    }

    /// The month before the current UTC month; the default target of a run.
    pub fn last_completed() -> Self {
        Self::preceding(Utc::now().date_naive())
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Lowercase full name, e.g. `september`.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Capitalised three-letter abbreviation, e.g. `Sep`.
    pub fn abbreviation(&self) -> String {
        let name = self.month_name();
        let mut abbr = name[..1].to_uppercase();
        abbr.push_str(&name[1..3]);
        abbr
    }

    /// Two-digit year, e.g. `25`.
    pub fn short_year(&self) -> String {
        format!("{:02}", self.year.rem_euclid(100))
    }

    /// The label the publisher uses in link texts and file names, e.g. `Sep 25`.
    pub fn short_label(&self) -> String {
        format!("{} {}", self.abbreviation(), self.short_year())
    }

    /// Substitute `{year}`, `{month}`, `{month_name}`, `{abbr}` and `{yy}`.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{year}", &self.year.to_string())
            .replace("{month_name}", self.month_name())
            .replace("{month}", &format!("{:02}", self.month))
            .replace("{abbr}", &self.abbreviation())
            .replace("{yy}", &self.short_year())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        if !y.chars().chain(m.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}
