use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::str::FromStr;

/// A budget month. Ordered by (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            anyhow::bail!("Invalid month {month} (expected 1-12)");
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::from_date(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
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

    /// Signed number of months from `self` to `later`; negative when `later` is earlier.
    pub fn months_until(self, later: Period) -> i64 {
        later.ordinal() - self.ordinal()
    }

    /// `LIKE` pattern matching `YYYY-MM-DD` dates within this period.
    pub(crate) fn date_pattern(&self) -> String {
        format!("{self}-%")
    }

    fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Invalid period '{s}' (expected YYYY-MM)"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("Invalid year in period '{s}'"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("Invalid month in period '{s}'"))?;
        Self::new(year, month)
    }
}
