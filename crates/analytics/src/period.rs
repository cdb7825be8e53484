use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

/// A calendar month, the unit every time series in the engine is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(instant: &DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// The `count` consecutive months ending with (and including) `self`, oldest first.
    pub fn trailing(self, count: usize) -> Vec<YearMonth> {
        let mut months = Vec::with_capacity(count);
        let mut cursor = self;
        for _ in 0..count {
            months.push(cursor);
            cursor = cursor.previous();
        }
        months.reverse();
        months
    }

    /// The twelve months of `year`.
    pub fn months_of(year: i32) -> Vec<YearMonth> {
        (1..=12).map(|month| YearMonth { year, month }).collect()
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        Self::of(instant) == *self
    }

    /// First instant of the month, used as the lower bound of month windows.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0).single()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_across_year_boundaries() {
        let january = YearMonth::new(2024, 1).unwrap();
        assert_eq!(january.previous(), YearMonth::new(2023, 12).unwrap());
        assert_eq!(january.previous().next(), january);
        assert!(YearMonth::new(2024, 13).is_none());
    }

    #[test]
    fn trailing_window_is_oldest_first() {
        let months = YearMonth::new(2024, 2).unwrap().trailing(3);
        let keys: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(keys, vec!["2023-12", "2024-01", "2024-02"]);
    }
}
