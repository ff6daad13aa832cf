//! Shard time period implementation
//!
//! A signal's samples live in the live shard (current, still-growing data)
//! or in one monthly backup shard per archived calendar month. Monthly
//! backup directories follow the `Month_<MM>.<YYYY>` naming convention.

use std::fmt;

use chrono::{Datelike, TimeZone, Utc};

/// Period covered by one shard file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShardPeriod {
    /// The live shard holding the current, unarchived samples
    Live,
    /// One archived calendar month
    Month {
        /// Calendar year, e.g. 2021
        year: i32,
        /// Calendar month, 1..=12
        month: u32,
    },
}

impl fmt::Display for ShardPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardPeriod::Live => write!(f, "live"),
            ShardPeriod::Month { year, month } => write!(f, "Month_{:02}.{:04}", month, year),
        }
    }
}

impl ShardPeriod {
    /// Create a monthly period, returning `None` for an invalid month number
    pub fn month(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self::Month { year, month })
        } else {
            None
        }
    }

    /// Parse a backup directory name of the form `Month_<MM>.<YYYY>`.
    ///
    /// Returns `None` for anything that does not match the convention, so
    /// directory scans can skip unrelated entries silently.
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("Month_")?;
        let (month_part, year_part) = rest.split_once('.')?;
        if month_part.len() != 2 || year_part.len() != 4 {
            return None;
        }
        let month = month_part.parse::<u32>().ok()?;
        let year = year_part.parse::<i32>().ok()?;
        Self::month(year, month)
    }

    /// Directory name for a monthly period; `None` for the live period,
    /// which has no backup directory
    pub fn dir_name(&self) -> Option<String> {
        match self {
            ShardPeriod::Live => None,
            ShardPeriod::Month { .. } => Some(self.to_string()),
        }
    }

    /// Calendar bounds `[start, end)` of this period in epoch seconds.
    ///
    /// The live period is unbounded and returns `None`. The bounds are
    /// nominal: shard contents may stray outside them and callers must
    /// treat the bounds as a pruning hint, never as a guarantee.
    pub fn bounds(&self) -> Option<(i64, i64)> {
        match *self {
            ShardPeriod::Live => None,
            ShardPeriod::Month { year, month } => {
                let start = Utc
                    .with_ymd_and_hms(year, month, 1, 0, 0, 0)
                    .single()?
                    .timestamp();
                let (next_year, next_month) = if month == 12 {
                    (year + 1, 1)
                } else {
                    (year, month + 1)
                };
                let end = Utc
                    .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
                    .single()?
                    .timestamp();
                Some((start, end))
            }
        }
    }

    /// Whether `t` falls inside this period's nominal bounds.
    ///
    /// Always true for the live period.
    pub fn may_contain(&self, t: i64) -> bool {
        match self.bounds() {
            None => true,
            Some((start, end)) => start <= t && t < end,
        }
    }

    /// Monotonic sort key placing months in calendar order and the live
    /// period after every month
    pub fn sort_key(&self) -> i64 {
        match self.bounds() {
            None => i64::MAX,
            Some((start, _)) => start,
        }
    }

    /// The period containing a given instant among the known monthly
    /// periods, if any
    pub fn month_of(t: i64) -> Option<Self> {
        let dt = Utc.timestamp_opt(t, 0).single()?;
        Self::month(dt.year(), dt.month())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_dir_name() {
        let period = ShardPeriod::month(2021, 3).unwrap();
        assert_eq!(period.to_string(), "Month_03.2021");
        assert_eq!(period.dir_name(), Some("Month_03.2021".to_string()));
        assert_eq!(ShardPeriod::Live.dir_name(), None);
    }

    #[test]
    fn test_parse_dir_name() {
        assert_eq!(
            ShardPeriod::parse_dir_name("Month_03.2021"),
            Some(ShardPeriod::Month {
                year: 2021,
                month: 3
            })
        );
        assert_eq!(
            ShardPeriod::parse_dir_name("Month_12.1999"),
            Some(ShardPeriod::Month {
                year: 1999,
                month: 12
            })
        );

        assert_eq!(ShardPeriod::parse_dir_name("Month_13.2021"), None);
        assert_eq!(ShardPeriod::parse_dir_name("Month_3.2021"), None);
        assert_eq!(ShardPeriod::parse_dir_name("Month_03.21"), None);
        assert_eq!(ShardPeriod::parse_dir_name("Backup_03.2021"), None);
        assert_eq!(ShardPeriod::parse_dir_name("Month_aa.2021"), None);
    }

    #[test]
    fn test_parse_round_trip() {
        let period = ShardPeriod::month(2024, 11).unwrap();
        let name = period.dir_name().unwrap();
        assert_eq!(ShardPeriod::parse_dir_name(&name), Some(period));
    }

    #[test]
    fn test_bounds() {
        let (start, end) = ShardPeriod::month(2021, 3).unwrap().bounds().unwrap();
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap().timestamp()
        );
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2021, 4, 1, 0, 0, 0).unwrap().timestamp()
        );

        // December rolls over into the next year
        let (start, end) = ShardPeriod::month(2020, 12).unwrap().bounds().unwrap();
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2020, 12, 1, 0, 0, 0).unwrap().timestamp()
        );
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap().timestamp()
        );

        assert_eq!(ShardPeriod::Live.bounds(), None);
    }

    #[test]
    fn test_may_contain() {
        let period = ShardPeriod::month(1970, 1).unwrap();
        assert!(period.may_contain(0));
        assert!(period.may_contain(86_400));
        assert!(!period.may_contain(40 * 86_400));
        assert!(ShardPeriod::Live.may_contain(i64::MIN));
        assert!(ShardPeriod::Live.may_contain(i64::MAX));
    }

    #[test]
    fn test_sort_key_orders_live_last() {
        let jan = ShardPeriod::month(2021, 1).unwrap();
        let feb = ShardPeriod::month(2021, 2).unwrap();
        assert!(jan.sort_key() < feb.sort_key());
        assert!(feb.sort_key() < ShardPeriod::Live.sort_key());
    }

    #[test]
    fn test_month_of() {
        let t = Utc
            .with_ymd_and_hms(2023, 5, 15, 12, 30, 0)
            .unwrap()
            .timestamp();
        assert_eq!(
            ShardPeriod::month_of(t),
            Some(ShardPeriod::Month {
                year: 2023,
                month: 5
            })
        );
    }
}
