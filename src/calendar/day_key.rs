use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Timezone-free calendar date used as the identity of a daily value.
///
/// Always rendered as `YYYY-MM-DD`. Two samples with the same key describe the
/// same day no matter which timezone produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid day key '{value}': expected YYYY-MM-DD")]
pub struct ParseDayKeyError {
    value: String,
}

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// Shift by a signed number of days.
    pub fn offset(&self, days: i64) -> Option<Self> {
        self.0
            .checked_add_signed(chrono::Duration::days(days))
            .map(Self)
    }

    /// Number of calendar days from `self` to `other`, negative when `other` is earlier.
    pub fn days_until(&self, other: DayKey) -> i64 {
        (other.0 - self.0).num_days()
    }

    /// True when `next` is the calendar day right after `self`.
    pub fn is_followed_by(&self, next: DayKey) -> bool {
        self.days_until(next) == 1
    }

    /// Inclusive iteration over `[start, end]`. Empty when `start > end`.
    pub fn range_inclusive(start: DayKey, end: DayKey) -> impl Iterator<Item = DayKey> {
        start
            .0
            .iter_days()
            .take_while(move |date| *date <= end.0)
            .map(DayKey)
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = ParseDayKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields, the store keys never contain them.
        if value.len() != 10 {
            return Err(ParseDayKeyError {
                value: value.to_string(),
            });
        }
        NaiveDate::parse_from_str(value, DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|_| ParseDayKeyError {
                value: value.to_string(),
            })
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
