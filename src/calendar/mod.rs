//! Calendar primitives: the day key used as identity for daily values, and
//! the local-day boundary used to query the device for exactly one day.

mod boundary;
mod day_key;

pub use boundary::{day_key_of, local_day_start, LocalDayBoundary};
pub use day_key::{DayKey, ParseDayKeyError};
