use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::calendar::DayKey;
use crate::window::SampleOrigin;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_day_key(value: &str, field: &str) -> Result<DayKey> {
    value
        .parse()
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_origin(value: &str) -> Result<SampleOrigin> {
    match value {
        "DeviceApi" => Ok(SampleOrigin::DeviceApi),
        "PersistedStore" => Ok(SampleOrigin::PersistedStore),
        "Synthetic" => Ok(SampleOrigin::Synthetic),
        other => Err(anyhow!("unknown sample origin {other}")),
    }
}
