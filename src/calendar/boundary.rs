use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use super::DayKey;

// Widest gap a real zone has skipped at midnight is an hour; 24h bounds the scan.
const GAP_SCAN_STEP_MINUTES: i64 = 15;
const GAP_SCAN_LIMIT_MINUTES: i64 = 24 * 60;

/// Instant range covering one local calendar day: `[00:00:00.000, 23:59:59.999]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDayBoundary {
    pub date: DayKey,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LocalDayBoundary {
    /// Resolve the boundary of `date` in `tz`.
    ///
    /// The start is the first local instant of the day, which is later than
    /// 00:00 in zones whose DST transition skips midnight. The end is one
    /// millisecond before the next day's start, so 23h and 25h days come out
    /// with their real length. Returns `None` only if the zone has no valid
    /// local time at all on that date.
    pub fn for_day<Tz: TimeZone>(date: DayKey, tz: &Tz) -> Option<Self> {
        let start = local_day_start(date.date(), tz)?;
        let next_start = local_day_start(date.succ()?.date(), tz)?;
        Some(Self {
            date,
            start,
            end: next_start - Duration::milliseconds(1),
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start + Duration::milliseconds(1)
    }
}

/// First valid instant of a local day.
pub fn local_day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut offset = 0;
    while offset < GAP_SCAN_LIMIT_MINUTES {
        let candidate = midnight + Duration::minutes(offset);
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return Some(resolved.with_timezone(&Utc));
        }
        offset += GAP_SCAN_STEP_MINUTES;
    }
    None
}

/// Local calendar day an instant belongs to.
pub fn day_key_of<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> DayKey {
    DayKey::new(instant.with_timezone(tz).date_naive())
}
