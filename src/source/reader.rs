use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::calendar::{day_key_of, DayKey, LocalDayBoundary};
use crate::clock::Clock;
use crate::window::DailyMetricSample;

use super::{HealthSource, RawSample};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Result of reading one local day from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayReading {
    pub date: DayKey,
    pub value: u64,
    pub accepted: usize,
    pub discarded: usize,
    /// The device call failed; `value` is the "no data" zero, not a measurement.
    pub degraded: bool,
    pub captured_at: DateTime<Utc>,
}

impl DayReading {
    pub fn to_sample(&self) -> DailyMetricSample {
        DailyMetricSample::device(self.date, self.value, self.captured_at)
    }
}

/// Reads the authoritative step count of a single local day from the device.
///
/// Each call queries exactly one day boundary and re-checks every returned
/// sample against the requested day, so samples the device attributes to a
/// neighbouring day never reach the sum.
#[derive(Clone)]
pub struct SourceReader {
    source: Arc<dyn HealthSource>,
    timezone: Tz,
    clock: Arc<dyn Clock>,
}

impl SourceReader {
    pub fn new(source: Arc<dyn HealthSource>, timezone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            timezone,
            clock,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub async fn read_day_total(&self, date: DayKey) -> u64 {
        self.read_day(date).await.value
    }

    pub async fn read_day(&self, date: DayKey) -> DayReading {
        let captured_at = self.clock.now();

        let Some(boundary) = LocalDayBoundary::for_day(date, &self.timezone) else {
            log_error!(
                "no valid local time for {} in {}; treating as no data",
                date,
                self.timezone
            );
            return Self::degraded(date, captured_at);
        };

        let samples = match self.source.query_samples(&boundary).await {
            Ok(samples) => samples,
            Err(err) => {
                // Never retried against a wider range: that is how samples
                // from adjacent days end up counted twice.
                log_warn!("device read for {} failed: {err}; treating as no data", date);
                return Self::degraded(date, captured_at);
            }
        };

        let mut value = 0u64;
        let mut accepted = 0usize;
        let mut discarded = 0usize;

        for sample in &samples {
            if self.belongs_to(sample, date) {
                value = value.saturating_add(sample.value);
                accepted += 1;
            } else {
                discarded += 1;
                log_warn!(
                    "discarding sample {}..{} ({} steps, reported day {:?}) returned for {}",
                    sample.start,
                    sample.end,
                    sample.value,
                    sample.reported_day.map(|day| day.to_string()),
                    date
                );
            }
        }

        log_info!(
            "read {} steps for {} ({} samples kept, {} discarded)",
            value,
            date,
            accepted,
            discarded
        );

        DayReading {
            date,
            value,
            accepted,
            discarded,
            degraded: false,
            captured_at,
        }
    }

    fn belongs_to(&self, sample: &RawSample, date: DayKey) -> bool {
        let local_day = day_key_of(sample.start, &self.timezone);
        let reported_matches = sample.reported_day.map_or(true, |reported| reported == date);
        local_day == date && reported_matches
    }

    fn degraded(date: DayKey, captured_at: DateTime<Utc>) -> DayReading {
        DayReading {
            date,
            value: 0,
            accepted: 0,
            discarded: 0,
            degraded: true,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::DeviceReadError;
    use crate::source::ScriptedSource;
    use chrono::Duration;
    use chrono_tz::{America, Asia, Pacific};
    use proptest::prelude::*;

    fn key(raw: &str) -> DayKey {
        raw.parse().unwrap()
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn sample(start: &str, value: u64) -> RawSample {
        let start = utc(start);
        RawSample {
            start,
            end: start + Duration::minutes(10),
            value,
            reported_day: None,
        }
    }

    fn reader(source: Arc<ScriptedSource>, tz: Tz) -> SourceReader {
        let clock = Arc::new(FixedClock(utc("2025-06-09T18:00:00Z")));
        SourceReader::new(source, tz, clock)
    }

    #[tokio::test]
    async fn sums_samples_of_the_requested_day() {
        let source = Arc::new(ScriptedSource::new());
        source.respond(
            key("2025-06-08"),
            vec![
                sample("2025-06-08T08:00:00Z", 1200),
                sample("2025-06-08T12:30:00Z", 3400),
                sample("2025-06-08T23:59:59Z", 49),
            ],
        );
        let reader = reader(source.clone(), Tz::UTC);

        let reading = reader.read_day(key("2025-06-08")).await;
        assert_eq!(reading.value, 4649);
        assert_eq!(reading.accepted, 3);
        assert_eq!(reading.discarded, 0);
        assert!(!reading.degraded);
    }

    #[tokio::test]
    async fn sample_stamped_next_day_is_discarded() {
        let source = Arc::new(ScriptedSource::new());
        source.respond(key("2025-06-08"), vec![sample("2025-06-09T09:00:00Z", 8461)]);
        let reader = reader(source.clone(), Tz::UTC);

        let reading = reader.read_day(key("2025-06-08")).await;
        assert_eq!(reading.value, 0);
        assert_eq!(reading.discarded, 1);
        assert!(!reading.degraded);
    }

    #[tokio::test]
    async fn mismatched_reported_day_is_discarded() {
        let source = Arc::new(ScriptedSource::new());
        let mut stale = sample("2025-06-08T10:00:00Z", 7231);
        stale.reported_day = Some(key("2025-06-07"));
        let mut good = sample("2025-06-08T11:00:00Z", 100);
        good.reported_day = Some(key("2025-06-08"));
        source.respond(key("2025-06-08"), vec![stale, good]);
        let reader = reader(source.clone(), Tz::UTC);

        let reading = reader.read_day(key("2025-06-08")).await;
        assert_eq!(reading.value, 100);
        assert_eq!(reading.accepted, 1);
        assert_eq!(reading.discarded, 1);
    }

    #[tokio::test]
    async fn day_membership_uses_the_local_timezone() {
        let source = Arc::new(ScriptedSource::new());
        // 22:00 in New York on the 8th, already the 9th in UTC.
        source.respond(key("2025-06-08"), vec![sample("2025-06-09T02:00:00Z", 900)]);
        let reader = reader(source.clone(), America::New_York);

        assert_eq!(reader.read_day_total(key("2025-06-08")).await, 900);
    }

    #[tokio::test]
    async fn device_error_reads_as_zero_without_widening() {
        let source = Arc::new(ScriptedSource::new());
        source.fail(
            key("2025-06-08"),
            DeviceReadError::PermissionDenied("steps".into()),
        );
        let reader = reader(source.clone(), Tz::UTC);

        let reading = reader.read_day(key("2025-06-08")).await;
        assert_eq!(reading.value, 0);
        assert!(reading.degraded);

        let queries = source.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].date, key("2025-06-08"));
        assert_eq!(queries[0].start, utc("2025-06-08T00:00:00Z"));
        assert_eq!(queries[0].end, utc("2025-06-08T23:59:59.999Z"));
    }

    #[tokio::test]
    async fn no_samples_is_a_plain_zero() {
        let source = Arc::new(ScriptedSource::new());
        let reader = reader(source, Tz::UTC);

        let reading = reader.read_day(key("2025-06-08")).await;
        assert_eq!(reading.value, 0);
        assert!(!reading.degraded);
        assert_eq!(reading.to_sample().value, 0);
    }

    proptest! {
        #[test]
        fn total_is_the_sum_of_samples_keyed_to_the_day(
            tz in prop::sample::select(vec![
                Tz::UTC,
                America::New_York,
                America::Sao_Paulo,
                Asia::Kolkata,
                Pacific::Kiritimati,
            ]),
            date in prop::sample::select(vec![
                "2025-03-09",
                "2025-06-08",
                "2025-11-02",
                "2018-11-04",
            ]),
            raw in proptest::collection::vec(
                (-2160i64..3600, 0u64..20_000, prop::option::of(-1i64..=1)),
                0..30,
            ),
        ) {
            let date = key(date);
            let midnight_utc = date.date().and_hms_opt(0, 0, 0).unwrap().and_utc();
            let samples: Vec<RawSample> = raw
                .iter()
                .map(|(minutes, value, reported)| {
                    let start = midnight_utc + Duration::minutes(*minutes);
                    RawSample {
                        start,
                        end: start + Duration::minutes(5),
                        value: *value,
                        reported_day: reported.map(|shift| date.offset(shift).unwrap()),
                    }
                })
                .collect();

            let expected: u64 = samples
                .iter()
                .filter(|sample| day_key_of(sample.start, &tz) == date)
                .filter(|sample| sample.reported_day.map_or(true, |day| day == date))
                .map(|sample| sample.value)
                .sum();

            let source = Arc::new(ScriptedSource::new());
            source.respond(date, samples.clone());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let reading = runtime.block_on(reader(source, tz).read_day(date));

            prop_assert_eq!(reading.value, expected);
            prop_assert_eq!(reading.accepted + reading.discarded, samples.len());
            prop_assert!(!reading.degraded);
        }
    }
}
