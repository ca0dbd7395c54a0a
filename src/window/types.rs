use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SampleOrigin {
    DeviceApi,
    PersistedStore,
    /// Zero-fill for a day no source had data for.
    Synthetic,
}

impl SampleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleOrigin::DeviceApi => "DeviceApi",
            SampleOrigin::PersistedStore => "PersistedStore",
            SampleOrigin::Synthetic => "Synthetic",
        }
    }
}

/// One observation for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetricSample {
    pub date: DayKey,
    pub value: u64,
    pub origin: SampleOrigin,
    /// `None` for synthetic zero-fill.
    pub captured_at: Option<DateTime<Utc>>,
}

impl DailyMetricSample {
    pub fn device(date: DayKey, value: u64, captured_at: DateTime<Utc>) -> Self {
        Self {
            date,
            value,
            origin: SampleOrigin::DeviceApi,
            captured_at: Some(captured_at),
        }
    }

    pub fn persisted(date: DayKey, value: u64, captured_at: DateTime<Utc>) -> Self {
        Self {
            date,
            value,
            origin: SampleOrigin::PersistedStore,
            captured_at: Some(captured_at),
        }
    }

    pub fn synthetic(date: DayKey) -> Self {
        Self {
            date,
            value: 0,
            origin: SampleOrigin::Synthetic,
            captured_at: None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == SampleOrigin::Synthetic
    }
}

/// Gap-free, ascending sequence of one sample per day over `[start, end]`.
///
/// Only `build_window` constructs it, so the invariants hold for every value
/// of this type.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricWindow {
    start: DayKey,
    end: DayKey,
    days: Vec<DailyMetricSample>,
}

impl MetricWindow {
    pub(super) fn from_parts(start: DayKey, end: DayKey, days: Vec<DailyMetricSample>) -> Self {
        Self { start, end, days }
    }

    pub fn start(&self) -> DayKey {
        self.start
    }

    pub fn end(&self) -> DayKey {
        self.end
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[DailyMetricSample] {
        &self.days
    }

    pub fn iter(&self) -> impl Iterator<Item = &DailyMetricSample> {
        self.days.iter()
    }

    pub fn get(&self, date: DayKey) -> Option<&DailyMetricSample> {
        let index = self.start.days_until(date);
        if index < 0 {
            return None;
        }
        self.days.get(index as usize)
    }

    pub fn value_on(&self, date: DayKey) -> Option<u64> {
        self.get(date).map(|sample| sample.value)
    }

    pub fn total(&self) -> u64 {
        self.days
            .iter()
            .fold(0u64, |acc, sample| acc.saturating_add(sample.value))
    }

    /// Days backed by a real value, whatever its origin.
    pub fn days_with_data(&self) -> usize {
        self.days.iter().filter(|sample| !sample.is_synthetic()).count()
    }
}

impl<'a> IntoIterator for &'a MetricWindow {
    type Item = &'a DailyMetricSample;
    type IntoIter = std::slice::Iter<'a, DailyMetricSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.iter()
    }
}
