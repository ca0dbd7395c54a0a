//! Persisted daily totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::window::{DailyMetricSample, SampleOrigin};

/// Durable daily total. At most one exists per `(user_id, date)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub id: String,
    pub user_id: String,
    pub date: DayKey,
    pub value: u64,
    /// Source that produced the stored value.
    pub origin: SampleOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedRecord {
    pub fn to_sample(&self) -> DailyMetricSample {
        DailyMetricSample::persisted(self.date, self.value, self.updated_at)
    }
}

/// Input of a keyed upsert: creates the record for `(user_id, date)` or
/// updates it in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricUpsert {
    pub user_id: String,
    pub date: DayKey,
    pub value: u64,
    pub origin: SampleOrigin,
    pub at: DateTime<Utc>,
}
