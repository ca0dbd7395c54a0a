//! Device health API contract and the per-day source reader built on it.

mod export;
mod reader;
#[cfg(test)]
mod scripted;

pub use export::ExportedSamples;
pub use reader::{DayReading, SourceReader};
#[cfg(test)]
pub use scripted::ScriptedSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{DayKey, LocalDayBoundary};
use crate::error::DeviceReadError;

/// One timestamped count sample as the device health API reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: u64,
    /// Day the device itself attributes the sample to, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_day: Option<DayKey>,
}

/// Capability to query raw step samples between two instants.
///
/// Callers always pass a single local day; implementations are free to return
/// samples outside of it, the reader checks every sample again.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn query_samples(
        &self,
        boundary: &LocalDayBoundary,
    ) -> Result<Vec<RawSample>, DeviceReadError>;
}
