use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;

/// Counters for one reconciliation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleMetrics {
    pub timestamp: DateTime<Utc>,
    pub start: DayKey,
    pub end: DayKey,
    pub device_reads: usize,
    pub degraded_reads: usize,
    pub samples_discarded: usize,
    pub records_written: usize,
    pub persist_failures: usize,
    pub flagged_dates: usize,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub recent_cycles: Vec<CycleMetrics>,
    pub cycle_count: u64,
    pub device_read_count: u64,
    pub discarded_sample_count: u64,
    pub persist_failure_count: u64,
}
