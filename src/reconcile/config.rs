use serde::{Deserialize, Serialize};

/// Shortest run of equal neighbouring days treated as a repeated read. Two
/// equal days in a row are a plausible coincidence and are never flagged.
pub const MIN_REPEAT_RUN: usize = 3;

/// Tunables for a reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcileConfig {
    /// Consecutive days sharing one non-zero value that count as a repeated
    /// read. Never below `MIN_REPEAT_RUN`.
    pub min_repeat_run: usize,

    /// Device reads allowed in flight at once.
    pub max_concurrent_reads: usize,

    /// Upsert attempts per date before it is reported as failed.
    pub write_attempts: u32,

    /// Read past days that have no stored record yet.
    pub refresh_missing_days: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_repeat_run: MIN_REPEAT_RUN,
            max_concurrent_reads: 4,
            write_attempts: 2,
            refresh_missing_days: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    /// Read today, flagged days and (optionally) days never stored.
    #[default]
    Incremental,
    /// Read every day up to today again.
    FullResync,
}
