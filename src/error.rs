//! Error taxonomy shared by the reader, builder, store and reconciler.

use serde::Serialize;

use crate::calendar::DayKey;

/// Transport or permission failure reported by the device health API for one
/// day query. The source reader recovers from it locally as "no samples".
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceReadError {
    #[error("health permission denied: {0}")]
    PermissionDenied(String),

    #[error("health API unavailable: {0}")]
    Unavailable(String),

    #[error("malformed health API response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("invalid window range: start {start} is after end {end}")]
    InvalidRange { start: DayKey, end: DayKey },
}

/// Failure of a single call against the persisted store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to read persisted range {start}..={end}: {source}")]
    StoreRangeRead {
        start: DayKey,
        end: DayKey,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("reconciliation cancelled")]
    Cancelled,
}

/// A date whose upsert still failed after every attempt. The store keeps its
/// previous value for that date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistFailure {
    pub date: DayKey,
    pub attempts: u32,
    pub message: String,
}
