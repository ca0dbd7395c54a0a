//! Merging fresh device reads with persisted history.

mod config;
mod controller;
mod integrity;

pub use config::{ReconcileConfig, SyncMode, MIN_REPEAT_RUN};
pub use controller::{ReconcileOutcome, ReconcileRequest, Reconciler};
pub use integrity::{detect_repeated_runs, IntegrityWarning};
