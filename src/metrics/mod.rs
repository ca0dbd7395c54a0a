mod types;

pub use types::{CycleMetrics, SyncMetricsSnapshot};

use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_RECENT_CYCLES: usize = 20;

/// Running counters over reconciliation cycles, with the most recent cycles
/// kept for inspection. Clones share the same counters.
#[derive(Clone, Default)]
pub struct SyncMetrics {
    inner: Arc<Mutex<SyncMetricsState>>,
}

#[derive(Default)]
struct SyncMetricsState {
    recent_cycles: Vec<CycleMetrics>,
    cycle_count: u64,
    device_read_count: u64,
    discarded_sample_count: u64,
    persist_failure_count: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_cycle(&self, metrics: CycleMetrics) {
        let mut state = self.inner.lock().await;

        state.cycle_count += 1;
        state.device_read_count += metrics.device_reads as u64;
        state.discarded_sample_count += metrics.samples_discarded as u64;
        state.persist_failure_count += metrics.persist_failures as u64;

        state.recent_cycles.push(metrics);

        if state.recent_cycles.len() > MAX_RECENT_CYCLES {
            state.recent_cycles.remove(0);
        }
    }

    pub async fn snapshot(&self) -> SyncMetricsSnapshot {
        let state = self.inner.lock().await;
        SyncMetricsSnapshot {
            recent_cycles: state.recent_cycles.clone(),
            cycle_count: state.cycle_count,
            device_read_count: state.device_read_count,
            discarded_sample_count: state.discarded_sample_count,
            persist_failure_count: state.persist_failure_count,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = SyncMetricsState::default();
    }
}
