use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::calendar::{day_key_of, DayKey};
use crate::clock::Clock;
use crate::db::{MetricStore, MetricUpsert, PersistedRecord};
use crate::error::{PersistFailure, ReconcileError, WindowError};
use crate::metrics::{CycleMetrics, SyncMetrics};
use crate::source::{DayReading, SourceReader};
use crate::window::{build_window, DailyMetricSample, MetricWindow, SampleOrigin};

use super::config::{ReconcileConfig, SyncMode};
use super::integrity::{detect_repeated_runs, IntegrityWarning};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const REPEATED_VALUE_REASON: &str = "repeated-value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub start: DayKey,
    pub end: DayKey,
    pub mode: SyncMode,
}

impl ReconcileRequest {
    pub fn new(start: DayKey, end: DayKey, mode: SyncMode) -> Self {
        Self { start, end, mode }
    }

    /// The `days` days ending at `today`, inclusive. `days` of 0 is treated as 1.
    pub fn trailing(today: DayKey, days: u32, mode: SyncMode) -> Option<Self> {
        let start = today.offset(-(i64::from(days.max(1)) - 1))?;
        Some(Self::new(start, today, mode))
    }
}

/// Everything a cycle produced, ready to hand to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub window: MetricWindow,
    pub persist_failures: Vec<PersistFailure>,
    pub integrity_warnings: Vec<IntegrityWarning>,
    /// Dates whose value is suspect and queued for a device re-read.
    pub unverified: Vec<DayKey>,
    /// Re-read flag bookkeeping that could not be stored this cycle.
    pub flag_errors: Vec<String>,
}

impl ReconcileOutcome {
    pub fn is_clean(&self) -> bool {
        self.persist_failures.is_empty()
            && self.integrity_warnings.is_empty()
            && self.flag_errors.is_empty()
    }
}

/// Merges fresh device reads with persisted history for one user and keeps
/// the store consistent with the result.
pub struct Reconciler {
    user_id: String,
    reader: SourceReader,
    store: Arc<dyn MetricStore>,
    clock: Arc<dyn Clock>,
    config: ReconcileConfig,
    metrics: SyncMetrics,
}

impl Reconciler {
    pub fn new(
        user_id: impl Into<String>,
        reader: SourceReader,
        store: Arc<dyn MetricStore>,
        clock: Arc<dyn Clock>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            reader,
            store,
            clock,
            config,
            metrics: SyncMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    /// Local calendar day of the injected clock in the reader's time zone.
    pub fn today(&self) -> DayKey {
        day_key_of(self.clock.now(), &self.reader.timezone())
    }

    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let cycle_start = Instant::now();
        let ReconcileRequest { start, end, mode } = *request;

        if start > end {
            return Err(WindowError::InvalidRange { start, end }.into());
        }
        if cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }

        let today = self.today();
        log_info!(
            "reconciling {}..={} for {} (today {}, {:?})",
            start,
            end,
            self.user_id,
            today,
            mode
        );

        let persisted: BTreeMap<DayKey, PersistedRecord> = self
            .store
            .fetch_range(&self.user_id, start, end)
            .await
            .map_err(|source| {
                log_error!("persisted range read {}..={} failed: {}", start, end, source);
                ReconcileError::StoreRangeRead { start, end, source }
            })?
            .into_iter()
            .map(|record| (record.date, record))
            .collect();

        let mut flag_errors = Vec::new();
        let pending: BTreeSet<DayKey> = match self
            .store
            .pending_rereads(&self.user_id, start, end)
            .await
        {
            Ok(flags) => flags.into_iter().map(|flag| flag.date).collect(),
            Err(err) => {
                log_warn!("could not load pending re-reads: {}", err);
                flag_errors.push(format!("loading pending re-reads: {err}"));
                BTreeSet::new()
            }
        };

        let to_read = self.dates_to_read(start, end, today, mode, &persisted, &pending);
        log_debug!("device reads scheduled for {:?}", to_read);

        let readings = self.read_days(&to_read, cancel).await;
        if cancel.is_cancelled() {
            log_warn!("reconciliation cancelled after {} device reads", readings.len());
            return Err(ReconcileError::Cancelled);
        }

        let mut known = BTreeMap::new();
        let mut upserts = Vec::new();

        for date in DayKey::range_inclusive(start, end) {
            let fresh = readings
                .get(&date)
                .filter(|reading| reading.value > 0);
            let stored = persisted.get(&date);

            match (fresh, stored) {
                (Some(reading), stored) => {
                    if stored.map_or(true, |record| record.value != reading.value) {
                        upserts.push(MetricUpsert {
                            user_id: self.user_id.clone(),
                            date,
                            value: reading.value,
                            origin: SampleOrigin::DeviceApi,
                            at: reading.captured_at,
                        });
                    }
                    known.insert(date, reading.to_sample());
                }
                (None, Some(record)) => {
                    known.insert(date, record.to_sample());
                }
                (None, None) => {}
            }
        }

        let (records_written, persist_failures) = self.persist(&upserts, cancel).await?;

        let window = build_window(start, end, &known)?;

        let integrity_warnings =
            detect_repeated_runs(window.days(), self.config.min_repeat_run);
        let unverified: Vec<DayKey> = integrity_warnings
            .iter()
            .flat_map(|warning| warning.flagged.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for warning in &integrity_warnings {
            log_warn!(
                "{} consecutive days ({}..={}) report {}; flagging {} for re-read",
                warning.run_length(),
                warning.run_start,
                warning.run_end,
                warning.value,
                warning.flagged.len()
            );
        }

        self.update_flags(&readings, &pending, &unverified, &mut flag_errors)
            .await;

        let metrics = CycleMetrics {
            timestamp: self.clock.now(),
            start,
            end,
            device_reads: readings.len(),
            degraded_reads: readings.values().filter(|r| r.degraded).count(),
            samples_discarded: readings.values().map(|r| r.discarded).sum(),
            records_written,
            persist_failures: persist_failures.len(),
            flagged_dates: unverified.len(),
            total_ms: cycle_start.elapsed().as_millis() as u64,
        };
        self.metrics.record_cycle(metrics).await;

        log_info!(
            "reconciled {} days for {}: {} written, {} failed, {} unverified",
            window.len(),
            self.user_id,
            records_written,
            persist_failures.len(),
            unverified.len()
        );

        Ok(ReconcileOutcome {
            window,
            persist_failures,
            integrity_warnings,
            unverified,
            flag_errors,
        })
    }

    /// Window built from the store alone, without touching the device.
    pub async fn stored_window(
        &self,
        start: DayKey,
        end: DayKey,
    ) -> Result<MetricWindow, ReconcileError> {
        if start > end {
            return Err(WindowError::InvalidRange { start, end }.into());
        }

        let known: BTreeMap<DayKey, DailyMetricSample> = self
            .store
            .fetch_range(&self.user_id, start, end)
            .await
            .map_err(|source| ReconcileError::StoreRangeRead { start, end, source })?
            .iter()
            .map(|record| (record.date, record.to_sample()))
            .collect();

        Ok(build_window(start, end, &known)?)
    }

    fn dates_to_read(
        &self,
        start: DayKey,
        end: DayKey,
        today: DayKey,
        mode: SyncMode,
        persisted: &BTreeMap<DayKey, PersistedRecord>,
        pending: &BTreeSet<DayKey>,
    ) -> Vec<DayKey> {
        // Days after today have nothing to read yet.
        DayKey::range_inclusive(start, end)
            .filter(|date| *date <= today)
            .filter(|date| {
                *date == today
                    || pending.contains(date)
                    || mode == SyncMode::FullResync
                    || (self.config.refresh_missing_days && !persisted.contains_key(date))
            })
            .collect()
    }

    async fn read_days(
        &self,
        dates: &[DayKey],
        cancel: &CancellationToken,
    ) -> HashMap<DayKey, DayReading> {
        let limit = self.config.max_concurrent_reads.max(1);

        stream::iter(dates.iter().copied())
            .map(|date| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.reader.read_day(date).await)
            })
            .buffer_unordered(limit)
            .filter_map(|reading| async move { reading })
            .map(|reading| (reading.date, reading))
            .collect()
            .await
    }

    async fn persist(
        &self,
        upserts: &[MetricUpsert],
        cancel: &CancellationToken,
    ) -> Result<(usize, Vec<PersistFailure>), ReconcileError> {
        let attempts = self.config.write_attempts.max(1);
        let mut written = 0;
        let mut failures = Vec::new();

        for upsert in upserts {
            let mut last_error = None;

            for attempt in 1..=attempts {
                if cancel.is_cancelled() {
                    log_warn!("reconciliation cancelled before writing {}", upsert.date);
                    return Err(ReconcileError::Cancelled);
                }
                match self.store.upsert(upsert).await {
                    Ok(record) => {
                        log_debug!(
                            "stored {} = {} (record {})",
                            record.date,
                            record.value,
                            record.id
                        );
                        written += 1;
                        last_error = None;
                        break;
                    }
                    Err(err) => {
                        log_warn!(
                            "write for {} failed (attempt {}/{}): {}",
                            upsert.date,
                            attempt,
                            attempts,
                            err
                        );
                        last_error = Some(err);
                    }
                }
            }

            if let Some(err) = last_error {
                log_error!(
                    "giving up on {} after {} attempts; stored value unchanged",
                    upsert.date,
                    attempts
                );
                failures.push(PersistFailure {
                    date: upsert.date,
                    attempts,
                    message: err.to_string(),
                });
            }
        }

        Ok((written, failures))
    }

    async fn update_flags(
        &self,
        readings: &HashMap<DayKey, DayReading>,
        pending: &BTreeSet<DayKey>,
        unverified: &[DayKey],
        flag_errors: &mut Vec<String>,
    ) {
        if !unverified.is_empty() {
            if let Err(err) = self
                .store
                .flag_rereads(
                    &self.user_id,
                    unverified,
                    REPEATED_VALUE_REASON,
                    self.clock.now(),
                )
                .await
            {
                log_warn!("could not flag {} dates for re-read: {}", unverified.len(), err);
                flag_errors.push(format!("flagging {} dates: {err}", unverified.len()));
            }
        }

        for date in pending {
            let read_ok = readings.get(date).is_some_and(|reading| !reading.degraded);
            if !read_ok || unverified.contains(date) {
                continue;
            }
            if let Err(err) = self.store.clear_reread(&self.user_id, *date).await {
                log_warn!("could not clear re-read flag for {}: {}", date, err);
                flag_errors.push(format!("clearing flag for {date}: {err}"));
            }
        }
    }
}
