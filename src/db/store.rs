//! Contract the reconciler consumes from the persisted store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::calendar::DayKey;
use crate::error::StoreResult;

use super::connection::Database;
use super::models::{MetricUpsert, PersistedRecord, RereadFlag};

/// Persisted daily metrics, keyed by `(user_id, date)`.
///
/// Implementations must never hold two records for the same key: `upsert`
/// updates in place. Implementations must be `Send + Sync` so one store can
/// serve concurrent reconciliations.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Records with `start <= date <= end` for one user, ascending by date.
    async fn fetch_range(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> StoreResult<Vec<PersistedRecord>>;

    async fn upsert(&self, upsert: &MetricUpsert) -> StoreResult<PersistedRecord>;

    /// Dates in range flagged for a mandatory device re-read.
    async fn pending_rereads(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> StoreResult<Vec<RereadFlag>>;

    async fn flag_rereads(
        &self,
        user_id: &str,
        dates: &[DayKey],
        reason: &str,
        flagged_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn clear_reread(&self, user_id: &str, date: DayKey) -> StoreResult<()>;
}

#[async_trait]
impl MetricStore for Database {
    async fn fetch_range(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> StoreResult<Vec<PersistedRecord>> {
        Ok(self.get_daily_metrics_in_range(user_id, start, end).await?)
    }

    async fn upsert(&self, upsert: &MetricUpsert) -> StoreResult<PersistedRecord> {
        Ok(self.upsert_daily_metric(upsert).await?)
    }

    async fn pending_rereads(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> StoreResult<Vec<RereadFlag>> {
        Ok(self.get_reread_flags_in_range(user_id, start, end).await?)
    }

    async fn flag_rereads(
        &self,
        user_id: &str,
        dates: &[DayKey],
        reason: &str,
        flagged_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        Ok(self
            .insert_reread_flags(user_id, dates, reason, flagged_at)
            .await?)
    }

    async fn clear_reread(&self, user_id: &str, date: DayKey) -> StoreResult<()> {
        Ok(self.delete_reread_flag(user_id, date).await?)
    }
}
