//! In-memory store for unit tests.
//!
//! Mirrors the SQLite store's keyed semantics with plain maps, and lets tests
//! inject range-read and per-date write failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::calendar::DayKey;
use crate::error::{StoreError, StoreResult};

use super::models::{MetricUpsert, PersistedRecord, RereadFlag};
use super::store::MetricStore;

type Key = (String, DayKey);

#[derive(Default)]
struct MemoryData {
    records: BTreeMap<Key, PersistedRecord>,
    flags: BTreeMap<Key, RereadFlag>,
    fail_range_reads: bool,
    // Remaining number of upserts to reject, per date.
    write_failures: HashMap<DayKey, u32>,
    upsert_calls: usize,
    range_reads: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a record in place as-is, bypassing upsert bookkeeping.
    pub fn seed(&self, record: PersistedRecord) {
        let mut data = self.data.write().unwrap();
        data.records
            .insert((record.user_id.clone(), record.date), record);
    }

    pub fn set_range_read_failure(&self, fail: bool) {
        self.data.write().unwrap().fail_range_reads = fail;
    }

    /// Reject the next `times` upserts for `date`.
    pub fn fail_writes(&self, date: DayKey, times: u32) {
        self.data.write().unwrap().write_failures.insert(date, times);
    }

    pub fn record(&self, user_id: &str, date: DayKey) -> Option<PersistedRecord> {
        self.data
            .read()
            .unwrap()
            .records
            .get(&(user_id.to_string(), date))
            .cloned()
    }

    pub fn records(&self, user_id: &str) -> Vec<PersistedRecord> {
        self.data
            .read()
            .unwrap()
            .records
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn flagged_dates(&self, user_id: &str) -> Vec<DayKey> {
        self.data
            .read()
            .unwrap()
            .flags
            .values()
            .filter(|flag| flag.user_id == user_id)
            .map(|flag| flag.date)
            .collect()
    }

    pub fn upsert_calls(&self) -> usize {
        self.data.read().unwrap().upsert_calls
    }

    pub fn range_reads(&self) -> usize {
        self.data.read().unwrap().range_reads
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn fetch_range(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> StoreResult<Vec<PersistedRecord>> {
        let mut data = self.data.write().unwrap();
        data.range_reads += 1;
        if data.fail_range_reads {
            return Err(StoreError::Unavailable("range read rejected".into()));
        }
        if start > end {
            return Ok(Vec::new());
        }
        // BTreeMap order is (user_id, date), so the range is already ascending.
        Ok(data
            .records
            .range((user_id.to_string(), start)..=(user_id.to_string(), end))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn upsert(&self, upsert: &MetricUpsert) -> StoreResult<PersistedRecord> {
        let mut data = self.data.write().unwrap();
        data.upsert_calls += 1;

        if let Some(remaining) = data.write_failures.get_mut(&upsert.date) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "write rejected for {}",
                    upsert.date
                )));
            }
        }

        let key = (upsert.user_id.clone(), upsert.date);
        let record = match data.records.get(&key) {
            Some(existing) => PersistedRecord {
                value: upsert.value,
                origin: upsert.origin,
                updated_at: upsert.at,
                ..existing.clone()
            },
            None => PersistedRecord {
                id: Uuid::new_v4().to_string(),
                user_id: upsert.user_id.clone(),
                date: upsert.date,
                value: upsert.value,
                origin: upsert.origin,
                created_at: upsert.at,
                updated_at: upsert.at,
            },
        };
        data.records.insert(key, record.clone());
        Ok(record)
    }

    async fn pending_rereads(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> StoreResult<Vec<RereadFlag>> {
        let data = self.data.read().unwrap();
        if start > end {
            return Ok(Vec::new());
        }
        Ok(data
            .flags
            .range((user_id.to_string(), start)..=(user_id.to_string(), end))
            .map(|(_, flag)| flag.clone())
            .collect())
    }

    async fn flag_rereads(
        &self,
        user_id: &str,
        dates: &[DayKey],
        reason: &str,
        flagged_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut data = self.data.write().unwrap();
        for date in dates {
            data.flags.insert(
                (user_id.to_string(), *date),
                RereadFlag {
                    user_id: user_id.to_string(),
                    date: *date,
                    reason: reason.to_string(),
                    flagged_at,
                },
            );
        }
        Ok(())
    }

    async fn clear_reread(&self, user_id: &str, date: DayKey) -> StoreResult<()> {
        self.data
            .write()
            .unwrap()
            .flags
            .remove(&(user_id.to_string(), date));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::SampleOrigin;
    use chrono::TimeZone;

    fn key(raw: &str) -> DayKey {
        raw.parse().unwrap()
    }

    fn upsert(user: &str, date: &str, value: u64) -> MetricUpsert {
        MetricUpsert {
            user_id: user.into(),
            date: key(date),
            value,
            origin: SampleOrigin::DeviceApi,
            at: Utc.with_ymd_and_hms(2025, 6, 9, 8, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_one_record_per_key() {
        let store = MemoryStore::new();
        let first = store.upsert(&upsert("u1", "2025-06-08", 10)).await.unwrap();
        let second = store.upsert(&upsert("u1", "2025-06-08", 20)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.records("u1").len(), 1);
        assert_eq!(store.record("u1", key("2025-06-08")).unwrap().value, 20);
    }

    #[tokio::test]
    async fn range_is_per_user_and_inclusive() {
        let store = MemoryStore::new();
        for date in ["2025-06-02", "2025-06-03", "2025-06-09", "2025-06-10"] {
            store.upsert(&upsert("u1", date, 1)).await.unwrap();
        }
        store.upsert(&upsert("u0", "2025-06-05", 1)).await.unwrap();
        store.upsert(&upsert("u2", "2025-06-05", 1)).await.unwrap();

        let records = store
            .fetch_range("u1", key("2025-06-03"), key("2025-06-09"))
            .await
            .unwrap();
        let dates: Vec<DayKey> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![key("2025-06-03"), key("2025-06-09")]);
    }

    #[tokio::test]
    async fn injected_write_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_writes(key("2025-06-08"), 1);

        assert!(store.upsert(&upsert("u1", "2025-06-08", 5)).await.is_err());
        assert!(store.upsert(&upsert("u1", "2025-06-08", 5)).await.is_ok());
        assert_eq!(store.upsert_calls(), 2);
    }
}
