use anyhow::{anyhow, Result};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::calendar::DayKey;
use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_day_key, parse_origin, to_i64, to_u64},
    models::{MetricUpsert, PersistedRecord},
};

fn row_to_record(row: &Row) -> Result<PersistedRecord> {
    let date: String = row.get("date")?;
    let value: i64 = row.get("value")?;
    let origin: String = row.get("origin")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(PersistedRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date: parse_day_key(&date, "date")?,
        value: to_u64(value, "value")?,
        origin: parse_origin(&origin)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Records for `user_id` with `start <= date <= end`, ascending by date.
    pub async fn get_daily_metrics_in_range(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> Result<Vec<PersistedRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, date, value, origin, created_at, updated_at
                 FROM daily_metrics
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )?;

            let mut rows = stmt.query(params![user_id, start.to_string(), end.to_string()])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// Insert or update the record keyed by `(user_id, date)`.
    ///
    /// The record id and `created_at` survive updates.
    pub async fn upsert_daily_metric(&self, upsert: &MetricUpsert) -> Result<PersistedRecord> {
        let upsert = upsert.clone();
        self.execute(move |conn| {
            let id = Uuid::new_v4().to_string();
            let at = upsert.at.to_rfc3339();
            let date = upsert.date.to_string();

            conn.execute(
                "INSERT INTO daily_metrics (id, user_id, date, value, origin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(user_id, date) DO UPDATE SET
                     value = excluded.value,
                     origin = excluded.origin,
                     updated_at = excluded.updated_at",
                params![
                    id,
                    upsert.user_id,
                    date,
                    to_i64(upsert.value)?,
                    upsert.origin.as_str(),
                    at,
                ],
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, user_id, date, value, origin, created_at, updated_at
                 FROM daily_metrics
                 WHERE user_id = ?1 AND date = ?2",
            )?;
            let mut rows = stmt.query(params![upsert.user_id, date])?;
            let record = match rows.next()? {
                Some(row) => row_to_record(row)?,
                None => return Err(anyhow!("daily metric not found after upsert")),
            };
            Ok(record)
        })
        .await
    }

    pub async fn count_daily_metrics(&self, user_id: &str, date: DayKey) -> Result<u64> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM daily_metrics WHERE user_id = ?1 AND date = ?2",
                params![user_id, date.to_string()],
                |row| row.get(0),
            )?;
            to_u64(count, "count")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::SampleOrigin;
    use chrono::{TimeZone, Utc};

    fn key(raw: &str) -> DayKey {
        raw.parse().unwrap()
    }

    fn upsert(date: &str, value: u64, hour: u32) -> MetricUpsert {
        MetricUpsert {
            user_id: "user-1".into(),
            date: key(date),
            value,
            origin: SampleOrigin::DeviceApi,
            at: Utc.with_ymd_and_hms(2025, 6, 9, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let db = Database::new_in_memory().unwrap();

        let first = db.upsert_daily_metric(&upsert("2025-06-08", 6000, 8)).await.unwrap();
        let second = db.upsert_daily_metric(&upsert("2025-06-08", 6649, 9)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.value, 6649);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(db.count_daily_metrics("user-1", key("2025-06-08")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn range_query_is_bounded_filtered_and_ordered() {
        let db = Database::new_in_memory().unwrap();
        for (date, value) in [
            ("2025-06-09", 7234),
            ("2025-06-02", 1),
            ("2025-06-07", 8461),
            ("2025-06-10", 2),
        ] {
            db.upsert_daily_metric(&upsert(date, value, 8)).await.unwrap();
        }
        let mut other_user = upsert("2025-06-08", 5, 8);
        other_user.user_id = "user-2".into();
        db.upsert_daily_metric(&other_user).await.unwrap();

        let records = db
            .get_daily_metrics_in_range("user-1", key("2025-06-03"), key("2025-06-09"))
            .await
            .unwrap();
        let got: Vec<(String, u64)> = records
            .iter()
            .map(|r| (r.date.to_string(), r.value))
            .collect();
        assert_eq!(
            got,
            vec![("2025-06-07".to_string(), 8461), ("2025-06-09".to_string(), 7234)]
        );
    }

    #[tokio::test]
    async fn file_backed_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stepsync.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.upsert_daily_metric(&upsert("2025-06-08", 6649, 8)).await.unwrap();
        }
        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(Database::new_in_memory().unwrap().path().is_none());
        let records = db
            .get_daily_metrics_in_range("user-1", key("2025-06-08"), key("2025-06-08"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 6649);
    }
}
