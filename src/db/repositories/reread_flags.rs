use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::calendar::DayKey;
use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_day_key},
    models::RereadFlag,
};

fn row_to_flag(row: &Row) -> Result<RereadFlag> {
    let date: String = row.get("date")?;
    let flagged_at: String = row.get("flagged_at")?;

    Ok(RereadFlag {
        user_id: row.get("user_id")?,
        date: parse_day_key(&date, "date")?,
        reason: row.get("reason")?,
        flagged_at: parse_datetime(&flagged_at, "flagged_at")?,
    })
}

impl Database {
    pub async fn get_reread_flags_in_range(
        &self,
        user_id: &str,
        start: DayKey,
        end: DayKey,
    ) -> Result<Vec<RereadFlag>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, date, reason, flagged_at
                 FROM reread_flags
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )?;

            let mut rows = stmt.query(params![user_id, start.to_string(), end.to_string()])?;
            let mut flags = Vec::new();
            while let Some(row) = rows.next()? {
                flags.push(row_to_flag(row)?);
            }

            Ok(flags)
        })
        .await
    }

    /// Flag every date in one transaction. Re-flagging refreshes reason and time.
    pub async fn insert_reread_flags(
        &self,
        user_id: &str,
        dates: &[DayKey],
        reason: &str,
        flagged_at: DateTime<Utc>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let dates = dates.to_vec();
        let reason = reason.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for date in &dates {
                tx.execute(
                    "INSERT INTO reread_flags (user_id, date, reason, flagged_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(user_id, date) DO UPDATE SET
                         reason = excluded.reason,
                         flagged_at = excluded.flagged_at",
                    params![user_id, date.to_string(), reason, flagged_at.to_rfc3339()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn delete_reread_flag(&self, user_id: &str, date: DayKey) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM reread_flags WHERE user_id = ?1 AND date = ?2",
                params![user_id, date.to_string()],
            )?;
            Ok(())
        })
        .await
    }
}
