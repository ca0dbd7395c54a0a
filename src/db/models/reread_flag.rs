use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;

/// Marks a date whose stored value is unverified until the device is read again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RereadFlag {
    pub user_id: String,
    pub date: DayKey,
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}
