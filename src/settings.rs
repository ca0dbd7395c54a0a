use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::reconcile::{ReconcileConfig, MIN_REPEAT_RUN};

const DEFAULT_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub user_id: String,
    /// IANA zone name used to cut local days.
    pub timezone: String,
    pub window_days: u32,
    pub reconcile: ReconcileConfig,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_id: "local".into(),
            timezone: "UTC".into(),
            window_days: DEFAULT_WINDOW_DAYS,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl UserSettings {
    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Reject settings that would cut days in an unknown zone or flag
    /// coincidental pairs as repeated reads.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.reconcile.min_repeat_run < MIN_REPEAT_RUN {
            bail!(
                "minRepeatRun must be at least {MIN_REPEAT_RUN}, got {}",
                self.reconcile.min_repeat_run
            );
        }
        Ok(())
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|err| anyhow!("unknown time zone {name:?}: {err}"))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_settings(&path)?
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> UserSettings {
        self.data.read().unwrap().clone()
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        self.data.read().unwrap().reconcile.clone()
    }

    /// Apply `change` and write the result to disk. Invalid settings are
    /// rejected and nothing is stored.
    pub fn update<F>(&self, change: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut guard = self.data.write().unwrap();
        let mut next = guard.clone();
        change(&mut next);
        next.validate()?;

        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn reload(&self) -> Result<()> {
        let data = read_settings(&self.path)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory {}", parent.display())
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn read_settings(path: &Path) -> Result<UserSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let data: UserSettings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
    data.validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(data)
}
