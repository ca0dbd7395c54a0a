use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use crate::calendar::DayKey;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the SQLite store and settings.json
    #[arg(long, value_name = "DIR", env = "STEPSYNC_DATA_DIR", default_value = ".stepsync")]
    pub data_dir: PathBuf,

    /// User whose history is read and written (overrides settings)
    #[arg(long, env = "STEPSYNC_USER")]
    pub user: Option<String>,

    /// IANA time zone used to cut local days (overrides settings)
    #[arg(long, env = "STEPSYNC_TZ")]
    pub tz: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the device export, merge it with stored history and print the window
    Sync {
        /// JSON export of raw health samples
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,

        #[command(flatten)]
        range: RangeArgs,

        /// Read every past day again instead of only today and flagged days
        #[arg(long)]
        resync: bool,
    },

    /// Print the window from stored history only
    Show {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Update persisted settings and print them
    Config {
        #[arg(long)]
        set_user: Option<String>,

        #[arg(long)]
        set_tz: Option<String>,

        #[arg(long)]
        window_days: Option<u32>,

        #[arg(long)]
        min_repeat_run: Option<usize>,

        #[arg(long)]
        max_concurrent_reads: Option<usize>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<DayKey>,

    /// Last day of the window, defaults to today
    #[arg(long)]
    pub end: Option<DayKey>,

    /// Window length in days when --start is omitted
    #[arg(long)]
    pub days: Option<u32>,
}

impl RangeArgs {
    /// Resolve the inclusive window against `today` and the configured length.
    pub fn resolve(&self, today: DayKey, default_days: u32) -> Result<(DayKey, DayKey)> {
        let end = self.end.unwrap_or(today);
        let start = match self.start {
            Some(start) => start,
            None => {
                let days = self.days.unwrap_or(default_days).max(1);
                end.offset(-(i64::from(days) - 1))
                    .ok_or_else(|| anyhow!("window of {days} days before {end} is out of range"))?
            }
        };
        if start > end {
            return Err(anyhow!("--start {start} is after --end {end}"));
        }
        Ok((start, end))
    }
}
