pub mod calendar;
pub mod cli;
pub mod clock;
pub mod db;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod settings;
pub mod source;
pub mod utils;
pub mod window;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands, RangeArgs};
use clock::{Clock, SystemClock};
use db::Database;
use metrics::SyncMetrics;
use reconcile::{ReconcileRequest, Reconciler, SyncMode};
use settings::{parse_timezone, SettingsStore, UserSettings};
use source::{ExportedSamples, HealthSource, SourceReader};

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
    pub(crate) metrics: SyncMetrics,
    clock: Arc<dyn Clock>,
    user_override: Option<String>,
    tz_override: Option<Tz>,
}

impl AppState {
    fn open(data_dir: &Path, user: Option<String>, tz: Option<&str>) -> Result<Self> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!("Failed to create data directory {}", data_dir.display())
        })?;

        let database = Database::new(data_dir.join("stepsync.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let tz_override = tz.map(parse_timezone).transpose()?;

        Ok(Self {
            db: database,
            settings,
            metrics: SyncMetrics::new(),
            clock: Arc::new(SystemClock),
            user_override: user,
            tz_override,
        })
    }

    fn user_id(&self, settings: &UserSettings) -> String {
        self.user_override
            .clone()
            .unwrap_or_else(|| settings.user_id.clone())
    }

    fn reconciler(&self, source: Arc<dyn HealthSource>) -> Result<Reconciler> {
        let settings = self.settings.current();
        let tz = match self.tz_override {
            Some(tz) => tz,
            None => settings.tz()?,
        };

        let reader = SourceReader::new(source, tz, self.clock.clone());
        Ok(Reconciler::new(
            self.user_id(&settings),
            reader,
            Arc::new(self.db.clone()),
            self.clock.clone(),
            settings.reconcile,
        )
        .with_metrics(self.metrics.clone()))
    }
}

async fn sync(
    state: &AppState,
    samples: &Path,
    range: &RangeArgs,
    resync: bool,
    cancel: &CancellationToken,
) -> Result<reconcile::ReconcileOutcome> {
    let export = ExportedSamples::from_json_file(samples)?;
    info!("loaded {} samples from {}", export.len(), samples.display());

    let reconciler = state.reconciler(Arc::new(export))?;
    let (start, end) = range.resolve(reconciler.today(), state.settings.current().window_days)?;
    let mode = if resync {
        SyncMode::FullResync
    } else {
        SyncMode::Incremental
    };

    let outcome = reconciler
        .reconcile(&ReconcileRequest::new(start, end, mode), cancel)
        .await?;

    if let Some(cycle) = state.metrics.snapshot().await.recent_cycles.last() {
        info!(
            "cycle finished in {} ms: {} device reads, {} samples discarded, {} records written",
            cycle.total_ms, cycle.device_reads, cycle.samples_discarded, cycle.records_written
        );
    }
    Ok(outcome)
}

async fn show(state: &AppState, range: &RangeArgs) -> Result<window::MetricWindow> {
    // The stored window never reads the device; an empty export stands in.
    let reconciler = state.reconciler(Arc::new(ExportedSamples::default()))?;
    let (start, end) = range.resolve(reconciler.today(), state.settings.current().window_days)?;
    Ok(reconciler.stored_window(start, end).await?)
}

fn update_config(
    state: &AppState,
    set_user: Option<String>,
    set_tz: Option<String>,
    window_days: Option<u32>,
    min_repeat_run: Option<usize>,
    max_concurrent_reads: Option<usize>,
) -> Result<UserSettings> {
    state.settings.update(|settings| {
        if let Some(user) = set_user {
            settings.user_id = user;
        }
        if let Some(tz) = set_tz {
            settings.timezone = tz;
        }
        if let Some(days) = window_days {
            settings.window_days = days.max(1);
        }
        if let Some(run) = min_repeat_run {
            settings.reconcile.min_repeat_run = run;
        }
        if let Some(limit) = max_concurrent_reads {
            settings.reconcile.max_concurrent_reads = limit;
        }
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    info!("stepsync starting up...");

    let state = AppState::open(&cli.data_dir, cli.user.clone(), cli.tz.as_deref())?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after in-flight calls");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Sync {
            samples,
            range,
            resync,
        } => {
            let outcome = sync(&state, &samples, &range, resync, &cancel).await?;
            print_json(&outcome)
        }
        Commands::Show { range } => {
            let window = show(&state, &range).await?;
            print_json(&window)
        }
        Commands::Config {
            set_user,
            set_tz,
            window_days,
            min_repeat_run,
            max_concurrent_reads,
        } => {
            let settings = update_config(
                &state,
                set_user,
                set_tz,
                window_days,
                min_repeat_run,
                max_concurrent_reads,
            )?;
            print_json(&settings)
        }
    }
}
