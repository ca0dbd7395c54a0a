use serde::Serialize;

use crate::calendar::DayKey;
use crate::window::DailyMetricSample;

use super::config::MIN_REPEAT_RUN;

/// A run of consecutive days that all report the same non-zero value.
///
/// This is the signature of a stale device sample repeated onto neighbouring
/// days. The values are left untouched; `flagged` lists the days that must be
/// read again, which is every day of the run except the most recent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityWarning {
    pub value: u64,
    pub run_start: DayKey,
    pub run_end: DayKey,
    pub flagged: Vec<DayKey>,
}

impl IntegrityWarning {
    pub fn run_length(&self) -> usize {
        self.run_start.days_until(self.run_end) as usize + 1
    }
}

/// Scan ascending samples for runs of at least `min_run` consecutive calendar
/// days with an identical non-zero value.
///
/// Equal values on non-adjacent days are never reported, and a missing day
/// breaks a run. `min_run` below `MIN_REPEAT_RUN` is raised to it.
pub fn detect_repeated_runs(
    samples: &[DailyMetricSample],
    min_run: usize,
) -> Vec<IntegrityWarning> {
    let min_run = min_run.max(MIN_REPEAT_RUN);
    let mut warnings = Vec::new();
    let mut run: Vec<&DailyMetricSample> = Vec::new();

    for sample in samples {
        let extends = match run.last() {
            Some(last) => {
                sample.value != 0
                    && sample.value == last.value
                    && last.date.is_followed_by(sample.date)
            }
            None => false,
        };

        if !extends {
            close_run(&run, min_run, &mut warnings);
            run.clear();
        }
        if sample.value != 0 {
            run.push(sample);
        }
    }
    close_run(&run, min_run, &mut warnings);

    warnings
}

fn close_run(run: &[&DailyMetricSample], min_run: usize, warnings: &mut Vec<IntegrityWarning>) {
    if run.len() < min_run {
        return;
    }
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return;
    };
    warnings.push(IntegrityWarning {
        value: first.value,
        run_start: first.date,
        run_end: last.date,
        flagged: run[..run.len() - 1].iter().map(|sample| sample.date).collect(),
    });
}
