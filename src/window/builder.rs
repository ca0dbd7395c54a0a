use std::collections::BTreeMap;

use log::warn;

use crate::calendar::DayKey;
use crate::error::WindowError;

use super::types::{DailyMetricSample, MetricWindow};

/// Build the window for `[start, end]` from a sparse per-date mapping.
///
/// Every day in range appears exactly once, ascending. Days absent from
/// `known` become synthetic zeroes; keys outside the range are ignored. The
/// map key is the identity of a sample, so a sample filed under the wrong key
/// is re-dated to its key rather than moved.
pub fn build_window(
    start: DayKey,
    end: DayKey,
    known: &BTreeMap<DayKey, DailyMetricSample>,
) -> Result<MetricWindow, WindowError> {
    if start > end {
        return Err(WindowError::InvalidRange { start, end });
    }

    let expected_len = start.days_until(end) as usize + 1;
    let mut days = Vec::with_capacity(expected_len);

    for date in DayKey::range_inclusive(start, end) {
        let sample = match known.get(&date) {
            Some(sample) => {
                if sample.date != date {
                    warn!(
                        "sample dated {} was filed under {}; keeping it on {}",
                        sample.date, date, date
                    );
                }
                DailyMetricSample {
                    date,
                    ..sample.clone()
                }
            }
            None => DailyMetricSample::synthetic(date),
        };
        days.push(sample);
    }

    debug_assert_eq!(days.len(), expected_len);
    Ok(MetricWindow::from_parts(start, end, days))
}
