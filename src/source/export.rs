use std::{fs, path::Path};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::calendar::LocalDayBoundary;
use crate::error::DeviceReadError;

use super::{HealthSource, RawSample};

/// Device source backed by a JSON export of raw health samples.
///
/// The export is a JSON array of samples as the health API reported them.
/// Queries return the samples whose start falls inside the boundary.
#[derive(Debug, Clone, Default)]
pub struct ExportedSamples {
    samples: Vec<RawSample>,
}

impl ExportedSamples {
    pub fn new(mut samples: Vec<RawSample>) -> Self {
        samples.sort_by_key(|sample| sample.start);
        Self { samples }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sample export {}", path.display()))?;
        let samples: Vec<RawSample> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse sample export {}", path.display()))?;
        Ok(Self::new(samples))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl HealthSource for ExportedSamples {
    async fn query_samples(
        &self,
        boundary: &LocalDayBoundary,
    ) -> Result<Vec<RawSample>, DeviceReadError> {
        let first = self
            .samples
            .partition_point(|sample| sample.start < boundary.start);
        Ok(self.samples[first..]
            .iter()
            .take_while(|sample| sample.start <= boundary.end)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DayKey;
    use chrono::{DateTime, Utc};
    use std::io::Write;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn loads_export_and_answers_single_day_queries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"start": "2025-06-09T09:00:00Z", "end": "2025-06-09T09:10:00Z", "value": 700}},
                {{"start": "2025-06-08T23:59:59.999Z", "end": "2025-06-09T00:05:00Z", "value": 30}},
                {{"start": "2025-06-08T10:00:00Z", "end": "2025-06-08T10:10:00Z", "value": 500, "reportedDay": "2025-06-08"}}
            ]"#
        )
        .unwrap();

        let export = ExportedSamples::from_json_file(file.path()).unwrap();
        assert_eq!(export.len(), 3);

        let day: DayKey = "2025-06-08".parse().unwrap();
        let boundary = LocalDayBoundary::for_day(day, &Utc).unwrap();
        let samples = export.query_samples(&boundary).await.unwrap();

        let values: Vec<u64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![500, 30]);
        assert_eq!(samples[0].reported_day, Some(day));
        assert_eq!(samples[1].start, utc("2025-06-08T23:59:59.999Z"));
    }

    #[test]
    fn malformed_export_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"samples\": 3}}").unwrap();
        assert!(ExportedSamples::from_json_file(file.path()).is_err());
    }
}
