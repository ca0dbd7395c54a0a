use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::calendar::{DayKey, LocalDayBoundary};
use crate::error::DeviceReadError;

use super::{HealthSource, RawSample};

type QueryHook = Box<dyn Fn(&LocalDayBoundary) + Send + Sync>;

/// In-memory device source answering per-day queries from a script.
///
/// Responses are keyed by the queried day and returned verbatim, including
/// samples that belong to other days, so callers can reproduce a misbehaving
/// device. Every query boundary is recorded.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<DayKey, Result<Vec<RawSample>, DeviceReadError>>>,
    queries: Mutex<Vec<LocalDayBoundary>>,
    hook: Mutex<Option<QueryHook>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, date: DayKey, samples: Vec<RawSample>) {
        self.responses.lock().unwrap().insert(date, Ok(samples));
    }

    pub fn fail(&self, date: DayKey, error: DeviceReadError) {
        self.responses.lock().unwrap().insert(date, Err(error));
    }

    /// Run `hook` on every query, before the response is produced.
    pub fn on_query<F>(&self, hook: F)
    where
        F: Fn(&LocalDayBoundary) + Send + Sync + 'static,
    {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn queries(&self) -> Vec<LocalDayBoundary> {
        self.queries.lock().unwrap().clone()
    }

    pub fn queried_days(&self) -> Vec<DayKey> {
        let mut days: Vec<DayKey> = self.queries().iter().map(|b| b.date).collect();
        days.sort();
        days
    }
}

#[async_trait]
impl HealthSource for ScriptedSource {
    async fn query_samples(
        &self,
        boundary: &LocalDayBoundary,
    ) -> Result<Vec<RawSample>, DeviceReadError> {
        self.queries.lock().unwrap().push(*boundary);
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(boundary);
        }
        self.responses
            .lock()
            .unwrap()
            .get(&boundary.date)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
