pub mod builder;
pub mod types;

pub use builder::build_window;
pub use types::{DailyMetricSample, MetricWindow, SampleOrigin};
