pub mod daily_metric;
pub mod reread_flag;

pub use daily_metric::{MetricUpsert, PersistedRecord};
pub use reread_flag::RereadFlag;
