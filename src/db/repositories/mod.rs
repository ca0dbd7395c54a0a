pub mod daily_metrics;
pub mod reread_flags;
