mod connection;
mod helpers;
#[cfg(test)]
mod memory;
mod migrations;
pub mod models;
mod repositories;
mod store;

pub use connection::Database;
#[cfg(test)]
pub use memory::MemoryStore;
pub use models::{MetricUpsert, PersistedRecord, RereadFlag};
pub use store::MetricStore;
