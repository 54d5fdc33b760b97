//! Data access port implementations.

pub mod in_memory;

pub use in_memory::{InMemoryMonitoringStore, StoreSeed};
