//! Infrastructure layer: configuration, stores and the background scan runner.

pub mod config;
pub mod scan;
pub mod store;


pub use config::{ConfigError, LoadOptions, MonitorConfig};
pub use scan::{InMemoryScanReportSink, ScanReport, ScanReportSink, ScanRunner, ScanRunnerHandle};
pub use store::{InMemoryMonitoringStore, StoreSeed};
