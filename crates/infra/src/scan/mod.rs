//! Background scan scheduling.

pub mod runner;

pub use runner::{
    InMemoryScanReportSink, ScanReport, ScanReportSink, ScanRunner, ScanRunnerHandle,
};
