//! Recorded sale events (transactions).
//!
//! Sale events are immutable once created and read-only to the monitoring engine.

pub mod sale_event;

pub use sale_event::{SaleEvent, sales_within};
