//! Product catalog snapshot.
//!
//! Products are owned and mutated by the external store; the monitoring engine
//! only reads them. This crate holds the shape and the invariants a snapshot must
//! satisfy before it is analyzed.

pub mod product;

pub use product::{LOW_STOCK_FLOOR, Product};
