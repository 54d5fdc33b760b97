//! `stockwatch-monitoring`
//!
//! **Responsibility:** the anomaly-detection and issue-lifecycle engine.
//!
//! - Analyzers inspect inventory, transaction pricing and sales velocity over one
//!   immutable snapshot and report findings.
//! - The lifecycle manager turns findings into issues and closes them (manually,
//!   or automatically under a bounded policy).
//! - The engine coordinates a scan cycle with single-flight, deadline and
//!   cancellation semantics.
//! - Insights and the health score are pure functions over aggregate data.
//!
//! The data store is reached only through [`MonitoringStore`].

pub mod analyzers;
pub mod cancel;
pub mod engine;
pub mod health;
pub mod insights;
pub mod issue;
pub mod lifecycle;
pub mod port;
pub mod scoring;

pub use analyzers::{Analyzer, Finding, ScanSnapshot};
pub use cancel::CancelToken;
pub use engine::{EngineSettings, MonitoringEngine, ScanCycleResult, ScanError, accuracy_estimate};
pub use health::{HealthPolicy, compute_health_score};
pub use insights::{MAX_INSIGHTS, generate_insights};
pub use issue::{
    AUTO_RESOLVED_MARKER, Confidence, Issue, IssueInput, IssueKind, IssueStatus, ResolvedBy, Severity,
};
pub use lifecycle::{AutoResolvePolicy, IssueLifecycle};
pub use port::{MonitoringStore, StoreError};
pub use scoring::{confidence_from_ratio, severity_from_discrepancy};
