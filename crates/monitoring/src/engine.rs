//! Scan orchestrator.
//!
//! One cycle: fetch snapshot -> run analyzers -> plan auto-resolution ->
//! commit (create issues, auto-resolve) -> report.
//!
//! - Single flight: a second `run_scan` while one is in flight fails fast with
//!   `ScanError::ConcurrencyConflict`; it is never queued.
//! - Deadline and cancellation are checked between phases. Once the commit phase
//!   starts it runs to completion, so a failed cycle never leaves partial writes.
//! - All writes (scan commits and manual resolutions) go through one writer lock.

use std::collections::HashSet;
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use stockwatch_core::{AdminId, Clock, Entity, IssueId, ProductId};
use stockwatch_products::Product;
use stockwatch_sales::SaleEvent;

use crate::analyzers::{
    Analyzer, Finding, InventoryAnalyzer, InventoryThresholds, PriceAnalyzer, PriceThresholds,
    SalesPatternAnalyzer, SalesPatternThresholds, ScanSnapshot,
};
use crate::cancel::CancelToken;
use crate::health::{HealthPolicy, compute_health_score};
use crate::insights::generate_insights;
use crate::issue::{Issue, IssueKind};
use crate::lifecycle::{AutoResolvePolicy, IssueLifecycle};
use crate::port::{MonitoringStore, StoreError};

/// Tunables for the engine. Infra builds this from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How many of the most recent sale events a cycle fetches.
    pub sale_window: usize,
    /// Overall budget for one cycle.
    pub deadline: Duration,
    pub parallel_analyzers: bool,
    /// Drop findings whose (kind, product) already has an open issue that this
    /// cycle does not auto-resolve. Off: every finding becomes a new issue.
    pub skip_duplicate_open_issues: bool,
    pub auto_resolve: AutoResolvePolicy,
    pub inventory: InventoryThresholds,
    pub price: PriceThresholds,
    pub sales_pattern: SalesPatternThresholds,
    pub health: HealthPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sale_window: 500,
            deadline: Duration::from_secs(30),
            parallel_analyzers: true,
            skip_duplicate_open_issues: false,
            auto_resolve: AutoResolvePolicy::default(),
            inventory: InventoryThresholds::default(),
            price: PriceThresholds::default(),
            sales_pattern: SalesPatternThresholds::default(),
            health: HealthPolicy::default(),
        }
    }
}

/// Statistics of one completed cycle. Immutable, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCycleResult {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub new_issues: usize,
    pub auto_resolved: usize,
    /// Findings that could not be written as issues.
    pub skipped_findings: usize,
    /// Auto-resolution attempts the store rejected.
    pub failed_resolutions: usize,
    /// Findings dropped because a matching issue was already open.
    #[serde(default)]
    pub duplicates_suppressed: usize,
    /// Accuracy estimate in `[0, 100]`.
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("scan aborted: {0}")]
    DataAccess(#[from] StoreError),

    #[error("a scan cycle is already in flight")]
    ConcurrencyConflict,

    #[error("scan deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },

    #[error("scan cancelled")]
    Cancelled,
}

/// `min(95, 80 + resolved / (resolved + new) * 15)`, or 95 when nothing happened.
pub fn accuracy_estimate(new_issues: usize, resolved: usize) -> f64 {
    let total = new_issues + resolved;
    if total == 0 {
        return 95.0;
    }
    (80.0 + (resolved as f64 / total as f64) * 15.0).min(95.0)
}

/// Drops findings already covered by an open issue that stays open this cycle.
fn suppress_duplicates(
    findings: Vec<Finding>,
    open_issues: &[Issue],
    resolving: &[IssueId],
) -> (Vec<Finding>, usize) {
    let covered: HashSet<(IssueKind, ProductId)> = open_issues
        .iter()
        .filter(|issue| !resolving.contains(issue.id()))
        .map(|issue| (issue.kind(), issue.product_id()))
        .collect();

    let before = findings.len();
    let kept: Vec<Finding> = findings
        .into_iter()
        .filter(|finding| !covered.contains(&(finding.kind, finding.product_id)))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The monitoring engine: an explicitly constructed instance, shared by
/// reference (or `Arc`) between the UI-facing caller and the background runner.
pub struct MonitoringEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    analyzers: Vec<Box<dyn Analyzer>>,
    lifecycle: IssueLifecycle,
    in_flight: AtomicBool,
    writer: Mutex<()>,
    cycles: AtomicU64,
}

impl<S: MonitoringStore> MonitoringEngine<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(InventoryAnalyzer::new(settings.inventory.clone())),
            Box::new(PriceAnalyzer::new(settings.price.clone())),
            Box::new(SalesPatternAnalyzer::new(settings.sales_pattern.clone())),
        ];

        Self {
            store,
            clock,
            lifecycle: IssueLifecycle::new(settings.auto_resolve.clone()),
            settings,
            analyzers,
            in_flight: AtomicBool::new(false),
            writer: Mutex::new(()),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle without a cancellation hook (scheduled cycles).
    pub fn run_scan(&self) -> Result<ScanCycleResult, ScanError> {
        self.run_scan_with(&CancelToken::new())
    }

    /// Run one cycle; `cancel` is honoured between phases.
    pub fn run_scan_with(&self, cancel: &CancelToken) -> Result<ScanCycleResult, ScanError> {
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(ScanError::ConcurrencyConflict)?;

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let started_at = self.clock.now();
        info!(cycle, "scan cycle started");

        let snapshot = self.fetch_snapshot(cycle, started_at)?;
        self.checkpoint(cycle, started, cancel, "fetch")?;

        let findings = self.analyze(&snapshot);
        self.checkpoint(cycle, started, cancel, "analyze")?;

        let batch = self.lifecycle.policy().select(snapshot.open_issues(), started_at);
        let (findings, duplicates) = if self.settings.skip_duplicate_open_issues {
            suppress_duplicates(findings, snapshot.open_issues(), &batch)
        } else {
            (findings, 0)
        };
        self.checkpoint(cycle, started, cancel, "plan")?;

        let (created, resolved) = {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let created = self.lifecycle.create_all(&self.store, &findings);
            let resolved = self.lifecycle.auto_resolve(&self.store, &batch, self.clock.now());
            (created, resolved)
        };

        let result = ScanCycleResult {
            cycle,
            started_at,
            new_issues: created.created.len(),
            auto_resolved: resolved.resolved.len(),
            skipped_findings: created.skipped,
            failed_resolutions: resolved.failed,
            duplicates_suppressed: duplicates,
            accuracy: accuracy_estimate(created.created.len(), resolved.resolved.len()),
        };

        info!(
            cycle,
            new_issues = result.new_issues,
            auto_resolved = result.auto_resolved,
            skipped_findings = result.skipped_findings,
            failed_resolutions = result.failed_resolutions,
            duplicates_suppressed = result.duplicates_suppressed,
            accuracy = result.accuracy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan cycle completed"
        );
        Ok(result)
    }

    /// Caller-initiated resolution (idempotent).
    pub fn resolve_issue(&self, issue_id: IssueId, admin: AdminId) -> Result<(), StoreError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.lifecycle
            .resolve_manually(&self.store, issue_id, admin, self.clock.now())
    }

    pub fn generate_insights(
        &self,
        products: &[Product],
        sales: &[SaleEvent],
        issues: &[Issue],
    ) -> Vec<String> {
        generate_insights(
            products,
            sales,
            issues,
            self.settings.health.low_stock_floor,
            &self.clock.now(),
        )
    }

    pub fn compute_health_score(
        &self,
        issues: &[Issue],
        products: &[Product],
        sales: &[SaleEvent],
    ) -> u8 {
        compute_health_score(issues, products, sales, self.clock.now(), &self.settings.health)
    }

    fn fetch_snapshot(&self, cycle: u64, taken_at: DateTime<Utc>) -> Result<ScanSnapshot, ScanError> {
        let fetched = self.store.get_active_products().and_then(|products| {
            let sales = self.store.get_recent_sale_events(self.settings.sale_window)?;
            let open_issues = self.store.get_open_issues()?;
            Ok((products, sales, open_issues))
        });

        match fetched {
            Ok((products, sales, open_issues)) => {
                debug!(
                    cycle,
                    products = products.len(),
                    sales = sales.len(),
                    open_issues = open_issues.len(),
                    "snapshot fetched"
                );
                Ok(ScanSnapshot::new(products, sales, open_issues, taken_at))
            }
            Err(e) => {
                warn!(cycle, error = %e, "scan aborted: fetch failed");
                Err(ScanError::DataAccess(e))
            }
        }
    }

    fn analyze(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        if !self.settings.parallel_analyzers {
            return self
                .analyzers
                .iter()
                .flat_map(|analyzer| analyzer.analyze(snapshot))
                .collect();
        }

        thread::scope(|scope| {
            let handles: Vec<_> = self
                .analyzers
                .iter()
                .map(|analyzer| scope.spawn(move || analyzer.analyze(snapshot)))
                .collect();

            // Join in registration order so the output order is stable.
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(findings) => findings,
                    Err(payload) => panic::resume_unwind(payload),
                })
                .collect()
        })
    }

    fn checkpoint(
        &self,
        cycle: u64,
        started: Instant,
        cancel: &CancelToken,
        phase: &'static str,
    ) -> Result<(), ScanError> {
        if cancel.is_cancelled() {
            warn!(cycle, phase, "scan cancelled by caller");
            return Err(ScanError::Cancelled);
        }

        let elapsed = started.elapsed();
        if elapsed > self.settings.deadline {
            warn!(cycle, phase, elapsed_ms = elapsed.as_millis() as u64, "scan deadline exceeded");
            return Err(ScanError::DeadlineExceeded { elapsed });
        }

        Ok(())
    }
}
