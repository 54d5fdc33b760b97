//! Issue lifecycle manager.
//!
//! Creates issues from analyzer findings and performs the two permitted
//! transitions:
//! - `Open -> Resolved(Admin)`: caller-initiated, always permitted, idempotent.
//! - `Open -> Resolved(AutomaticPolicy)`: engine-initiated, bounded per cycle.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use stockwatch_core::{AdminId, Entity, IssueId};

use crate::analyzers::Finding;
use crate::issue::{Issue, IssueInput, ResolvedBy, Severity};
use crate::port::{MonitoringStore, StoreError};

/// Rules for engine-initiated resolution.
///
/// Eligible: `Open`, `Low` severity and older than `min_age`. At most
/// `batch_size` issues are closed per cycle, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoResolvePolicy {
    pub batch_size: usize,
    pub min_age: Duration,
}

impl Default for AutoResolvePolicy {
    fn default() -> Self {
        Self {
            batch_size: 2,
            min_age: Duration::hours(24),
        }
    }
}

impl AutoResolvePolicy {
    pub fn is_eligible(&self, issue: &Issue, now: DateTime<Utc>) -> bool {
        issue.is_open() && issue.severity() == Severity::Low && issue.age(now) > self.min_age
    }

    /// Pick this cycle's batch: eligible issues, oldest first, capped at `batch_size`.
    pub fn select(&self, issues: &[Issue], now: DateTime<Utc>) -> Vec<IssueId> {
        let mut eligible: Vec<&Issue> = issues
            .iter()
            .filter(|issue| self.is_eligible(issue, now))
            .collect();
        eligible.sort_by_key(|issue| (issue.created_at(), *issue.id()));
        eligible
            .into_iter()
            .take(self.batch_size)
            .map(|issue| *issue.id())
            .collect()
    }
}

/// Outcome of writing a batch of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationReport {
    pub created: Vec<IssueId>,
    /// Findings that could not be written (logged, never fatal).
    pub skipped: usize,
}

/// Outcome of applying an auto-resolution batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoResolveReport {
    pub resolved: Vec<IssueId>,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IssueLifecycle {
    policy: AutoResolvePolicy,
}

impl IssueLifecycle {
    pub fn new(policy: AutoResolvePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AutoResolvePolicy {
        &self.policy
    }

    pub fn create<S: MonitoringStore + ?Sized>(
        &self,
        store: &S,
        finding: &Finding,
    ) -> Result<Issue, StoreError> {
        let input = IssueInput::from(finding);
        input.validate()?;
        store.create_issue(input)
    }

    /// Write every finding; a failing finding is logged and counted, the rest continue.
    pub fn create_all<S: MonitoringStore + ?Sized>(
        &self,
        store: &S,
        findings: &[Finding],
    ) -> CreationReport {
        let mut report = CreationReport::default();

        for finding in findings {
            match self.create(store, finding) {
                Ok(issue) => {
                    debug!(issue_id = %issue.id(), kind = %finding.kind, product_id = %finding.product_id, "issue created");
                    report.created.push(*issue.id());
                }
                Err(e) => {
                    warn!(kind = %finding.kind, product_id = %finding.product_id, error = %e, "skipping finding");
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Caller-initiated resolution. Resolving an already-resolved issue is a no-op.
    pub fn resolve_manually<S: MonitoringStore + ?Sized>(
        &self,
        store: &S,
        issue_id: IssueId,
        admin: AdminId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        store.resolve_issue(issue_id, ResolvedBy::Admin(admin), at)?;
        info!(issue_id = %issue_id, admin_id = %admin, "issue resolved by admin");
        Ok(())
    }

    /// Apply a batch chosen by [`AutoResolvePolicy::select`].
    pub fn auto_resolve<S: MonitoringStore + ?Sized>(
        &self,
        store: &S,
        batch: &[IssueId],
        at: DateTime<Utc>,
    ) -> AutoResolveReport {
        let mut report = AutoResolveReport::default();

        for &issue_id in batch.iter().take(self.policy.batch_size) {
            match store.resolve_issue(issue_id, ResolvedBy::AutomaticPolicy, at) {
                Ok(()) => {
                    debug!(issue_id = %issue_id, "issue auto-resolved");
                    report.resolved.push(issue_id);
                }
                Err(e) => {
                    warn!(issue_id = %issue_id, error = %e, "auto-resolution failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
