//! Issue (anomaly record) model and its resolution state machine.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwatch_core::{AdminId, DomainError, DomainResult, Entity, IssueId, ProductId};

/// Marker appended (as an audit note) when the automatic policy closes an issue.
pub const AUTO_RESOLVED_MARKER: &str = "[auto-resolved by policy]";

/// What kind of discrepancy an issue records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InventoryDiscrepancy,
    PriceAnomaly,
    SalesPattern,
}

impl IssueKind {
    pub const ALL: [IssueKind; 3] = [
        IssueKind::InventoryDiscrepancy,
        IssueKind::PriceAnomaly,
        IssueKind::SalesPattern,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::InventoryDiscrepancy => "inventory discrepancy",
            IssueKind::PriceAnomaly => "price anomaly",
            IssueKind::SalesPattern => "sales pattern",
        }
    }
}

impl core::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Four-tier ordinal classification. Variant order is the tier order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        })
    }
}

/// Confidence score in `[0, 100]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    pub const MAX: Confidence = Confidence(100);

    pub fn new(value: u8) -> DomainResult<Self> {
        if value > 100 {
            return Err(DomainError::out_of_range(
                "confidence",
                format!("expected 0..=100, got {value}"),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Confidence {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for u8 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// Who closed an issue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    Admin(AdminId),
    AutomaticPolicy,
}

/// Issue status. `Resolved` always carries both the timestamp and the resolver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Resolved { at: DateTime<Utc>, by: ResolvedBy },
}

impl IssueStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, IssueStatus::Open)
    }
}

/// Payload used to create a new issue through the data access port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInput {
    pub kind: IssueKind,
    pub severity: Severity,
    pub product_id: Option<ProductId>,
    pub expected_value: Decimal,
    pub actual_value: Decimal,
    pub confidence: u8,
    pub description: String,
}

impl IssueInput {
    pub fn validate(&self) -> DomainResult<()> {
        if self.product_id.is_none() {
            return Err(DomainError::validation("issue is missing a product reference"));
        }
        Confidence::new(self.confidence)?;
        if self.expected_value.is_sign_negative() || self.actual_value.is_sign_negative() {
            return Err(DomainError::validation(
                "expected and actual values cannot be negative",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }
        Ok(())
    }
}

/// Append-only anomaly record.
///
/// The only permitted transition is `Open -> Resolved`; issues are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IssueRecord")]
pub struct Issue {
    id: IssueId,
    kind: IssueKind,
    severity: Severity,
    product_id: ProductId,
    expected_value: Decimal,
    actual_value: Decimal,
    discrepancy: Decimal,
    confidence: Confidence,
    status: IssueStatus,
    description: String,
    audit_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl Issue {
    /// Build a new `Open` issue from a validated input.
    ///
    /// The discrepancy magnitude is derived (`|expected - actual|`), never supplied.
    pub fn open(id: IssueId, input: IssueInput, created_at: DateTime<Utc>) -> DomainResult<Self> {
        input.validate()?;
        let product_id = input
            .product_id
            .ok_or_else(|| DomainError::validation("issue is missing a product reference"))?;

        Ok(Self {
            id,
            kind: input.kind,
            severity: input.severity,
            product_id,
            expected_value: input.expected_value,
            actual_value: input.actual_value,
            discrepancy: (input.expected_value - input.actual_value).abs(),
            confidence: Confidence::new(input.confidence)?,
            status: IssueStatus::Open,
            description: input.description,
            audit_note: None,
            created_at,
        })
    }

    pub fn kind(&self) -> IssueKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn expected_value(&self) -> Decimal {
        self.expected_value
    }

    pub fn actual_value(&self) -> Decimal {
        self.actual_value
    }

    pub fn discrepancy(&self) -> Decimal {
        self.discrepancy
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn status(&self) -> IssueStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Original description, as written when the issue was detected.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn audit_note(&self) -> Option<&str> {
        self.audit_note.as_deref()
    }

    /// Description followed by the audit note, if any.
    pub fn full_description(&self) -> String {
        match &self.audit_note {
            Some(note) => format!("{} {}", self.description, note),
            None => self.description.clone(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Transition `Open -> Resolved`.
    ///
    /// Returns `false` (and changes nothing) when the issue is already resolved.
    pub fn resolve(&mut self, by: ResolvedBy, at: DateTime<Utc>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = IssueStatus::Resolved { at, by };
        if by == ResolvedBy::AutomaticPolicy {
            self.audit_note = Some(AUTO_RESOLVED_MARKER.to_string());
        }
        true
    }
}

impl Entity for Issue {
    type Id = IssueId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Wire shape of a stored issue; the derived magnitude is recomputed on load.
#[derive(Debug, Deserialize)]
struct IssueRecord {
    id: IssueId,
    kind: IssueKind,
    severity: Severity,
    product_id: ProductId,
    expected_value: Decimal,
    actual_value: Decimal,
    confidence: Confidence,
    status: IssueStatus,
    description: String,
    #[serde(default)]
    audit_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<IssueRecord> for Issue {
    type Error = DomainError;

    fn try_from(r: IssueRecord) -> Result<Self, Self::Error> {
        let mut issue = Issue::open(
            r.id,
            IssueInput {
                kind: r.kind,
                severity: r.severity,
                product_id: Some(r.product_id),
                expected_value: r.expected_value,
                actual_value: r.actual_value,
                confidence: r.confidence.value(),
                description: r.description,
            },
            r.created_at,
        )?;
        issue.status = r.status;
        issue.audit_note = r.audit_note;
        Ok(issue)
    }
}
