//! Analyzers: deterministic detectors over one immutable scan snapshot.
//!
//! Analyzers only read the snapshot. They have no cross-analyzer dependencies,
//! so the engine may run them in parallel; the order of their output is fixed by
//! the order they are registered in.

pub mod inventory;
pub mod price;
pub mod sales_pattern;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwatch_core::ProductId;
use stockwatch_products::Product;
use stockwatch_sales::SaleEvent;

use crate::issue::{Confidence, Issue, IssueInput, IssueKind, Severity};

pub use inventory::{InventoryAnalyzer, InventoryThresholds};
pub use price::{PriceAnalyzer, PriceThresholds};
pub use sales_pattern::{SalesPatternAnalyzer, SalesPatternThresholds};

/// A detector run once per scan cycle.
///
/// Must not mutate any state and must be a pure function of the snapshot.
pub trait Analyzer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The kind of issue this analyzer reports.
    fn kind(&self) -> IssueKind;

    fn analyze(&self, snapshot: &ScanSnapshot) -> Vec<Finding>;
}

/// One analyzer result, before it becomes an `Issue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: IssueKind,
    pub product_id: ProductId,
    pub severity: Severity,
    pub expected_value: Decimal,
    pub actual_value: Decimal,
    pub confidence: Confidence,
    pub description: String,
}

impl Finding {
    pub fn discrepancy(&self) -> Decimal {
        (self.expected_value - self.actual_value).abs()
    }
}

impl From<&Finding> for IssueInput {
    fn from(f: &Finding) -> Self {
        IssueInput {
            kind: f.kind,
            severity: f.severity,
            product_id: Some(f.product_id),
            expected_value: f.expected_value,
            actual_value: f.actual_value,
            confidence: f.confidence.value(),
            description: f.description.clone(),
        }
    }
}

/// Immutable view of the data fetched at the start of a scan cycle.
#[derive(Debug, Clone)]
pub struct ScanSnapshot {
    products: Vec<Product>,
    sales: Vec<SaleEvent>,
    open_issues: Vec<Issue>,
    taken_at: DateTime<Utc>,
    sales_by_product: BTreeMap<ProductId, Vec<usize>>,
}

impl ScanSnapshot {
    pub fn new(
        products: Vec<Product>,
        sales: Vec<SaleEvent>,
        open_issues: Vec<Issue>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        let mut sales_by_product: BTreeMap<ProductId, Vec<usize>> = BTreeMap::new();
        for (idx, sale) in sales.iter().enumerate() {
            sales_by_product.entry(sale.product_id).or_default().push(idx);
        }

        Self {
            products,
            sales,
            open_issues,
            taken_at,
            sales_by_product,
        }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products flagged active. The port already filters, this guards against
    /// stores that do not.
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_active)
    }

    pub fn sales(&self) -> &[SaleEvent] {
        &self.sales
    }

    /// Sale events of one product, in the order the store returned them (newest first).
    pub fn sales_for(&self, product_id: ProductId) -> impl Iterator<Item = &SaleEvent> {
        self.sales_by_product
            .get(&product_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.sales[idx])
    }

    pub fn has_sales(&self, product_id: ProductId) -> bool {
        self.sales_by_product.contains_key(&product_id)
    }

    pub fn open_issues(&self) -> &[Issue] {
        &self.open_issues
    }
}

/// Human-readable rendering of a decimal quantity (at most two decimals).
pub(crate) fn display_amount(value: Decimal) -> String {
    value.round_dp(2).normalize().to_string()
}
