//! Inventory discrepancy analyzer.
//!
//! Model:
//! - Velocity = mean quantity per sale event of the product inside the fetched window.
//! - Predicted stock = `max(current_stock - velocity * horizon_days, 0)`.
//! - Flag when `|predicted - actual| > max(relative * predicted, floor_units)`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockwatch_products::Product;
use stockwatch_sales::SaleEvent;

use super::{Analyzer, Finding, ScanSnapshot, display_amount};
use crate::issue::IssueKind;
use crate::scoring::{confidence_from_ratio, severity_from_discrepancy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryThresholds {
    /// Days the sales velocity is projected across.
    pub horizon_days: u32,
    /// Relative tolerance as a fraction of the predicted stock (e.g. 0.05).
    pub relative: Decimal,
    /// Absolute tolerance in units; the larger of the two applies.
    pub floor_units: Decimal,
}

impl Default for InventoryThresholds {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            relative: Decimal::new(5, 2),
            floor_units: Decimal::from(10),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryAnalyzer {
    thresholds: InventoryThresholds,
}

impl InventoryAnalyzer {
    pub fn new(thresholds: InventoryThresholds) -> Self {
        Self { thresholds }
    }

    /// Stock level expected after `horizon_days` at the observed velocity.
    pub fn predict_stock<'a, I>(&self, product: &Product, sales: I) -> Decimal
    where
        I: IntoIterator<Item = &'a SaleEvent>,
    {
        let (units, events) = sales
            .into_iter()
            .fold((Decimal::ZERO, 0u32), |(units, n), s| (units + Decimal::from(s.quantity), n + 1));
        let velocity = units.checked_div(Decimal::from(events)).unwrap_or(Decimal::ZERO);
        let projected = velocity * Decimal::from(self.thresholds.horizon_days);

        (Decimal::from(product.current_stock) - projected).max(Decimal::ZERO)
    }

    fn tolerance(&self, predicted: Decimal) -> Decimal {
        (predicted * self.thresholds.relative).max(self.thresholds.floor_units)
    }
}

impl Analyzer for InventoryAnalyzer {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn kind(&self) -> IssueKind {
        IssueKind::InventoryDiscrepancy
    }

    fn analyze(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();

        for product in snapshot.active_products() {
            let predicted = self.predict_stock(product, snapshot.sales_for(product.id));
            let actual = Decimal::from(product.current_stock);
            let discrepancy = (predicted - actual).abs();

            if discrepancy <= self.tolerance(predicted) {
                continue;
            }

            debug!(product_id = %product.id, %predicted, %actual, "inventory discrepancy");
            findings.push(Finding {
                kind: IssueKind::InventoryDiscrepancy,
                product_id: product.id,
                severity: severity_from_discrepancy(discrepancy),
                expected_value: predicted,
                actual_value: actual,
                confidence: confidence_from_ratio(discrepancy, predicted),
                description: format!(
                    "Inventory discrepancy for {} ({}). Expected {} units, found {} units.",
                    product.name,
                    product.sku,
                    display_amount(predicted),
                    display_amount(actual)
                ),
            });
        }

        findings
    }
}
