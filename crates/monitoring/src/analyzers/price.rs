//! Price anomaly analyzer: recorded unit price vs. current catalog price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Analyzer, Finding, ScanSnapshot, display_amount};
use crate::issue::{IssueKind, Severity};
use crate::scoring::confidence_from_ratio;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceThresholds {
    /// Maximum tolerated `|catalog - unit| / catalog` (e.g. 0.05).
    pub variance: Decimal,
}

impl Default for PriceThresholds {
    fn default() -> Self {
        Self {
            variance: Decimal::new(5, 2),
        }
    }
}

/// Emits at most one finding per product per scan: the first (newest) sale
/// event whose price deviates beyond the tolerance.
///
/// Severity is fixed at `Medium` regardless of the variance.
#[derive(Debug, Clone, Default)]
pub struct PriceAnalyzer {
    thresholds: PriceThresholds,
}

impl PriceAnalyzer {
    pub fn new(thresholds: PriceThresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for PriceAnalyzer {
    fn name(&self) -> &'static str {
        "price"
    }

    fn kind(&self) -> IssueKind {
        IssueKind::PriceAnomaly
    }

    fn analyze(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();

        for product in snapshot.active_products() {
            let catalog = product.selling_price;
            // Variance is undefined against a zero catalog price.
            if catalog.is_zero() {
                continue;
            }

            let deviating = snapshot.sales_for(product.id).find(|sale| {
                (catalog - sale.unit_price)
                    .abs()
                    .checked_div(catalog)
                    .is_some_and(|variance| variance > self.thresholds.variance)
            });

            let Some(sale) = deviating else {
                continue;
            };

            debug!(product_id = %product.id, sale_id = %sale.id, %catalog, unit_price = %sale.unit_price, "price anomaly");
            let difference = (catalog - sale.unit_price).abs();
            findings.push(Finding {
                kind: IssueKind::PriceAnomaly,
                product_id: product.id,
                severity: Severity::Medium,
                expected_value: catalog,
                actual_value: sale.unit_price,
                confidence: confidence_from_ratio(difference, catalog),
                description: format!(
                    "Price anomaly for {} ({}). Expected price {}, actual {}.",
                    product.name,
                    product.sku,
                    display_amount(catalog),
                    display_amount(sale.unit_price)
                ),
            });
        }

        findings
    }
}
