//! Sales pattern analyzer: trailing daily average vs. the most recent day.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockwatch_sales::sales_within;

use super::{Analyzer, Finding, ScanSnapshot, display_amount};
use crate::issue::{IssueKind, Severity};
use crate::scoring::confidence_from_ratio;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPatternThresholds {
    /// Length of the trailing window the daily average is computed over.
    pub trailing_days: u32,
    /// Flag when `|avg - yesterday| > deviation_factor * avg`.
    pub deviation_factor: Decimal,
}

impl Default for SalesPatternThresholds {
    fn default() -> Self {
        Self {
            trailing_days: 7,
            deviation_factor: Decimal::from(2),
        }
    }
}

/// Severity is fixed at `Low`.
#[derive(Debug, Clone, Default)]
pub struct SalesPatternAnalyzer {
    thresholds: SalesPatternThresholds,
}

impl SalesPatternAnalyzer {
    pub fn new(thresholds: SalesPatternThresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for SalesPatternAnalyzer {
    fn name(&self) -> &'static str {
        "sales_pattern"
    }

    fn kind(&self) -> IssueKind {
        IssueKind::SalesPattern
    }

    fn analyze(&self, snapshot: &ScanSnapshot) -> Vec<Finding> {
        let now = snapshot.taken_at();
        let trailing_days = self.thresholds.trailing_days.max(1);
        // Windows reaching past the representable range start at the earliest instant.
        let week_start = now
            .checked_sub_signed(Duration::days(i64::from(trailing_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let day_start = now - Duration::hours(24);

        let mut findings = Vec::new();

        for product in snapshot.active_products() {
            if !snapshot.has_sales(product.id) {
                continue;
            }

            let weekly = sales_within(snapshot.sales_for(product.id), week_start, now);
            let yesterday = sales_within(snapshot.sales_for(product.id), day_start, now);

            let avg_daily = Decimal::from(weekly as u64) / Decimal::from(trailing_days);
            let current = Decimal::from(yesterday as u64);
            let deviation = (avg_daily - current).abs();

            if avg_daily.is_zero() || deviation <= self.thresholds.deviation_factor * avg_daily {
                continue;
            }

            debug!(product_id = %product.id, %avg_daily, yesterday, "unusual sales pattern");
            findings.push(Finding {
                kind: IssueKind::SalesPattern,
                product_id: product.id,
                severity: Severity::Low,
                expected_value: avg_daily,
                actual_value: current,
                confidence: confidence_from_ratio(deviation, avg_daily),
                description: format!(
                    "Unusual sales pattern for {} ({}). Average daily sales: {}, current: {}.",
                    product.name,
                    product.sku,
                    display_amount(avg_daily),
                    yesterday
                ),
            });
        }

        findings
    }
}
