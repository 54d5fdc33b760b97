//! Aggregate health score in `[0, 100]`.
//!
//! Baseline 100; each signal subtracts a fixed penalty; floored at 0:
//! - every unresolved `Critical` / `High` issue,
//! - every active product below the low-stock floor,
//! - weak or absent sales volume in the last 24 hours.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockwatch_products::{LOW_STOCK_FLOOR, Product};
use stockwatch_sales::{SaleEvent, sales_within};

use crate::issue::{Issue, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    pub low_stock_floor: u32,
    pub critical_issue_penalty: u32,
    pub high_issue_penalty: u32,
    pub low_stock_penalty: u32,
    pub no_recent_sales_penalty: u32,
    pub weak_recent_sales_penalty: u32,
    /// More sales than this in the last 24h counts as adequate volume.
    pub adequate_daily_sales: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            low_stock_floor: LOW_STOCK_FLOOR,
            critical_issue_penalty: 20,
            high_issue_penalty: 10,
            low_stock_penalty: 5,
            no_recent_sales_penalty: 20,
            weak_recent_sales_penalty: 10,
            adequate_daily_sales: 5,
        }
    }
}

pub fn compute_health_score(
    issues: &[Issue],
    products: &[Product],
    sales: &[SaleEvent],
    now: DateTime<Utc>,
    policy: &HealthPolicy,
) -> u8 {
    let open = issues.iter().filter(|i| i.is_open());
    let (critical, high) = open.fold((0u64, 0u64), |(c, h), issue| match issue.severity() {
        Severity::Critical => (c + 1, h),
        Severity::High => (c, h + 1),
        _ => (c, h),
    });

    let low_stock = products
        .iter()
        .filter(|p| p.is_low_stock_below(policy.low_stock_floor))
        .count() as u64;

    let recent = sales_within(sales, now - Duration::hours(24), now) as u64;
    let volume_penalty = if recent == 0 {
        policy.no_recent_sales_penalty
    } else if recent <= u64::from(policy.adequate_daily_sales) {
        policy.weak_recent_sales_penalty
    } else {
        0
    };

    let penalty = critical * u64::from(policy.critical_issue_penalty)
        + high * u64::from(policy.high_issue_penalty)
        + low_stock * u64::from(policy.low_stock_penalty)
        + u64::from(volume_penalty);

    100u64.saturating_sub(penalty) as u8
}
