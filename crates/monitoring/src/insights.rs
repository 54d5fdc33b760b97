//! Short natural-language insights from aggregate statistics.
//!
//! Entries are emitted in a fixed category order (not ranked by impact) and the
//! list is capped at [`MAX_INSIGHTS`]. Output depends only on the inputs.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Timelike};
use rust_decimal::Decimal;

use stockwatch_core::ProductId;
use stockwatch_products::Product;
use stockwatch_sales::SaleEvent;

use crate::issue::{Issue, IssueKind};

pub const MAX_INSIGHTS: usize = 6;

/// Local hours (inclusive) treated as peak shopping time.
const PEAK_HOURS: core::ops::RangeInclusive<u32> = 9..=17;

pub fn generate_insights<Tz: TimeZone>(
    products: &[Product],
    sales: &[SaleEvent],
    issues: &[Issue],
    low_stock_floor: u32,
    now: &DateTime<Tz>,
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(aov) = average_order_value(sales) {
        insights.push(format!(
            "Average order value is ${aov:.2}. Consider upselling strategies for orders below this threshold."
        ));
    }

    if let Some((product_id, revenue)) = top_revenue_product(sales) {
        let name = products
            .iter()
            .find(|p| p.id == product_id)
            .map_or("Unknown product", |p| p.name.as_str());
        insights.push(format!(
            "{name} is your top performer with ${revenue:.2} in revenue. Consider increasing inventory."
        ));
    }

    let low_stock = products
        .iter()
        .filter(|p| p.is_low_stock_below(low_stock_floor))
        .count();
    if low_stock > 0 {
        insights.push(format!(
            "{} low stock levels. Consider restocking to avoid stockouts.",
            products_have(low_stock)
        ));
    }

    if let Some((kind, count)) = most_common_issue_kind(issues) {
        insights.push(format!(
            "Most common issue type is \"{kind}\" with {count} occurrence{}. Focus on resolving these patterns.",
            if count == 1 { "" } else { "s" }
        ));
    }

    if PEAK_HOURS.contains(&now.hour()) {
        insights.push(
            "Peak shopping hours detected. Monitor system performance and ensure adequate inventory for high-demand products."
                .to_string(),
        );
    }

    let active = products.iter().filter(|p| p.is_active).count();
    let inactive = products.len() - active;
    // Fewer than 80% of the catalog is active.
    if active * 5 < products.len() * 4 {
        insights.push(format!(
            "{} inactive. Review and reactivate profitable items to increase revenue potential.",
            products_are(inactive)
        ));
    }

    let high_margin = products
        .iter()
        .filter(|p| p.margin_ratio().is_some_and(|m| m > Decimal::new(5, 1)))
        .count();
    if high_margin > 0 {
        insights.push(format!(
            "{} high profit margins (>50%). These are excellent candidates for promotional campaigns.",
            products_have(high_margin)
        ));
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

fn average_order_value(sales: &[SaleEvent]) -> Option<Decimal> {
    let total: Decimal = sales.iter().map(|s| s.total_amount).sum();
    total.checked_div(Decimal::from(sales.len() as u64))
}

/// Highest aggregated revenue; ties go to the lowest product id.
fn top_revenue_product(sales: &[SaleEvent]) -> Option<(ProductId, Decimal)> {
    let mut revenue: BTreeMap<ProductId, Decimal> = BTreeMap::new();
    for sale in sales {
        *revenue.entry(sale.product_id).or_default() += sale.total_amount;
    }

    let mut best: Option<(ProductId, Decimal)> = None;
    for (id, total) in revenue {
        if best.is_none_or(|(_, top)| total > top) {
            best = Some((id, total));
        }
    }
    best
}

/// Most frequent kind across open and resolved issues; ties go to the earlier kind.
fn most_common_issue_kind(issues: &[Issue]) -> Option<(IssueKind, usize)> {
    IssueKind::ALL
        .iter()
        .map(|&kind| (kind, issues.iter().filter(|i| i.kind() == kind).count()))
        .filter(|&(_, count)| count > 0)
        .fold(None, |best, (kind, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((kind, count)),
        })
}

fn products_have(n: usize) -> String {
    if n == 1 {
        "1 product has".to_string()
    } else {
        format!("{n} products have")
    }
}

fn products_are(n: usize) -> String {
    if n == 1 {
        "1 product is".to_string()
    } else {
        format!("{n} products are")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};
    use proptest::prelude::*;
    use stockwatch_core::{IssueId, SaleEventId};
    use stockwatch_products::LOW_STOCK_FLOOR;

    use crate::issue::{IssueInput, Severity};

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 3, hour, 30, 0).unwrap()
    }

    fn product(name: &str, stock: u32, active: bool) -> Product {
        Product {
            id: ProductId::new(),
            sku: format!("SKU-{name}"),
            name: name.to_string(),
            cost_price: Decimal::from(6),
            selling_price: Decimal::from(10),
            current_stock: stock,
            is_active: active,
        }
    }

    fn sale(product: &Product, total: i64) -> SaleEvent {
        SaleEvent {
            id: SaleEventId::new(),
            product_id: product.id,
            quantity: 1,
            unit_price: Decimal::from(total),
            total_amount: Decimal::from(total),
            location: "Medan".to_string(),
            occurred_at: at_hour(6) - Duration::hours(1),
        }
    }

    fn issue(kind: IssueKind) -> Issue {
        Issue::open(
            IssueId::new(),
            IssueInput {
                kind,
                severity: Severity::Low,
                product_id: Some(ProductId::new()),
                expected_value: Decimal::from(1),
                actual_value: Decimal::from(5),
                confidence: 80,
                description: "detected".to_string(),
            },
            at_hour(1),
        )
        .unwrap()
    }

    #[test]
    fn empty_input_yields_no_insights_off_peak() {
        assert!(generate_insights(&[], &[], &[], LOW_STOCK_FLOOR, &at_hour(3)).is_empty());
    }

    #[test]
    fn categories_follow_fixed_order() {
        let shoes = product("Shoes", 500, true);
        let hats = product("Hats", 500, true);
        let sales = vec![sale(&shoes, 30), sale(&hats, 50), sale(&shoes, 40)];
        let issues = vec![
            issue(IssueKind::PriceAnomaly),
            issue(IssueKind::SalesPattern),
            issue(IssueKind::PriceAnomaly),
        ];

        let insights = generate_insights(&[shoes, hats], &sales, &issues, LOW_STOCK_FLOOR, &at_hour(3));

        assert_eq!(
            insights,
            vec![
                "Average order value is $40.00. Consider upselling strategies for orders below this threshold.".to_string(),
                "Shoes is your top performer with $70.00 in revenue. Consider increasing inventory.".to_string(),
                "Most common issue type is \"price anomaly\" with 2 occurrences. Focus on resolving these patterns.".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_top_product_is_named_generically() {
        let ghost = product("Ghost", 500, true);
        let insights = generate_insights(&[], &[sale(&ghost, 12)], &[], LOW_STOCK_FLOOR, &at_hour(3));
        assert!(insights[1].starts_with("Unknown product is your top performer"));
    }

    #[test]
    fn peak_hour_uses_local_time_of_supplied_timestamp() {
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        // 03:30 UTC is 10:30 in UTC+7.
        let local = at_hour(3).with_timezone(&jakarta);
        let insights = generate_insights(&[], &[], &[], LOW_STOCK_FLOOR, &local);
        assert_eq!(insights.len(), 1);
        assert!(insights[0].starts_with("Peak shopping hours detected"));
    }

    #[test]
    fn inactive_and_low_stock_counts() {
        let products = vec![
            product("A", 10, true),
            product("B", 500, false),
            product("C", 500, false),
        ];
        let insights = generate_insights(&products, &[], &[], LOW_STOCK_FLOOR, &at_hour(20));
        assert_eq!(
            insights,
            vec![
                "1 product has low stock levels. Consider restocking to avoid stockouts.".to_string(),
                "2 products are inactive. Review and reactivate profitable items to increase revenue potential.".to_string(),
            ]
        );
    }

    #[test]
    fn low_stock_count_follows_the_given_floor() {
        let products = vec![product("A", 30, true)];
        assert!(generate_insights(&products, &[], &[], 20, &at_hour(20)).is_empty());

        let insights = generate_insights(&products, &[], &[], 40, &at_hour(20));
        assert_eq!(
            insights,
            vec!["1 product has low stock levels. Consider restocking to avoid stockouts.".to_string()]
        );
    }

    #[test]
    fn list_is_capped_at_six() {
        let mut products = vec![product("Low", 5, true)];
        products.extend((0..4).map(|i| product(&format!("Off{i}"), 500, false)));
        for p in &mut products {
            p.cost_price = Decimal::from(2);
        }
        let sales = vec![sale(&products[0], 20)];
        let issues = vec![issue(IssueKind::InventoryDiscrepancy)];

        let insights = generate_insights(&products, &sales, &issues, LOW_STOCK_FLOOR, &at_hour(12));

        assert_eq!(insights.len(), MAX_INSIGHTS);
        assert!(insights[5].contains("inactive"));
        assert!(!insights.iter().any(|i| i.contains("profit margins")));
    }

    #[test]
    fn high_margin_insight_fills_a_free_slot() {
        let mut p = product("Lux", 500, true);
        p.cost_price = Decimal::from(3);
        let insights = generate_insights(&[p], &[], &[], LOW_STOCK_FLOOR, &at_hour(22));
        assert_eq!(
            insights,
            vec!["1 product has high profit margins (>50%). These are excellent candidates for promotional campaigns.".to_string()]
        );
    }

    proptest! {
        /// Property: never more than six entries, and identical input gives identical output.
        #[test]
        fn bounded_and_deterministic(
            stocks in prop::collection::vec((0u32..200, any::<bool>()), 0..12),
            totals in prop::collection::vec(1i64..500, 0..12),
            kinds in prop::collection::vec(0usize..3, 0..8),
            hour in 0u32..24,
        ) {
            let products: Vec<Product> = stocks
                .iter()
                .enumerate()
                .map(|(i, (stock, active))| product(&format!("P{i}"), *stock, *active))
                .collect();
            let sales: Vec<SaleEvent> = totals
                .iter()
                .enumerate()
                .filter_map(|(i, t)| products.get(i % products.len().max(1)).map(|p| sale(p, *t)))
                .collect();
            let issues: Vec<Issue> = kinds.iter().map(|k| issue(IssueKind::ALL[*k])).collect();
            let now = at_hour(hour);

            let first = generate_insights(&products, &sales, &issues, LOW_STOCK_FLOOR, &now);
            let second = generate_insights(&products, &sales, &issues, LOW_STOCK_FLOOR, &now);

            prop_assert!(first.len() <= MAX_INSIGHTS);
            prop_assert_eq!(first, second);
        }
    }
}
