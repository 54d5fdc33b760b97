//! Severity and confidence scoring.
//!
//! Pure functions: no IO, no clock, no randomness.

use rust_decimal::Decimal;

use crate::issue::{Confidence, Severity};

/// Map an absolute discrepancy magnitude to a severity tier.
///
/// `> 1000 -> Critical`, `> 500 -> High`, `> 100 -> Medium`, otherwise `Low`.
/// Monotonic in `amount`.
pub fn severity_from_discrepancy(amount: Decimal) -> Severity {
    let amount = amount.abs();
    if amount > Decimal::from(1000) {
        Severity::Critical
    } else if amount > Decimal::from(500) {
        Severity::High
    } else if amount > Decimal::from(100) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Confidence from the ratio `|discrepancy| / |expected|`.
///
/// `> 50% -> 95`, `> 30% -> 90`, `> 10% -> 85`, otherwise (and for `expected == 0`) `80`.
pub fn confidence_from_ratio(discrepancy: Decimal, expected: Decimal) -> Confidence {
    let score = match discrepancy.abs().checked_div(expected.abs()) {
        None => 80,
        Some(ratio) if ratio > Decimal::new(5, 1) => 95,
        Some(ratio) if ratio > Decimal::new(3, 1) => 90,
        Some(ratio) if ratio > Decimal::new(1, 1) => 85,
        Some(_) => 80,
    };
    // Every tier above is within range.
    Confidence::new(score).unwrap_or(Confidence::MAX)
}
