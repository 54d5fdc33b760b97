use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwatch_core::{DomainError, DomainResult, Entity, ProductId, SaleEventId};

/// A single recorded sale of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub id: SaleEventId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub location: String,
    pub occurred_at: DateTime<Utc>,
}

impl SaleEvent {
    /// Check the event invariants (positive quantity, non-negative amounts).
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.unit_price.is_sign_negative() {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        if self.total_amount.is_sign_negative() {
            return Err(DomainError::validation("total amount cannot be negative"));
        }
        Ok(())
    }

    /// True when the event happened in `[from, until)`.
    pub fn occurred_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.occurred_at >= from && self.occurred_at < until
    }
}

impl Entity for SaleEvent {
    type Id = SaleEventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Count the events that happened in `[from, until)`.
pub fn sales_within<'a, I>(events: I, from: DateTime<Utc>, until: DateTime<Utc>) -> usize
where
    I: IntoIterator<Item = &'a SaleEvent>,
{
    events
        .into_iter()
        .filter(|e| e.occurred_between(from, until))
        .count()
}
