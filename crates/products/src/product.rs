use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwatch_core::{DomainError, DomainResult, Entity, ProductId};

/// Stock level under which an active product counts as "low stock".
pub const LOW_STOCK_FLOOR: u32 = 50;

/// Read-only catalog entry.
///
/// Prices are decimal currency amounts; stock is a non-negative unit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub current_stock: u32,
    pub is_active: bool,
}

impl Product {
    /// Check the snapshot invariants (non-empty SKU/name, non-negative prices).
    pub fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.cost_price.is_sign_negative() {
            return Err(DomainError::validation("cost price cannot be negative"));
        }
        if self.selling_price.is_sign_negative() {
            return Err(DomainError::validation("selling price cannot be negative"));
        }
        Ok(())
    }

    pub fn is_low_stock(&self) -> bool {
        self.is_low_stock_below(LOW_STOCK_FLOOR)
    }

    /// Active and holding fewer than `floor` units.
    pub fn is_low_stock_below(&self, floor: u32) -> bool {
        self.is_active && self.current_stock < floor
    }

    /// Gross margin as a fraction of the selling price.
    ///
    /// `None` when either price is zero (margin undefined or meaningless).
    pub fn margin_ratio(&self) -> Option<Decimal> {
        if self.selling_price.is_zero() || self.cost_price.is_zero() {
            return None;
        }
        (self.selling_price - self.cost_price).checked_div(self.selling_price)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_product() -> Product {
        Product {
            id: ProductId::new(),
            sku: "SKU-001".to_string(),
            name: "Test Product".to_string(),
            cost_price: Decimal::new(1000, 2),
            selling_price: Decimal::new(2500, 2),
            current_stock: 120,
            is_active: true,
        }
    }

    #[test]
    fn valid_product_passes_validation() {
        assert!(test_product().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_sku() {
        let product = Product {
            sku: "   ".to_string(),
            ..test_product()
        };
        match product.validate().unwrap_err() {
            DomainError::Validation(_) => {}
            other => panic!("Expected Validation error for empty SKU, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_negative_selling_price() {
        let product = Product {
            selling_price: Decimal::new(-1, 0),
            ..test_product()
        };
        assert!(matches!(product.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn low_stock_requires_active_product() {
        let mut product = Product {
            current_stock: 10,
            ..test_product()
        };
        assert!(product.is_low_stock());

        product.is_active = false;
        assert!(!product.is_low_stock());
    }

    #[test]
    fn low_stock_floor_is_exclusive() {
        let product = Product {
            current_stock: 30,
            ..test_product()
        };
        assert!(product.is_low_stock_below(31));
        assert!(!product.is_low_stock_below(30));
        assert!(!product.is_low_stock_below(20));
    }

    #[test]
    fn margin_ratio_is_none_without_cost() {
        let product = Product {
            cost_price: Decimal::ZERO,
            ..test_product()
        };
        assert_eq!(product.margin_ratio(), None);
        assert_eq!(test_product().margin_ratio(), Some(Decimal::new(6, 1)));
    }

    proptest! {
        /// Property: margin never exceeds 1 for positive prices.
        #[test]
        fn margin_ratio_is_at_most_one(cost in 1i64..1_000_000, sell in 1i64..1_000_000) {
            let product = Product {
                cost_price: Decimal::new(cost, 2),
                selling_price: Decimal::new(sell, 2),
                ..test_product()
            };
            let margin = product.margin_ratio().unwrap();
            prop_assert!(margin < Decimal::ONE);
        }
    }
}
