//! Line items: the rows of a document.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, Entity, LineItemId, ProductId};

use crate::discount::DiscountConfig;
use crate::tax::TaxConfig;

/// One row of a document: quantity x unit price with its own discount and tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: DiscountConfig,
    #[serde(default)]
    pub tax: TaxConfig,
}

impl LineItem {
    pub fn new(id: LineItemId, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            id,
            description: None,
            product_id: None,
            quantity,
            unit_price,
            discount: DiscountConfig::None,
            tax: TaxConfig::None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_discount(mut self, discount: DiscountConfig) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_tax(mut self, tax: TaxConfig) -> Self {
        self.tax = tax;
        self
    }

    /// Quantity must be positive, price non-negative, configs in range.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "line {}: quantity must be positive, got {}",
                self.id, self.quantity
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "line {}: unit price must not be negative, got {}",
                self.id, self.unit_price
            )));
        }
        self.discount.validate()?;
        self.tax.validate()?;
        Ok(())
    }
}

impl Entity for LineItem {
    type Id = LineItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Partial update of a line item. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItemPatch {
    pub description: Option<String>,
    pub product_id: Option<ProductId>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount: Option<DiscountConfig>,
    pub tax: Option<TaxConfig>,
}

impl LineItemPatch {
    pub fn quantity(quantity: Decimal) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    pub fn unit_price(unit_price: Decimal) -> Self {
        Self {
            unit_price: Some(unit_price),
            ..Self::default()
        }
    }

    /// Patched copy of `item`. The identifier is never changed.
    pub fn applied_to(&self, item: &LineItem) -> LineItem {
        let mut next = item.clone();
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(product_id) = self.product_id {
            next.product_id = Some(product_id);
        }
        if let Some(quantity) = self.quantity {
            next.quantity = quantity;
        }
        if let Some(unit_price) = self.unit_price {
            next.unit_price = unit_price;
        }
        if let Some(discount) = &self.discount {
            next.discount = discount.clone();
        }
        if let Some(tax) = self.tax {
            next.tax = tax;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_or_negative_quantity_is_invalid() {
        for qty in [dec!(0), dec!(-1)] {
            let item = LineItem::new(LineItemId::new(), qty, dec!(10));
            assert!(matches!(item.validate(), Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn negative_price_is_invalid_but_zero_is_fine() {
        let item = LineItem::new(LineItemId::new(), dec!(1), dec!(-0.01));
        assert!(matches!(item.validate(), Err(DomainError::Validation(_))));
        let item = LineItem::new(LineItemId::new(), dec!(1), Decimal::ZERO);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn patch_keeps_identity_and_untouched_fields() {
        let item = LineItem::new(LineItemId::new(), dec!(2), dec!(50))
            .with_description("Widget")
            .with_tax(TaxConfig::Exclusive { rate: dec!(11) });
        let patched = LineItemPatch::quantity(dec!(5)).applied_to(&item);
        assert_eq!(patched.id, item.id);
        assert_eq!(patched.quantity, dec!(5));
        assert_eq!(patched.unit_price, dec!(50));
        assert_eq!(patched.description.as_deref(), Some("Widget"));
        assert_eq!(patched.tax, item.tax);
    }

    #[test]
    fn minimal_json_defaults_configs_to_none() {
        let id = LineItemId::new();
        let json = format!(r#"{{"id":"{id}","quantity":"2","unit_price":"7.5"}}"#);
        let item: LineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item.discount, DiscountConfig::None);
        assert_eq!(item.tax, TaxConfig::None);
        assert_eq!(item.unit_price, dec!(7.5));
    }
}
