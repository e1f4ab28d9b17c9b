//! Calculation Service: discount -> tax -> rounding, per line and per document.
//!
//! The step order is fixed. Discount is taken from the full-precision
//! subtotal, tax from the discounted base, and rounding is applied once to a
//! final total. Reordering any of these changes totals by rounding-sized
//! amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, ValueObject};

use crate::config::CalculationSettings;
use crate::line::LineItem;
use crate::rounding::{self, RoundingMode};
use crate::{discount, tax};

/// Derived figures for one line. Never stored; recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineComputation {
    /// quantity x unit price, full precision.
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    /// Base the tax is reported on (net of embedded tax for inclusive pricing).
    pub taxable_base: Decimal,
    pub tax_amount: Decimal,
    /// Unrounded line total.
    pub line_total: Decimal,
    /// `line_total` rounded once with the document's rounding mode.
    pub rounded_total: Decimal,
}

impl ValueObject for LineComputation {}

/// Derived document totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub line_count: usize,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub taxable_total: Decimal,
    pub tax_total: Decimal,
    /// Sum of unrounded line totals.
    pub net_total: Decimal,
    /// `grand_total - net_total`.
    pub rounding_adjustment: Decimal,
    pub grand_total: Decimal,
}

impl ValueObject for DocumentTotals {}

/// Composes the rounding, discount and tax strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalculationService {
    settings: CalculationSettings,
}

impl CalculationService {
    pub fn new(settings: CalculationSettings) -> DomainResult<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn with_rounding(rounding: RoundingMode) -> DomainResult<Self> {
        Self::new(CalculationSettings::new(rounding))
    }

    pub fn settings(&self) -> &CalculationSettings {
        &self.settings
    }

    pub fn compute_line(&self, item: &LineItem) -> DomainResult<LineComputation> {
        item.validate()?;

        let overflow = || DomainError::validation(format!("line {}: amount overflow", item.id));

        let subtotal = item.quantity.checked_mul(item.unit_price).ok_or_else(overflow)?;

        let discount_amount = discount::apply(subtotal, item.quantity, &item.discount)?;
        let discounted = subtotal.checked_sub(discount_amount).ok_or_else(overflow)?;
        let tax_amount = tax::apply(discounted, &item.tax)?;

        let (taxable_base, line_total) = if item.tax.is_inclusive() {
            (discounted.checked_sub(tax_amount).ok_or_else(overflow)?, discounted)
        } else {
            (discounted, discounted.checked_add(tax_amount).ok_or_else(overflow)?)
        };

        let rounded_total = rounding::round(line_total, self.settings.rounding)?;

        Ok(LineComputation {
            subtotal,
            discount_amount,
            taxable_base,
            tax_amount,
            line_total,
            rounded_total,
        })
    }

    pub fn compute_document<'a>(
        &self,
        items: impl IntoIterator<Item = &'a LineItem>,
    ) -> DomainResult<DocumentTotals> {
        let overflow = || DomainError::validation("document total overflow");

        let mut totals = DocumentTotals::default();
        let mut rounded_sum = Decimal::ZERO;

        for item in items {
            let line = self.compute_line(item)?;
            totals.line_count += 1;
            totals.subtotal = totals.subtotal.checked_add(line.subtotal).ok_or_else(overflow)?;
            totals.discount_total = totals
                .discount_total
                .checked_add(line.discount_amount)
                .ok_or_else(overflow)?;
            totals.taxable_total = totals
                .taxable_total
                .checked_add(line.taxable_base)
                .ok_or_else(overflow)?;
            totals.tax_total = totals.tax_total.checked_add(line.tax_amount).ok_or_else(overflow)?;
            totals.net_total = totals.net_total.checked_add(line.line_total).ok_or_else(overflow)?;
            rounded_sum = rounded_sum.checked_add(line.rounded_total).ok_or_else(overflow)?;
        }

        totals.grand_total = if self.settings.per_line_rounding {
            rounded_sum
        } else {
            rounding::round(totals.net_total, self.settings.rounding)?
        };
        totals.rounding_adjustment = totals.grand_total - totals.net_total;

        tracing::debug!(
            line_count = totals.line_count,
            net_total = %totals.net_total,
            grand_total = %totals.grand_total,
            rounding = %self.settings.rounding,
            per_line = self.settings.per_line_rounding,
            "computed document totals"
        );

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::{DiscountConfig, TierBasis};
    use crate::tax::TaxConfig;
    use crate::tier::{Tier, TierTable};
    use docflow_core::LineItemId;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn indonesian() -> CalculationService {
        CalculationService::with_rounding(RoundingMode::Indonesian).unwrap()
    }

    #[test]
    fn invoice_line_example() {
        let item = LineItem::new(LineItemId::new(), dec!(3), dec!(100000))
            .with_discount(DiscountConfig::percent(dec!(10)).unwrap())
            .with_tax(TaxConfig::exclusive(dec!(11)).unwrap());

        let line = indonesian().compute_line(&item).unwrap();
        assert_eq!(line.subtotal, dec!(300000));
        assert_eq!(line.discount_amount, dec!(30000));
        assert_eq!(line.taxable_base, dec!(270000));
        assert_eq!(line.tax_amount, dec!(29700));
        assert_eq!(line.line_total, dec!(299700));
        assert_eq!(line.rounded_total, dec!(299700));
    }

    #[test]
    fn inclusive_tax_is_embedded_in_the_line_total() {
        let item = LineItem::new(LineItemId::new(), dec!(1), dec!(111000))
            .with_tax(TaxConfig::inclusive(dec!(11)).unwrap());

        let line = CalculationService::default().compute_line(&item).unwrap();
        assert_eq!(line.tax_amount, dec!(11000));
        assert_eq!(line.taxable_base, dec!(100000));
        assert_eq!(line.line_total, dec!(111000));
    }

    #[test]
    fn invalid_line_is_a_validation_error() {
        let item = LineItem::new(LineItemId::new(), dec!(-2), dec!(10));
        assert!(matches!(
            CalculationService::default().compute_line(&item),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn huge_line_amounts_overflow_into_validation_errors() {
        let huge = dec!(70000000000000000000000000000);
        let discounted = LineItem::new(LineItemId::new(), dec!(1), huge)
            .with_discount(DiscountConfig::percent(dec!(50)).unwrap());
        let taxed = LineItem::new(LineItemId::new(), dec!(1), huge)
            .with_tax(TaxConfig::exclusive(dec!(11)).unwrap());

        for item in [&discounted, &taxed] {
            assert!(matches!(
                indonesian().compute_line(item),
                Err(DomainError::Validation(_))
            ));
        }
        assert!(matches!(
            indonesian().compute_document([&discounted, &taxed]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn empty_document_has_zero_totals() {
        let items: Vec<LineItem> = Vec::new();
        let totals = indonesian().compute_document(&items).unwrap();
        assert_eq!(totals, DocumentTotals::default());
    }

    #[test]
    fn document_rounds_the_grand_total_once() {
        // Each line is 149.5 after tax; rounding per line gives 100 + 100.
        let items: Vec<LineItem> = (0..2)
            .map(|_| {
                LineItem::new(LineItemId::new(), dec!(1), dec!(130))
                    .with_tax(TaxConfig::exclusive(dec!(15)).unwrap())
            })
            .collect();

        let totals = indonesian().compute_document(&items).unwrap();
        assert_eq!(totals.net_total, dec!(299));
        assert_eq!(totals.grand_total, dec!(300));
        assert_eq!(totals.rounding_adjustment, dec!(1));

        let per_line = CalculationService::new(
            CalculationSettings::new(RoundingMode::Indonesian).per_line(),
        )
        .unwrap();
        let totals = per_line.compute_document(&items).unwrap();
        assert_eq!(totals.grand_total, dec!(200));
    }

    #[test]
    fn tiered_discount_feeds_the_tax_base() {
        let tiers = TierTable::new(vec![
            Tier::new(dec!(10), dec!(5)),
            Tier::new(dec!(20), dec!(10)),
        ])
        .unwrap();
        let item = LineItem::new(LineItemId::new(), dec!(20), dec!(1000))
            .with_discount(DiscountConfig::tiered(TierBasis::Quantity, tiers).unwrap())
            .with_tax(TaxConfig::exclusive(dec!(10)).unwrap());

        let line = CalculationService::default().compute_line(&item).unwrap();
        assert_eq!(line.discount_amount, dec!(2000));
        assert_eq!(line.tax_amount, dec!(1800));
        assert_eq!(line.line_total, dec!(19800));
    }

    fn any_discount() -> impl Strategy<Value = DiscountConfig> {
        prop_oneof![
            Just(DiscountConfig::None),
            (0i64..10_000_000).prop_map(|v| DiscountConfig::Amount { value: Decimal::new(v, 2) }),
            (0i64..=10_000).prop_map(|r| DiscountConfig::Percent { rate: Decimal::new(r, 2) }),
        ]
    }

    fn any_tax() -> impl Strategy<Value = TaxConfig> {
        prop_oneof![
            Just(TaxConfig::None),
            (0i64..=10_000).prop_map(|r| TaxConfig::Exclusive { rate: Decimal::new(r, 2) }),
            (0i64..=10_000).prop_map(|r| TaxConfig::Inclusive { rate: Decimal::new(r, 2) }),
        ]
    }

    fn any_item() -> impl Strategy<Value = LineItem> {
        (1i64..10_000, 0i64..100_000_000, any_discount(), any_tax()).prop_map(
            |(qty, price, discount, tax)| {
                LineItem::new(LineItemId::new(), Decimal::new(qty, 1), Decimal::new(price, 2))
                    .with_discount(discount)
                    .with_tax(tax)
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: discount stays within [0, subtotal] and tax is never negative.
        #[test]
        fn line_amounts_stay_in_range(item in any_item()) {
            let line = CalculationService::default().compute_line(&item).unwrap();
            prop_assert!(line.discount_amount >= Decimal::ZERO);
            prop_assert!(line.discount_amount <= line.subtotal);
            prop_assert!(line.tax_amount >= Decimal::ZERO);
        }

        /// Property: per-line mode grand total is the sum of rounded-once line totals.
        #[test]
        fn per_line_grand_total_is_sum_of_rounded_lines(
            items in prop::collection::vec(any_item(), 0..12),
        ) {
            let service = CalculationService::new(
                CalculationSettings::new(RoundingMode::Indonesian).per_line(),
            ).unwrap();
            let totals = service.compute_document(&items).unwrap();
            let expected: Decimal = items
                .iter()
                .map(|i| service.compute_line(i).unwrap().rounded_total)
                .sum();
            prop_assert_eq!(totals.grand_total, expected);
        }

        /// Property: document mode rounds the sum of unrounded line totals exactly once.
        #[test]
        fn document_grand_total_rounds_once(
            items in prop::collection::vec(any_item(), 0..12),
        ) {
            let service = indonesian();
            let totals = service.compute_document(&items).unwrap();
            let net: Decimal = items
                .iter()
                .map(|i| service.compute_line(i).unwrap().line_total)
                .sum();
            prop_assert_eq!(totals.net_total, net);
            prop_assert_eq!(
                totals.grand_total,
                rounding::round(net, RoundingMode::Indonesian).unwrap()
            );
        }
    }
}
