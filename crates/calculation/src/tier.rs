//! Threshold tables shared by tiered discounts and volume pricing.
//!
//! A table maps ascending thresholds to values. Selection picks the tier with
//! the greatest threshold that is `<=` the basis; a basis exactly on a
//! threshold selects that tier, a basis below the first threshold selects none.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, ValueObject};

/// One breakpoint of a tier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier<V> {
    pub threshold: Decimal,
    pub value: V,
}

impl<V> Tier<V> {
    pub fn new(threshold: Decimal, value: V) -> Self {
        Self { threshold, value }
    }
}

/// Non-empty list of tiers, strictly ascending by threshold.
///
/// The ordering invariant is checked when the table is built, including when
/// it is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tier<V>>", into = "Vec<Tier<V>>")]
pub struct TierTable<V: Clone> {
    tiers: Vec<Tier<V>>,
}

impl<V: Clone> TierTable<V> {
    pub fn new(tiers: Vec<Tier<V>>) -> DomainResult<Self> {
        if tiers.is_empty() {
            return Err(DomainError::configuration(
                "tier table must have at least one tier",
            ));
        }
        if let Some(tier) = tiers.iter().find(|t| t.threshold < Decimal::ZERO) {
            return Err(DomainError::configuration(format!(
                "tier threshold must not be negative, got {}",
                tier.threshold
            )));
        }
        for pair in tiers.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.threshold == prev.threshold {
                return Err(DomainError::configuration(format!(
                    "duplicate tier threshold {}",
                    next.threshold
                )));
            }
            if next.threshold < prev.threshold {
                return Err(DomainError::configuration(format!(
                    "tier thresholds must be ascending ({} follows {})",
                    next.threshold, prev.threshold
                )));
            }
        }
        Ok(Self { tiers })
    }

    /// Tier that applies to `basis`, if any.
    pub fn select(&self, basis: Decimal) -> Option<&Tier<V>> {
        let idx = self.tiers.partition_point(|t| t.threshold <= basis);
        idx.checked_sub(1).map(|i| &self.tiers[i])
    }

    pub fn tiers(&self) -> &[Tier<V>] {
        &self.tiers
    }
}

impl<V: Clone> TryFrom<Vec<Tier<V>>> for TierTable<V> {
    type Error = DomainError;

    fn try_from(value: Vec<Tier<V>>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<V: Clone> From<TierTable<V>> for Vec<Tier<V>> {
    fn from(value: TierTable<V>) -> Self {
        value.tiers
    }
}

impl<V: Clone + PartialEq + core::fmt::Debug> ValueObject for TierTable<V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn table() -> TierTable<&'static str> {
        TierTable::new(vec![
            Tier::new(dec!(10), "ten"),
            Tier::new(dec!(50), "fifty"),
            Tier::new(dec!(100), "hundred"),
        ])
        .unwrap()
    }

    #[test]
    fn below_first_threshold_selects_nothing() {
        assert!(table().select(dec!(9.99)).is_none());
    }

    #[test]
    fn exact_threshold_selects_that_tier() {
        let t = table();
        assert_eq!(t.select(dec!(10)).unwrap().value, "ten");
        assert_eq!(t.select(dec!(50)).unwrap().value, "fifty");
        assert_eq!(t.select(dec!(100)).unwrap().value, "hundred");
    }

    #[test]
    fn between_thresholds_selects_lower_tier() {
        let t = table();
        assert_eq!(t.select(dec!(49.999)).unwrap().value, "ten");
        assert_eq!(t.select(dec!(1000000)).unwrap().value, "hundred");
    }

    #[test]
    fn unsorted_or_duplicate_thresholds_are_rejected() {
        let err = TierTable::new(vec![Tier::new(dec!(50), 1), Tier::new(dec!(10), 2)]).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("ascending")));

        let err = TierTable::new(vec![Tier::new(dec!(10), 1), Tier::new(dec!(10), 2)]).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("duplicate")));

        let err = TierTable::<u8>::new(vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn deserialization_enforces_ordering() {
        let ok: TierTable<u32> =
            serde_json::from_str(r#"[{"threshold":"1","value":5},{"threshold":"10","value":7}]"#)
                .unwrap();
        assert_eq!(ok.tiers().len(), 2);

        let bad = serde_json::from_str::<TierTable<u32>>(
            r#"[{"threshold":"10","value":5},{"threshold":"1","value":7}]"#,
        );
        assert!(bad.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the selected tier is the highest one not exceeding the basis.
        #[test]
        fn selection_never_picks_a_lower_tier_than_applicable(
            thresholds in prop::collection::btree_set(0i64..10_000, 1..20),
            basis in 0i64..12_000,
        ) {
            let thresholds: Vec<i64> = thresholds.into_iter().collect();
            let table = TierTable::new(
                thresholds.iter().map(|t| Tier::new(Decimal::from(*t), *t)).collect(),
            ).unwrap();

            let expected = thresholds.iter().copied().filter(|t| *t <= basis).max();
            let selected = table.select(Decimal::from(basis)).map(|t| t.value);
            prop_assert_eq!(selected, expected);
        }
    }
}
