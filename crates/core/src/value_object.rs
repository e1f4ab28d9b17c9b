//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Computation results (`LineComputation`, `DocumentTotals`) and strategy
/// configurations are value objects: they are derived or supplied whole, never
/// mutated in place, and two instances with the same values are the same thing.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
