//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Line items are entities: reordering or editing a line never changes which
/// line it is.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
