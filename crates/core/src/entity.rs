//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Books, users, loans and fine records are entities: two loans with identical
/// dates are still different loans.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
