//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Items, order headers and order details are entities: their business fields
/// change, their identity never does.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
