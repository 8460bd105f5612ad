//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attributes. A fine
/// assessment of `{ days_overdue: 3, amount: 3 }` is interchangeable with any
/// other assessment carrying the same numbers; a book category is the same
/// category wherever it appears.
///
/// To "modify" a value object, compute a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
