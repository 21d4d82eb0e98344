//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In
/// this workspace plans, subscription windows and subscription snapshots are
/// value objects; companies and jobs are entities.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
