//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two tracking payloads listing the same
/// serials are the same payload. They are immutable once built; to "change"
/// one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct LotCode(String);
///
/// impl ValueObject for LotCode {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
