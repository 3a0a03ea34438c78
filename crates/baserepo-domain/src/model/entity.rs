//! Entity - The record type a repository is bound to
//!
//! The repository layer treats entities as opaque payloads. The only things
//! it needs to know are which table they live in and how to print their
//! identity in span attributes.

use core::fmt::{Debug, Display};

/// Identity value of an entity
///
/// Anything cloneable, comparable and printable qualifies: integer keys,
/// string slugs, UUIDs.
pub trait Identity: Clone + Debug + Display + PartialEq + Send + Sync + 'static {}

impl<I> Identity for I where I: Clone + Debug + Display + PartialEq + Send + Sync + 'static {}

/// Entity Trait
///
/// `Default` is the zero value: an entity equal to `T::default()` is treated
/// as absent by operations that reject absent input.
pub trait Entity: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Identity type
    type Id: Identity;

    /// Backing table / collection name
    const TABLE: &'static str;

    /// Name of the identity field
    const PRIMARY_KEY: &'static str = "id";

    /// Current identity, `None` while the store has not assigned one
    fn id(&self) -> Option<Self::Id>;

    /// Whether this is the zero value
    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}
