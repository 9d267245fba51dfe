//! Densely numbered entity references used throughout the bytecode IR.
//!
//! The IR (see `p1bc::ir::op`) is a doubly-linked list of instruction
//! records living in one arena per function. Rather than use Rust
//! references or raw pointers for `prev`/`next`/`jumpTo`, every cross-record
//! reference is a small `Copy` handle indexing into a `PrimaryMap`. This
//! keeps the structure free of ownership cycles and trivially relocatable
//! (handles survive `Vec` reallocation; pointers would not).
//!
//! This module is deliberately tiny: just enough entity-reference plumbing
//! for one arena type (`OpRef`) and one or two secondary maps over it. It is
//! not a general-purpose ECS.

mod iter;
mod keys;
mod primary;
mod secondary;

pub use iter::{Iter, IterMut};
pub use keys::Keys;
pub use primary::PrimaryMap;
pub use secondary::SecondaryMap;

/// A type that can be used as a key in a dense entity map.
///
/// Implementors wrap a `u32` index and are `Copy`, so they are cheap to pass
/// around and store in the thousands without pointer-chasing.
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a linear index.
    fn new(index: usize) -> Self;

    /// Get the index of this reference.
    fn index(self) -> usize;
}

/// Define an `EntityRef` newtype wrapping a `u32`, with `Display`/`Debug`
/// impls that print as `<prefix><index>` (e.g. `op12`, `lbl3`), matching the
/// textual-dump convention used by the listing writer.
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident, $prefix:expr) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $entity {
            /// Create an entity reference from a raw index, for use by
            /// code rebuilding a map from a serialized form.
            #[allow(dead_code)]
            pub fn from_u32(x: u32) -> Self {
                $entity(x)
            }

            #[allow(dead_code)]
            fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl ::std::fmt::Display for $entity {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl ::std::fmt::Debug for $entity {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                (self as &dyn ::std::fmt::Display).fmt(f)
            }
        }

        #[cfg(feature = "enable-serde")]
        impl ::serde::Serialize for $entity {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                ::serde::Serialize::serialize(&self.0, serializer)
            }
        }

        #[cfg(feature = "enable-serde")]
        impl<'de> ::serde::Deserialize<'de> for $entity {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok($entity(<u32 as ::serde::Deserialize>::deserialize(deserializer)?))
            }
        }
    };
    ($entity:ident) => {
        entity_impl!($entity, "");
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq)]
    struct E(u32);
    entity_impl!(E, "e");

    #[test]
    fn display() {
        assert_eq!(E::new(3).to_string(), "e3");
    }
}
