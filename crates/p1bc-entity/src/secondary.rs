//! Densely numbered entity references as mapping keys.

use crate::iter::{Iter, IterMut};
use crate::keys::Keys;
use crate::EntityRef;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

/// A mapping `K -> V` for densely indexed entity references.
///
/// Unlike `PrimaryMap`, a `SecondaryMap` can't be used to allocate entity
/// references; it is used to associate secondary information with entities
/// already allocated elsewhere (e.g. `fixed_size: SecondaryMap<OpRef, i32>`
/// riding alongside the `PrimaryMap<OpRef, Op>` that owns the records).
///
/// The map does not track whether an entry has been inserted; it behaves as
/// if every key has the default value from the start.
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    elems: Vec<V>,
    default: V,
    #[cfg_attr(feature = "enable-serde", serde(skip))]
    unused: PhantomData<K>,
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    /// Create a new empty map.
    pub fn new() -> Self
    where
        V: Default,
    {
        Self {
            elems: Vec::new(),
            default: Default::default(),
            unused: PhantomData,
        }
    }

    /// Create a new empty map with a specified default value.
    ///
    /// This constructor does not require `V: Default`.
    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    /// Returns the number of elements in the underlying vector.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Get the element at `k` if it exists.
    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    /// Is this map completely empty?
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Remove all entries from this map.
    pub fn clear(&mut self) {
        self.elems.clear()
    }

    /// Iterate over all the keys and values in this map.
    pub fn iter(&self) -> Iter<K, V> {
        Iter::new(self.elems.iter())
    }

    /// Iterate over all the keys and values in this map, mutable edition.
    pub fn iter_mut(&mut self) -> IterMut<K, V> {
        IterMut::new(self.elems.iter_mut())
    }

    /// Iterate over all the keys in this map.
    pub fn keys(&self) -> Keys<K> {
        Keys::with_len(self.elems.len())
    }

    /// Iterate over all the values in this map.
    pub fn values(&self) -> slice::Iter<V> {
        self.elems.iter()
    }

    /// Resize the map to have `n` entries, filling new ones with the default.
    pub fn resize(&mut self, n: usize) {
        self.elems.resize(n, self.default.clone());
    }
}

impl<K, V> Index<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.get(k).unwrap_or(&self.default)
    }
}

impl<K, V> IndexMut<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    fn index_mut(&mut self, k: K) -> &mut V {
        let i = k.index();
        if i >= self.elems.len() {
            self.resize(i + 1);
        }
        &mut self.elems[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq)]
    struct E(u32);
    crate::entity_impl!(E, "e");

    #[test]
    fn basic() {
        let r0 = E(0);
        let r1 = E(1);
        let r2 = E(2);
        let mut m: SecondaryMap<E, i32> = SecondaryMap::new();

        m[r2] = 3;
        m[r1] = 5;

        assert_eq!(m[r1], 5);
        assert_eq!(m[r2], 3);
        assert_eq!(m[r0], 0);

        let v: Vec<E> = m.keys().collect();
        assert_eq!(v, [r0, r1, r2]);
    }

    #[test]
    fn with_default() {
        let mut m: SecondaryMap<E, i32> = SecondaryMap::with_default(-1);
        assert_eq!(m[E(5)], -1);
        m[E(5)] = 9;
        assert_eq!(m[E(5)], 9);
        assert_eq!(m[E(0)], -1);
    }
}
