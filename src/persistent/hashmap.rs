//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentHashMap`], an immutable hash map
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentHashMap` is a thin façade over a hash array mapped trie: it holds
//! the root node, the [`KeyHasher`] the map was built with, and a link to the
//! [`BlankRegistry`] its canonical empty map lives in.
//!
//! - O(log32 N) get (effectively O(1) for practical sizes)
//! - O(log32 N) assoc
//! - O(log32 N) dissoc
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original. An operation
//! that changes nothing returns the original instance itself, which
//! [`PersistentHashMap::ptr_eq`] can observe.
//!
//! # Examples
//!
//! ```rust
//! use hashtrie::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::blank()
//!     .assoc("one".to_string(), 1)
//!     .assoc("two".to_string(), 2)
//!     .assoc("three".to_string(), 3);
//!
//! assert_eq!(map.get(&"one".to_string()), Some(&1));
//! assert_eq!(map.get_or(&"four".to_string(), &0), &0);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.assoc("one".to_string(), 100);
//! assert_eq!(map.get(&"one".to_string()), Some(&1));       // Original unchanged
//! assert_eq!(updated.get(&"one".to_string()), Some(&100)); // New version
//!
//! // Removing the last key returns the canonical blank map
//! let emptied = PersistentHashMap::blank().assoc(1, 1).dissoc(&1);
//! assert!(emptied.ptr_eq(&PersistentHashMap::blank()));
//! ```

use std::fmt;
use std::hash::Hash;
use std::iter::{FromIterator, FusedIterator};

use arrayvec::ArrayVec;

use super::error::MapError;
use super::hasher::KeyHasher;
use super::node::{Entry, MAX_DEPTH, Node};
use super::registry::{BlankRegistry, RegistryLink};
use super::{ReferenceCounter, Shareable, set_ops, trie};

// =============================================================================
// PersistentHashMap Definition
// =============================================================================

struct MapState<K, V> {
    /// Root of the trie; `None` only for an empty map.
    root: Option<Node<K, V>>,
    hasher: KeyHasher<K>,
    registry: RegistryLink,
}

/// A persistent (immutable) hash map based on HAMT.
///
/// Cloning a map is O(1) and yields the same instance, as observed by
/// [`ptr_eq`](Self::ptr_eq).
///
/// # Time Complexity
///
/// | Operation      | Complexity                      |
/// |----------------|---------------------------------|
/// | `blank`        | O(1)                            |
/// | `get`          | O(log32 N)                      |
/// | `assoc`        | O(log32 N)                      |
/// | `dissoc`       | O(log32 N)                      |
/// | `len`          | O(1)                            |
/// | `difference`   | O(size of the unshared parts)   |
/// | `intersect`    | O(size of the unshared parts)   |
/// | `equiv`        | O(size of the unshared parts)   |
///
/// # Examples
///
/// ```rust
/// use hashtrie::persistent::{KeyHasher, PersistentHashMap};
///
/// // Every key hashes to 7: all entries share one collision bucket.
/// let constant = KeyHasher::new(|_: &&str| 7);
/// let map = PersistentHashMap::blank_with(&constant)
///     .assoc("a", 1)
///     .assoc("b", 2);
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.dissoc(&"a").get(&"b"), Some(&2));
/// ```
pub struct PersistentHashMap<K, V> {
    state: ReferenceCounter<MapState<K, V>>,
}

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentHashMap<i32, String>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentHashMap<i32, String>: Send, Sync);

impl<K, V> PersistentHashMap<K, V> {
    /// Builds an empty map that is not registered anywhere.
    pub(crate) fn detached_blank(hasher: KeyHasher<K>, registry: RegistryLink) -> Self {
        Self {
            state: ReferenceCounter::new(MapState {
                root: None,
                hasher,
                registry,
            }),
        }
    }

    /// New map instance sharing this map's hasher and registry.
    fn with_root(&self, root: Node<K, V>) -> Self {
        Self {
            state: ReferenceCounter::new(MapState {
                root: Some(root),
                hasher: self.state.hasher.clone(),
                registry: self.state.registry.clone(),
            }),
        }
    }

    #[inline]
    pub(crate) fn root(&self) -> Option<&Node<K, V>> {
        self.state.root.as_ref()
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root().map_or(0, Node::entry_count)
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.root.is_none()
    }

    /// Returns the key hasher this map was built with.
    #[inline]
    #[must_use]
    pub fn hasher(&self) -> &KeyHasher<K> {
        &self.state.hasher
    }

    /// Returns `true` if both handles are the same map instance.
    ///
    /// This is reference identity, not content equality: use
    /// [`equiv`](Self::equiv) or `==` for the latter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::blank().assoc(1, "one");
    /// assert!(map.assoc(1, "one").ptr_eq(&map));
    /// assert!(!map.assoc(1, "uno").ptr_eq(&map));
    /// assert!(map.dissoc(&2).ptr_eq(&map));
    /// ```
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.state, &other.state)
    }

    /// Returns an iterator over key-value pairs, in no particular order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::blank()
    ///     .assoc("a".to_string(), 1)
    ///     .assoc("b".to_string(), 2);
    ///
    /// let mut entries: Vec<_> = map.iter().collect();
    /// entries.sort();
    /// assert_eq!(entries, vec![(&"a".to_string(), &1), (&"b".to_string(), &2)]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator::new(self.root(), self.len())
    }

    /// Returns an iterator over keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values, in no particular order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::blank()
    ///     .assoc("a".to_string(), 1)
    ///     .assoc("b".to_string(), 2);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 3);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K, V> PersistentHashMap<K, V>
where
    K: Hash + Eq + Shareable + 'static,
    V: PartialEq + Shareable + 'static,
{
    /// Returns the canonical empty map for the default key hasher.
    ///
    /// Repeated calls return the same instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<String, i32> = PersistentHashMap::blank();
    /// assert!(map.is_empty());
    /// assert!(map.ptr_eq(&PersistentHashMap::blank()));
    /// ```
    #[must_use]
    pub fn blank() -> Self {
        BlankRegistry::global().blank()
    }

    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get(&"key".to_string()), Some(&42));
    /// ```
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::blank().assoc(key, value)
    }
}

impl<K, V> PersistentHashMap<K, V>
where
    K: Eq,
{
    fn find(&self, key: &K) -> Option<&ReferenceCounter<Entry<K, V>>> {
        let root = self.root()?;
        trie::get_entry(root, 0, self.state.hasher.hash(key), key)
    }

    /// Returns a reference to the value bound to `key`.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::blank().assoc("hello".to_string(), 42);
    ///
    /// assert_eq!(map.get(&"hello".to_string()), Some(&42));
    /// assert_eq!(map.get(&"world".to_string()), None);
    /// ```
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|entry| &entry.value)
    }

    /// Returns the value bound to `key`, or `default` if there is none.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::blank().assoc(1, 1);
    /// assert_eq!(map.get_or(&1, &42), &1);
    /// assert_eq!(map.get_or(&2, &42), &42);
    /// ```
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &K, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    /// Returns the stored key and value bound to `key`.
    #[must_use]
    pub fn entry_at(&self, key: &K) -> Option<(&K, &V)> {
        self.find(key).map(|entry| (&entry.key, &entry.value))
    }

    /// Returns `true` if the map contains a value for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }
}

impl<K, V> PersistentHashMap<K, V>
where
    K: Eq,
    V: PartialEq,
{
    /// Returns `true` if both maps hold the same keys bound to equal values.
    ///
    /// Insertion order never matters. Maps built with different key hashers
    /// are compared by content as well: when the hashers match, the tries are
    /// compared structurally (skipping shared subtrees); otherwise every entry
    /// is looked up in the other map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::{KeyHasher, PersistentHashMap};
    ///
    /// let forward = PersistentHashMap::blank().assoc(1, "a").assoc(2, "b");
    /// let backward = PersistentHashMap::blank().assoc(2, "b").assoc(1, "a");
    /// assert!(forward.equiv(&backward));
    ///
    /// let by_identity = KeyHasher::new(|key: &i32| *key as u32);
    /// let rehashed = PersistentHashMap::blank_with(&by_identity).assoc(1, "a").assoc(2, "b");
    /// assert!(forward.equiv(&rehashed));
    /// ```
    #[must_use]
    pub fn equiv(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.state.hasher.same_as(&other.state.hasher) {
            set_ops::equiv(self.root(), other.root(), 0)
        } else {
            self.len() == other.len()
                && self
                    .iter()
                    .all(|(key, value)| other.get(key).is_some_and(|other_value| other_value == value))
        }
    }
}

impl<K, V> PersistentHashMap<K, V>
where
    K: Eq + Shareable + 'static,
    V: PartialEq + Shareable + 'static,
{
    /// Returns the canonical empty map for `hasher`.
    ///
    /// Every call with the same hasher identity returns the same instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::{KeyHasher, PersistentHashMap};
    ///
    /// let hasher = KeyHasher::new(|key: &u32| *key);
    /// let first: PersistentHashMap<u32, u32> = PersistentHashMap::blank_with(&hasher);
    /// let second: PersistentHashMap<u32, u32> = PersistentHashMap::blank_with(&hasher);
    /// assert!(first.ptr_eq(&second));
    /// ```
    #[must_use]
    pub fn blank_with(hasher: &KeyHasher<K>) -> Self {
        BlankRegistry::global().blank_with(hasher)
    }

    /// Returns the canonical empty map for this map's hasher.
    ///
    /// The blank comes from the registry this map was created from. If that
    /// registry has been dropped, a fresh unregistered blank is returned.
    #[must_use]
    pub fn empty(&self) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        match self.state.registry.upgrade() {
            Some(registry) => registry.blank_with(&self.state.hasher),
            None => Self::detached_blank(self.state.hasher.clone(), RegistryLink::default()),
        }
    }

    /// Binds `key` to `value`.
    ///
    /// If the key is already bound to an equal value, returns this very map.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::blank().assoc("key".to_string(), 1);
    /// let map2 = map1.assoc("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get(&"key".to_string()), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get(&"key".to_string()), Some(&2)); // New version
    /// assert!(map2.assoc("key".to_string(), 2).ptr_eq(&map2));
    /// ```
    #[must_use]
    pub fn assoc(&self, key: K, value: V) -> Self {
        let key_hash = self.state.hasher.hash(&key);
        let entry = ReferenceCounter::new(Entry::new(key_hash, key, value));
        match self.root() {
            None => self.with_root(Node::Entry(entry)),
            Some(root) => {
                let new_root = trie::assoc(root, 0, &entry);
                if new_root.ptr_eq(root) {
                    self.clone()
                } else {
                    self.with_root(new_root)
                }
            }
        }
    }

    /// Binds `key` to `value` only if the key is not bound yet.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::KeyAlreadyPresent`] if the map already contains `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::{MapError, PersistentHashMap};
    ///
    /// let map = PersistentHashMap::blank().try_assoc_new(1, "one").unwrap();
    /// assert_eq!(map.try_assoc_new(1, "uno"), Err(MapError::KeyAlreadyPresent));
    /// ```
    pub fn try_assoc_new(&self, key: K, value: V) -> Result<Self, MapError> {
        if self.contains_key(&key) {
            Err(MapError::KeyAlreadyPresent)
        } else {
            Ok(self.assoc(key, value))
        }
    }

    /// Removes `key` from the map.
    ///
    /// Returns this very map if the key is absent, and the canonical blank map
    /// if the last key was removed.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::blank()
    ///     .assoc("a".to_string(), 1)
    ///     .assoc("b".to_string(), 2);
    /// let removed = map.dissoc(&"a".to_string());
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&"a".to_string()), None);
    /// ```
    #[must_use]
    pub fn dissoc(&self, key: &K) -> Self {
        let Some(root) = self.root() else {
            return self.clone();
        };
        match trie::dissoc(root, 0, self.state.hasher.hash(key), key) {
            Some(new_root) if new_root.ptr_eq(root) => self.clone(),
            Some(new_root) => self.with_root(new_root),
            None => self.empty(),
        }
    }

    /// Keeps the entries of this map that are absent from `other` or bound to
    /// a different value there.
    ///
    /// Returns this very map if nothing is removed.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::IncompatibleHashers`] if the maps were built with
    /// different key hashers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let left = PersistentHashMap::blank().assoc(1, "a").assoc(2, "b");
    /// let right = PersistentHashMap::blank().assoc(2, "b").assoc(3, "c");
    ///
    /// let only_left = left.difference(&right).unwrap();
    /// assert_eq!(only_left.len(), 1);
    /// assert_eq!(only_left.get(&1), Some(&"a"));
    /// ```
    pub fn difference(&self, other: &Self) -> Result<Self, MapError> {
        self.check_compatible(other, "difference")?;
        let result = set_ops::difference(self.root(), other.root(), 0);
        Ok(self.resolve(result, other))
    }

    /// Keeps the entries bound to equal values in both maps.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::IncompatibleHashers`] if the maps were built with
    /// different key hashers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::persistent::PersistentHashMap;
    ///
    /// let left = PersistentHashMap::blank().assoc(1, "a").assoc(2, "b");
    /// let right = PersistentHashMap::blank().assoc(2, "b").assoc(1, "z");
    ///
    /// let common = left.intersect(&right).unwrap();
    /// assert_eq!(common.len(), 1);
    /// assert_eq!(common.get(&2), Some(&"b"));
    /// ```
    pub fn intersect(&self, other: &Self) -> Result<Self, MapError> {
        self.check_compatible(other, "intersect")?;
        let result = set_ops::intersect(self.root(), other.root(), 0);
        Ok(self.resolve(result, other))
    }

    fn check_compatible(&self, other: &Self, operation: &'static str) -> Result<(), MapError> {
        if self.state.hasher.same_as(&other.state.hasher) {
            Ok(())
        } else {
            tracing::debug!(
                operation,
                left = ?self.state.hasher,
                right = ?other.state.hasher,
                "rejected maps built with different key hashers"
            );
            Err(MapError::IncompatibleHashers)
        }
    }

    /// Wraps a bulk-operation root, reusing an operand when the root is one of theirs.
    fn resolve(&self, result: Option<Node<K, V>>, other: &Self) -> Self {
        match result {
            None => self.empty(),
            Some(root) if self.root().is_some_and(|own| own.ptr_eq(&root)) => self.clone(),
            Some(root) if other.root().is_some_and(|theirs| theirs.ptr_eq(&root)) => other.clone(),
            Some(root) => self.with_root(root),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentHashMap`].
///
/// Walks the trie lazily; its stack never grows beyond the trie depth.
pub struct PersistentHashMapIterator<'a, K, V> {
    branches: ArrayVec<std::slice::Iter<'a, Option<Node<K, V>>>, MAX_DEPTH>,
    bucket: std::slice::Iter<'a, ReferenceCounter<Entry<K, V>>>,
    pending: Option<&'a ReferenceCounter<Entry<K, V>>>,
    remaining: usize,
}

impl<'a, K, V> PersistentHashMapIterator<'a, K, V> {
    fn new(root: Option<&'a Node<K, V>>, length: usize) -> Self {
        let mut iterator = Self {
            branches: ArrayVec::new(),
            bucket: Default::default(),
            pending: None,
            remaining: length,
        };
        if let Some(root) = root {
            iterator.descend(root);
        }
        iterator
    }

    fn descend(&mut self, node: &'a Node<K, V>) {
        match node {
            Node::Entry(entry) => self.pending = Some(entry),
            Node::Collision(collision) => self.bucket = collision.children.iter(),
            Node::Array(array) => self.branches.push(array.children.iter()),
        }
    }
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.take().or_else(|| self.bucket.next()) {
                self.remaining = self.remaining.saturating_sub(1);
                return Some((&entry.key, &entry.value));
            }
            let branch = self.branches.last_mut()?;
            match branch.next() {
                Some(Some(child)) => self.descend(child),
                Some(None) => {}
                None => {
                    self.branches.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for PersistentHashMapIterator<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for PersistentHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: ReferenceCounter::clone(&self.state),
        }
    }
}

impl<K, V> Default for PersistentHashMap<K, V>
where
    K: Hash + Eq + Shareable + 'static,
    V: PartialEq + Shareable + 'static,
{
    #[inline]
    fn default() -> Self {
        Self::blank()
    }
}

impl<K, V> FromIterator<(K, V)> for PersistentHashMap<K, V>
where
    K: Hash + Eq + Shareable + 'static,
    V: PartialEq + Shareable + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::blank(), |map, (key, value)| map.assoc(key, value))
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Eq, V: PartialEq> PartialEq for PersistentHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.equiv(other)
    }
}

impl<K: Eq, V: Eq> Eq for PersistentHashMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
