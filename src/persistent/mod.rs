//! Persistent (immutable) hash map built on a hash array mapped trie.
//!
//! This module provides [`PersistentHashMap`], a map whose updates return new
//! versions while every untouched subtree stays shared with the old ones:
//!
//! - [`PersistentHashMap`]: the map façade
//! - [`KeyHasher`]: the caller-supplied key hash function, compared by identity
//! - [`BlankRegistry`]: the cache of canonical empty maps per hasher
//! - [`MapError`]: recoverable errors raised by the façade
//!
//! # Structural Sharing
//!
//! Nodes are never mutated after construction. An update allocates new nodes
//! only along the path from the changed leaf to the root, and an update that
//! changes nothing returns the very same map instance.
//!
//! # Examples
//!
//! ```rust
//! use hashtrie::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::blank()
//!     .assoc("one".to_string(), 1)
//!     .assoc("two".to_string(), 2);
//! assert_eq!(map.get(&"one".to_string()), Some(&1));
//!
//! // The previous version is preserved
//! let updated = map.assoc("one".to_string(), 100);
//! assert_eq!(map.get(&"one".to_string()), Some(&1));
//! assert_eq!(updated.get(&"one".to_string()), Some(&100));
//!
//! // A no-op update keeps the same instance
//! assert!(updated.assoc("one".to_string(), 100).ptr_eq(&updated));
//! ```
//!
//! ## Set operations
//!
//! ```rust
//! use hashtrie::persistent::PersistentHashMap;
//!
//! let left: PersistentHashMap<i32, &str> = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();
//! let right = left.assoc(2, "B").dissoc(&3);
//!
//! let only_left = left.difference(&right).unwrap();
//! assert_eq!(only_left.len(), 2); // 2 differs, 3 is missing on the right
//!
//! let common = left.intersect(&right).unwrap();
//! assert_eq!(common.len(), 1);
//! assert_eq!(common.get(&1), Some(&"a"));
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

/// Weak counterpart of [`ReferenceCounter`].
#[cfg(feature = "arc")]
pub(crate) type WeakReferenceCounter<T> = std::sync::Weak<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type WeakReferenceCounter<T> = std::rc::Weak<T>;

// =============================================================================
// Shareable Bound
// =============================================================================

/// Marker for types that may live inside a shared map.
///
/// With the `arc` feature this requires `Send + Sync`, so that maps can cross
/// threads. Without it every type qualifies.
#[cfg(feature = "arc")]
pub trait Shareable: Send + Sync {}

#[cfg(feature = "arc")]
impl<T: Send + Sync + ?Sized> Shareable for T {}

/// Marker for types that may live inside a shared map.
///
/// With the `arc` feature this requires `Send + Sync`, so that maps can cross
/// threads. Without it every type qualifies.
#[cfg(not(feature = "arc"))]
pub trait Shareable {}

#[cfg(not(feature = "arc"))]
impl<T: ?Sized> Shareable for T {}

mod error;
mod hasher;
mod hashmap;
mod node;
mod registry;
mod set_ops;
mod trie;

pub use error::MapError;
pub use hasher::KeyHasher;
pub use hasher::default_hash;
pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIterator;
pub use registry::BlankRegistry;

// =============================================================================
// Tests
// =============================================================================
