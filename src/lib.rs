//! # hashtrie
//!
//! A persistent hash map built on a hash array mapped trie (HAMT).
//!
//! ## Overview
//!
//! Maps are immutable values. Every update returns a new map that shares all
//! untouched subtrees with the old one, so many versions can stay alive cheaply.
//!
//! - **Lookups and updates**: `get`, `assoc`, `dissoc` in O(log32 N)
//! - **Bulk operations**: `difference`, `intersect` and `equiv` that skip
//!   subtrees shared by both operands
//! - **No-op identity**: an operation that changes nothing returns the very
//!   same map instance
//! - **Canonical blanks**: one empty map per key hasher, served by an explicit
//!   [`BlankRegistry`](persistent::BlankRegistry)
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes through `Arc` so maps are `Send + Sync`
//! - `fxhash`: default key hasher uses `rustc-hash`
//! - `ahash`: default key hasher uses `ahash` with fixed seeds
//!
//! ## Example
//!
//! ```rust
//! use hashtrie::prelude::*;
//!
//! let map = PersistentHashMap::blank().assoc("answer", 42);
//! assert_eq!(map.get(&"answer"), Some(&42));
//! assert!(map.assoc("answer", 42).ptr_eq(&map));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use hashtrie::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
}

pub mod persistent;
