//! Error types for the persistent map.
//!
//! Only user-recoverable conditions live here. A broken trie invariant is a
//! defect in the algorithms and panics instead.

/// Represents errors that can occur when combining or updating maps.
///
/// # Examples
///
/// ```rust
/// use hashtrie::persistent::{KeyHasher, MapError, PersistentHashMap};
///
/// let by_identity = KeyHasher::new(|key: &u32| *key);
/// let left: PersistentHashMap<u32, u32> = PersistentHashMap::blank_with(&by_identity).assoc(1, 1);
/// let right: PersistentHashMap<u32, u32> = PersistentHashMap::blank().assoc(1, 1);
///
/// assert_eq!(left.difference(&right), Err(MapError::IncompatibleHashers));
/// assert_eq!(
///     format!("{}", MapError::IncompatibleHashers),
///     "maps were built with different key hashers"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapError {
    /// The two operands of `difference` or `intersect` were built with
    /// different hash-function identities. Rebuild one side with the other's
    /// hasher to combine them.
    IncompatibleHashers,
    /// `try_assoc_new` was called with a key the map already contains.
    KeyAlreadyPresent,
}

impl std::fmt::Display for MapError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompatibleHashers => {
                write!(formatter, "maps were built with different key hashers")
            }
            Self::KeyAlreadyPresent => write!(formatter, "key already present"),
        }
    }
}

impl std::error::Error for MapError {}
