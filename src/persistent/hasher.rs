//! Key hashing collaborator.
//!
//! The trie only needs a deterministic `key -> u32` function. Which function a
//! map was built with matters for combining maps, so a [`KeyHasher`] is a
//! shared handle whose *identity* (not behaviour) is what gets compared.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::{ReferenceCounter, Shareable};

#[cfg(feature = "arc")]
type HashFunction<K> = dyn Fn(&K) -> u32 + Send + Sync;

#[cfg(not(feature = "arc"))]
type HashFunction<K> = dyn Fn(&K) -> u32;

/// A shared, identity-compared key hash function.
///
/// Cloning a `KeyHasher` yields the same identity; building two hashers from
/// the same closure yields two identities.
///
/// # Examples
///
/// ```rust
/// use hashtrie::persistent::KeyHasher;
///
/// let by_identity = KeyHasher::new(|key: &u32| *key);
/// let copy = by_identity.clone();
/// let lookalike = KeyHasher::new(|key: &u32| *key);
///
/// assert_eq!(by_identity.hash(&33), 33);
/// assert!(by_identity.same_as(&copy));
/// assert!(!by_identity.same_as(&lookalike));
/// ```
pub struct KeyHasher<K> {
    function: ReferenceCounter<HashFunction<K>>,
}

impl<K> KeyHasher<K> {
    /// Wraps a hash function into a new hasher identity.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&K) -> u32 + Shareable + 'static,
    {
        Self {
            function: ReferenceCounter::new(function),
        }
    }

    /// Hashes a key.
    #[inline]
    #[must_use]
    pub fn hash(&self, key: &K) -> u32 {
        (self.function)(key)
    }

    /// Returns `true` if both handles share the same hash-function identity.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.function, &other.function)
    }

    /// Address of the shared function, used as the registry key.
    pub(crate) fn identity(&self) -> usize {
        ReferenceCounter::as_ptr(&self.function).cast::<()>() as usize
    }
}

impl<K: Hash> KeyHasher<K> {
    /// Creates a new hasher identity around [`default_hash`].
    ///
    /// Most callers want [`BlankRegistry::default_hasher`](super::BlankRegistry::default_hasher)
    /// instead, which hands out one canonical default hasher per key type.
    #[must_use]
    pub fn from_hash() -> Self
    where
        K: 'static,
    {
        Self::new(default_hash::<K>)
    }
}

impl<K> Clone for KeyHasher<K> {
    fn clone(&self) -> Self {
        Self {
            function: ReferenceCounter::clone(&self.function),
        }
    }
}

impl<K> fmt::Debug for KeyHasher<K> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("KeyHasher")
            .field(&format_args!("{:#x}", self.identity()))
            .finish()
    }
}

// =============================================================================
// Default hash
// =============================================================================

#[cfg(feature = "fxhash")]
fn digest_hasher() -> impl Hasher {
    rustc_hash::FxHasher::default()
}

#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
fn digest_hasher() -> impl Hasher {
    use std::hash::BuildHasher;
    // Fixed seeds: the same key must hash the same way in every map version.
    ahash::RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
    .build_hasher()
}

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
fn digest_hasher() -> impl Hasher {
    std::collections::hash_map::DefaultHasher::new()
}

/// Hashes a key with the crate's default algorithm, folded to 32 bits.
///
/// The algorithm is `std`'s `DefaultHasher`, or `FxHasher` / `ahash` when the
/// `fxhash` / `ahash` features are enabled. It is deterministic for a given
/// build.
///
/// # Examples
///
/// ```rust
/// use hashtrie::persistent::default_hash;
///
/// assert_eq!(default_hash("key"), default_hash("key"));
/// ```
#[must_use]
pub fn default_hash<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut hasher = digest_hasher();
    key.hash(&mut hasher);
    let digest = hasher.finish();
    #[allow(clippy::cast_possible_truncation)]
    let folded = (digest ^ (digest >> 32)) as u32;
    folded
}
