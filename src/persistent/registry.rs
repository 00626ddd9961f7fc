//! Registry of canonical blank maps.
//!
//! Every distinct key hasher gets exactly one empty map per map type, so all
//! `blank` requests for that hasher return the same instance. The registry is
//! an explicit value: [`BlankRegistry::global`] is the module-level context
//! used by [`PersistentHashMap::blank`](super::PersistentHashMap::blank), and
//! [`BlankRegistry::new`] builds independent ones for tests or embedding.
//!
//! # Scope of the module-level context
//!
//! With the `arc` feature the context is process-wide. Without it the context
//! is per thread; `Rc`-backed maps cannot leave their thread, so every
//! observer still sees a single canonical instance per hasher.
//!
//! Entries are created lazily and never evicted.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use super::hashmap::PersistentHashMap;
use super::hasher::KeyHasher;
use super::{ReferenceCounter, Shareable, WeakReferenceCounter};

#[cfg(feature = "arc")]
type Slot = Box<dyn Any + Send + Sync>;

#[cfg(not(feature = "arc"))]
type Slot = Box<dyn Any>;

/// Cache key of a blank map: hasher identity and concrete map type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct BlankKey {
    hasher: usize,
    map_type: TypeId,
}

#[derive(Default)]
struct RegistryState {
    /// Canonical default hasher per key type.
    default_hashers: Mutex<HashMap<TypeId, Slot>>,
    /// Canonical blank map per hasher and map type.
    blanks: Mutex<HashMap<BlankKey, Slot>>,
}

/// Explicit cache of canonical blank maps, keyed by hasher identity.
///
/// Cloning a registry yields a handle to the same cache.
///
/// # Examples
///
/// ```rust
/// use hashtrie::persistent::{BlankRegistry, KeyHasher, PersistentHashMap};
///
/// let registry = BlankRegistry::new();
/// let hasher = KeyHasher::new(|key: &u32| *key);
///
/// let first: PersistentHashMap<u32, &str> = registry.blank_with(&hasher);
/// let second: PersistentHashMap<u32, &str> = registry.blank_with(&hasher);
/// assert!(first.ptr_eq(&second));
///
/// // Emptying a map returns the blank of the registry it came from.
/// let emptied = first.assoc(1, "one").dissoc(&1);
/// assert!(emptied.ptr_eq(&first));
/// ```
#[derive(Clone, Default)]
pub struct BlankRegistry {
    state: ReferenceCounter<RegistryState>,
}

#[cfg(feature = "arc")]
static GLOBAL_REGISTRY: std::sync::LazyLock<BlankRegistry> =
    std::sync::LazyLock::new(BlankRegistry::new);

#[cfg(not(feature = "arc"))]
thread_local! {
    static GLOBAL_REGISTRY: BlankRegistry = BlankRegistry::new();
}

impl BlankRegistry {
    /// Creates an empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the module-level registry.
    #[must_use]
    pub fn global() -> Self {
        #[cfg(feature = "arc")]
        {
            GLOBAL_REGISTRY.clone()
        }
        #[cfg(not(feature = "arc"))]
        {
            GLOBAL_REGISTRY.with(Clone::clone)
        }
    }

    /// Returns the canonical default hasher for key type `K`.
    ///
    /// Repeated calls on the same registry return the same hasher identity.
    #[must_use]
    pub fn default_hasher<K>(&self) -> KeyHasher<K>
    where
        K: Hash + Shareable + 'static,
    {
        let mut default_hashers = self.state.default_hashers.lock();
        let slot = default_hashers.entry(TypeId::of::<K>()).or_insert_with(|| {
            tracing::debug!(
                key_type = std::any::type_name::<K>(),
                "registered default key hasher"
            );
            Box::new(KeyHasher::<K>::from_hash())
        });
        match slot.downcast_ref::<KeyHasher<K>>() {
            Some(hasher) => hasher.clone(),
            None => unreachable!("default hasher slot keyed by its own type"),
        }
    }

    /// Returns the canonical blank map built with the default hasher.
    #[must_use]
    pub fn blank<K, V>(&self) -> PersistentHashMap<K, V>
    where
        K: Hash + Eq + Shareable + 'static,
        V: PartialEq + Shareable + 'static,
    {
        self.blank_with(&self.default_hasher::<K>())
    }

    /// Returns the canonical blank map for `hasher`.
    ///
    /// Lookup and first construction happen under one lock, so concurrent
    /// first requests still agree on a single instance.
    #[must_use]
    pub fn blank_with<K, V>(&self, hasher: &KeyHasher<K>) -> PersistentHashMap<K, V>
    where
        K: Eq + Shareable + 'static,
        V: PartialEq + Shareable + 'static,
    {
        let key = BlankKey {
            hasher: hasher.identity(),
            map_type: TypeId::of::<PersistentHashMap<K, V>>(),
        };
        let mut blanks = self.state.blanks.lock();
        let slot = blanks.entry(key).or_insert_with(|| {
            tracing::debug!(
                hasher = key.hasher,
                map_type = std::any::type_name::<PersistentHashMap<K, V>>(),
                "registered canonical blank map"
            );
            Box::new(PersistentHashMap::<K, V>::detached_blank(
                hasher.clone(),
                self.link(),
            ))
        });
        match slot.downcast_ref::<PersistentHashMap<K, V>>() {
            Some(blank) => blank.clone(),
            None => unreachable!("blank map slot keyed by its own type"),
        }
    }

    /// Number of cached blank maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.blanks.lock().len()
    }

    /// Returns `true` if no blank map has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if both handles refer to the same cache.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn link(&self) -> RegistryLink {
        RegistryLink(ReferenceCounter::downgrade(&self.state))
    }
}

impl std::fmt::Debug for BlankRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BlankRegistry")
            .field("blanks", &self.len())
            .finish()
    }
}

/// Non-owning link from a map back to the registry that produced it.
///
/// Cached blank maps hold one of these, so it must not keep the registry alive.
#[derive(Clone, Default)]
pub(crate) struct RegistryLink(WeakReferenceCounter<RegistryState>);

impl RegistryLink {
    pub(crate) fn upgrade(&self) -> Option<BlankRegistry> {
        self.0.upgrade().map(|state| BlankRegistry { state })
    }
}
