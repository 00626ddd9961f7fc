//! Trie node variants and the invariant helpers shared by every algorithm.
//!
//! A trie is built from three kinds of node:
//!
//! - [`Entry`]: a leaf holding one key, its value and the key's hash
//! - [`CollisionNode`]: two or more entries whose keys share one full hash
//! - [`ArrayNode`]: a 32-slot branch indexed by 5 bits of the hash
//!
//! Every node is immutable and reference counted, so a [`Node`] handle is cheap
//! to clone and two handles can be compared by identity.
//!
//! # Canonical shape
//!
//! For a given set of entries there is exactly one trie shape, and every
//! algorithm preserves it:
//!
//! - one entry is a bare [`Entry`]
//! - several entries with one hash are a [`CollisionNode`]
//! - anything else is an [`ArrayNode`] whose children are canonical one level
//!   down; an `ArrayNode` therefore covers at least two entries, and one with a
//!   single occupied slot only exists when that slot holds another `ArrayNode`

use smallvec::SmallVec;

use super::ReferenceCounter;

// =============================================================================
// Constants
// =============================================================================

/// Branching factor (2^5 = 32)
pub(crate) const BRANCHING_FACTOR: usize = 32;

/// Bits of the hash consumed per level
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Bit mask for extracting a slot index
const MASK: u32 = (BRANCHING_FACTOR - 1) as u32;

/// Number of levels needed to consume a 32-bit hash five bits at a time
pub(crate) const MAX_DEPTH: usize = 7;

/// Extracts the slot index for `key_hash` at the given shift.
#[inline]
pub(crate) const fn array_index(shift: u32, key_hash: u32) -> usize {
    // Past the last level every remaining bit is zero.
    let sliced = match key_hash.checked_shr(shift) {
        Some(sliced) => sliced,
        None => 0,
    };
    (sliced & MASK) as usize
}

// =============================================================================
// Node Definitions
// =============================================================================

/// Leaf node: one key-value pair with the key's precomputed hash.
pub(crate) struct Entry<K, V> {
    pub(crate) key_hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
}

impl<K, V> Entry<K, V> {
    pub(crate) const fn new(key_hash: u32, key: K, value: V) -> Self {
        Self {
            key_hash,
            key,
            value,
        }
    }
}

impl<K: PartialEq, V: PartialEq> Entry<K, V> {
    /// Structural equality by key and value; the hash is implied by the key.
    pub(crate) fn same_pair(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

/// Collision children; two is the overwhelmingly common size.
pub(crate) type CollisionChildren<K, V> = SmallVec<[ReferenceCounter<Entry<K, V>>; 2]>;

/// Bucket of at least two entries sharing `key_hash`, with pairwise-distinct keys.
pub(crate) struct CollisionNode<K, V> {
    pub(crate) children: CollisionChildren<K, V>,
    pub(crate) key_hash: u32,
}

impl<K, V> CollisionNode<K, V> {
    pub(crate) fn pair(
        first: ReferenceCounter<Entry<K, V>>,
        second: ReferenceCounter<Entry<K, V>>,
    ) -> Self {
        let key_hash = first.key_hash;
        let mut children = CollisionChildren::new();
        children.push(first);
        children.push(second);
        Self { children, key_hash }
    }
}

/// Slot array of an [`ArrayNode`].
pub(crate) type Slots<K, V> = [Option<Node<K, V>>; BRANCHING_FACTOR];

/// Returns an array of empty slots.
pub(crate) fn empty_slots<K, V>() -> Slots<K, V> {
    std::array::from_fn(|_| None)
}

/// 32-way branch node.
pub(crate) struct ArrayNode<K, V> {
    pub(crate) children: Slots<K, V>,
    /// Number of occupied slots.
    pub(crate) children_count: usize,
    /// Number of entries in the whole subtree.
    pub(crate) entry_count: usize,
}

impl<K, V> ArrayNode<K, V> {
    /// Wraps a leaf (entry or collision node) into a one-child branch at `shift`.
    ///
    /// The result is only a transient step of `assoc`: the caller immediately
    /// inserts a second entry with a different hash into it.
    pub(crate) fn wrap(leaf: Node<K, V>, key_hash: u32, shift: u32) -> Self {
        let entry_count = leaf.entry_count();
        let mut children = empty_slots();
        children[array_index(shift, key_hash)] = Some(leaf);
        Self {
            children,
            children_count: 1,
            entry_count,
        }
    }

    /// Copies this node with one slot replaced.
    pub(crate) fn with_child(
        &self,
        index: usize,
        child: Option<Node<K, V>>,
        children_count: usize,
        entry_count: usize,
    ) -> Self {
        let mut children = self.children.clone();
        children[index] = child;
        Self {
            children,
            children_count,
            entry_count,
        }
    }
}

/// A handle to any trie node.
pub(crate) enum Node<K, V> {
    Entry(ReferenceCounter<Entry<K, V>>),
    Collision(ReferenceCounter<CollisionNode<K, V>>),
    Array(ReferenceCounter<ArrayNode<K, V>>),
}

impl<K, V> Clone for Node<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Entry(entry) => Self::Entry(ReferenceCounter::clone(entry)),
            Self::Collision(collision) => Self::Collision(ReferenceCounter::clone(collision)),
            Self::Array(array) => Self::Array(ReferenceCounter::clone(array)),
        }
    }
}

impl<K, V> Node<K, V> {
    /// Number of entries reachable from this node.
    #[inline]
    pub(crate) fn entry_count(&self) -> usize {
        match self {
            Self::Entry(_) => 1,
            Self::Collision(collision) => collision.children.len(),
            Self::Array(array) => array.entry_count,
        }
    }

    /// Reference identity of two handles.
    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Entry(left), Self::Entry(right)) => ReferenceCounter::ptr_eq(left, right),
            (Self::Collision(left), Self::Collision(right)) => {
                ReferenceCounter::ptr_eq(left, right)
            }
            (Self::Array(left), Self::Array(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    pub(crate) const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}

/// Identity of two optional slots: both empty, or the same node.
#[inline]
pub(crate) fn same_slot<K, V>(left: Option<&Node<K, V>>, right: Option<&Node<K, V>>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => left.ptr_eq(right),
        _ => false,
    }
}

// =============================================================================
// Invariant helpers
// =============================================================================

/// Builds a branch from freshly computed slots, restoring the canonical shape.
///
/// A branch left with one occupied slot that is not itself a branch is
/// hoisted: the child is returned in place of the branch.
///
/// # Panics
///
/// Panics if `children_count` is zero; a branch always covers at least two
/// entries, so losing every child means an algorithm is broken.
pub(crate) fn rebuild_branch<K, V>(
    children: Slots<K, V>,
    children_count: usize,
    entry_count: usize,
) -> Node<K, V> {
    if children_count == 0 {
        invariant_violation("array node left without children");
    }
    if children_count == 1
        && let Some(child) = children.iter().flatten().next()
        && !child.is_array()
    {
        return child.clone();
    }
    Node::Array(ReferenceCounter::new(ArrayNode {
        children,
        children_count,
        entry_count,
    }))
}

/// Keeps the entries of a collision node accepted by `keep`.
///
/// Returns the node itself when nothing was dropped, a bare entry when one is
/// left, and nothing when none is.
pub(crate) fn retain_collision<K, V, F>(
    node: &Node<K, V>,
    collision: &CollisionNode<K, V>,
    mut keep: F,
) -> Option<Node<K, V>>
where
    F: FnMut(&ReferenceCounter<Entry<K, V>>) -> bool,
{
    let kept: CollisionChildren<K, V> = collision
        .children
        .iter()
        .filter(|entry| keep(*entry))
        .cloned()
        .collect();
    match kept.len() {
        0 => None,
        1 => kept.into_iter().next().map(Node::Entry),
        length if length == collision.children.len() => Some(node.clone()),
        _ => Some(Node::Collision(ReferenceCounter::new(CollisionNode {
            children: kept,
            key_hash: collision.key_hash,
        }))),
    }
}

/// Aborts on a broken structural invariant.
#[cold]
#[inline(never)]
pub(crate) fn invariant_violation(what: &str) -> ! {
    tracing::error!(invariant = what, "hash trie invariant violated");
    panic!("hash trie invariant violated: {what}");
}
