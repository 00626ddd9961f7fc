//! Point operations on the trie: `assoc`, `dissoc` and `get_entry`.
//!
//! All three dispatch on the node variant and recurse one level (five hash
//! bits) at a time. The mutating ones return the input handle itself when
//! nothing changes, so callers detect a no-op by identity and avoid allocating
//! all the way up to the map.

use super::ReferenceCounter;
use super::node::{
    ArrayNode, BITS_PER_LEVEL, CollisionChildren, CollisionNode, Entry, Node, array_index,
    invariant_violation, rebuild_branch,
};

// =============================================================================
// assoc
// =============================================================================

/// Associates `entry` into the subtree rooted at `node`.
///
/// Returns `node` itself (same handle) when the key is already bound to an
/// equal value.
pub(crate) fn assoc<K, V>(
    node: &Node<K, V>,
    shift: u32,
    entry: &ReferenceCounter<Entry<K, V>>,
) -> Node<K, V>
where
    K: Eq,
    V: PartialEq,
{
    match node {
        Node::Array(array) => assoc_array(node, array, shift, entry),
        Node::Entry(existing) => {
            if existing.key == entry.key {
                if existing.value == entry.value {
                    node.clone()
                } else {
                    Node::Entry(ReferenceCounter::clone(entry))
                }
            } else if existing.key_hash == entry.key_hash {
                Node::Collision(ReferenceCounter::new(CollisionNode::pair(
                    ReferenceCounter::clone(existing),
                    ReferenceCounter::clone(entry),
                )))
            } else {
                promote(node, existing.key_hash, shift, entry)
            }
        }
        Node::Collision(collision) => {
            if collision.key_hash == entry.key_hash {
                assoc_collision(node, collision, entry)
            } else {
                promote(node, collision.key_hash, shift, entry)
            }
        }
    }
}

fn assoc_array<K, V>(
    node: &Node<K, V>,
    array: &ArrayNode<K, V>,
    shift: u32,
    entry: &ReferenceCounter<Entry<K, V>>,
) -> Node<K, V>
where
    K: Eq,
    V: PartialEq,
{
    let index = array_index(shift, entry.key_hash);
    match &array.children[index] {
        None => Node::Array(ReferenceCounter::new(array.with_child(
            index,
            Some(Node::Entry(ReferenceCounter::clone(entry))),
            array.children_count + 1,
            array.entry_count + 1,
        ))),
        Some(child) => {
            let new_child = assoc(child, shift + BITS_PER_LEVEL, entry);
            if new_child.ptr_eq(child) {
                node.clone()
            } else {
                let entry_count = array.entry_count + new_child.entry_count() - child.entry_count();
                Node::Array(ReferenceCounter::new(array.with_child(
                    index,
                    Some(new_child),
                    array.children_count,
                    entry_count,
                )))
            }
        }
    }
}

fn assoc_collision<K, V>(
    node: &Node<K, V>,
    collision: &CollisionNode<K, V>,
    entry: &ReferenceCounter<Entry<K, V>>,
) -> Node<K, V>
where
    K: Eq,
    V: PartialEq,
{
    let position = collision
        .children
        .iter()
        .position(|child| child.key == entry.key);
    if position.is_some_and(|position| collision.children[position].value == entry.value) {
        return node.clone();
    }
    let mut children: CollisionChildren<K, V> = collision.children.clone();
    match position {
        Some(position) => children[position] = ReferenceCounter::clone(entry),
        None => children.push(ReferenceCounter::clone(entry)),
    }
    Node::Collision(ReferenceCounter::new(CollisionNode {
        children,
        key_hash: collision.key_hash,
    }))
}

/// Pushes a leaf one level down into a fresh branch, then inserts `entry` there.
fn promote<K, V>(
    leaf: &Node<K, V>,
    leaf_hash: u32,
    shift: u32,
    entry: &ReferenceCounter<Entry<K, V>>,
) -> Node<K, V>
where
    K: Eq,
    V: PartialEq,
{
    let branch = Node::Array(ReferenceCounter::new(ArrayNode::wrap(
        leaf.clone(),
        leaf_hash,
        shift,
    )));
    assoc(&branch, shift, entry)
}

// =============================================================================
// get
// =============================================================================

/// Looks up the entry bound to `key`. Never allocates.
pub(crate) fn get_entry<'a, K, V>(
    node: &'a Node<K, V>,
    shift: u32,
    key_hash: u32,
    key: &K,
) -> Option<&'a ReferenceCounter<Entry<K, V>>>
where
    K: Eq,
{
    match node {
        Node::Array(array) => array.children[array_index(shift, key_hash)]
            .as_ref()
            .and_then(|child| get_entry(child, shift + BITS_PER_LEVEL, key_hash, key)),
        Node::Entry(entry) => (entry.key_hash == key_hash && entry.key == *key).then_some(entry),
        Node::Collision(collision) => {
            if collision.key_hash == key_hash {
                collision.children.iter().find(|child| child.key == *key)
            } else {
                None
            }
        }
    }
}

// =============================================================================
// dissoc
// =============================================================================

/// Removes `key` from the subtree rooted at `node`.
///
/// Returns `Some(node)` (same handle) when the key is absent, `None` when the
/// subtree became empty, and otherwise the canonical replacement subtree.
pub(crate) fn dissoc<K, V>(
    node: &Node<K, V>,
    shift: u32,
    key_hash: u32,
    key: &K,
) -> Option<Node<K, V>>
where
    K: Eq,
{
    match node {
        Node::Array(array) => dissoc_array(node, array, shift, key_hash, key),
        Node::Entry(entry) => {
            if entry.key_hash == key_hash && entry.key == *key {
                None
            } else {
                Some(node.clone())
            }
        }
        Node::Collision(collision) => Some(dissoc_collision(node, collision, key_hash, key)),
    }
}

fn dissoc_array<K, V>(
    node: &Node<K, V>,
    array: &ArrayNode<K, V>,
    shift: u32,
    key_hash: u32,
    key: &K,
) -> Option<Node<K, V>>
where
    K: Eq,
{
    let index = array_index(shift, key_hash);
    let Some(child) = &array.children[index] else {
        return Some(node.clone());
    };
    let new_child = dissoc(child, shift + BITS_PER_LEVEL, key_hash, key);
    let children_count = match &new_child {
        Some(new_child) if new_child.ptr_eq(child) => return Some(node.clone()),
        Some(_) => array.children_count,
        None => match array.children_count.checked_sub(1) {
            Some(0) | None => invariant_violation("array node lost its last child"),
            Some(remaining) => remaining,
        },
    };
    let mut children = array.children.clone();
    children[index] = new_child;
    Some(rebuild_branch(
        children,
        children_count,
        array.entry_count - 1,
    ))
}

fn dissoc_collision<K, V>(
    node: &Node<K, V>,
    collision: &CollisionNode<K, V>,
    key_hash: u32,
    key: &K,
) -> Node<K, V>
where
    K: Eq,
{
    if collision.key_hash != key_hash {
        return node.clone();
    }
    let Some(position) = collision.children.iter().position(|child| child.key == *key) else {
        return node.clone();
    };
    if collision.children.len() == 2 {
        // A bucket never holds a single entry: the survivor becomes a bare leaf.
        return Node::Entry(ReferenceCounter::clone(&collision.children[1 - position]));
    }
    let mut children = collision.children.clone();
    children.remove(position);
    Node::Collision(ReferenceCounter::new(CollisionNode {
        children,
        key_hash,
    }))
}
