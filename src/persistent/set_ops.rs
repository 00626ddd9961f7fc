//! Bulk operations defined directly over two tries: `difference`,
//! `intersect` and `equiv`.
//!
//! Both operands must have been built with the same key hasher, so equal keys
//! sit on the same path in both tries. Shared subtrees are recognised by
//! identity and resolved without being walked.

use super::ReferenceCounter;
use super::node::{
    ArrayNode, BITS_PER_LEVEL, Entry, Node, Slots, empty_slots, rebuild_branch, retain_collision,
    same_slot,
};
use super::trie::{dissoc, get_entry};

/// Returns `true` if `node` binds `entry`'s key to an equal value.
fn contains_pair<K, V>(node: &Node<K, V>, shift: u32, entry: &ReferenceCounter<Entry<K, V>>) -> bool
where
    K: Eq,
    V: PartialEq,
{
    get_entry(node, shift, entry.key_hash, &entry.key).is_some_and(|found| {
        ReferenceCounter::ptr_eq(found, entry) || found.value == entry.value
    })
}

/// Outcome of combining two branches slot by slot.
struct SlotMerge<K, V> {
    children: Slots<K, V>,
    children_count: usize,
    entry_count: usize,
    unchanged: bool,
}

impl<K, V> SlotMerge<K, V> {
    /// Combines every slot pair with `combine`, tracking whether each result
    /// is the left child itself.
    fn run<F>(left: &ArrayNode<K, V>, right: &ArrayNode<K, V>, mut combine: F) -> Self
    where
        F: FnMut(Option<&Node<K, V>>, Option<&Node<K, V>>) -> Option<Node<K, V>>,
    {
        let mut merge = Self {
            children: empty_slots(),
            children_count: 0,
            entry_count: 0,
            unchanged: true,
        };
        for (index, (left_child, right_child)) in
            left.children.iter().zip(right.children.iter()).enumerate()
        {
            let child = combine(left_child.as_ref(), right_child.as_ref());
            if !same_slot(child.as_ref(), left_child.as_ref()) {
                merge.unchanged = false;
            }
            if let Some(child) = &child {
                merge.children_count += 1;
                merge.entry_count += child.entry_count();
            }
            merge.children[index] = child;
        }
        merge
    }

    fn finish(self, left: &Node<K, V>) -> Option<Node<K, V>> {
        if self.children_count == 0 {
            None
        } else if self.unchanged {
            Some(left.clone())
        } else {
            Some(rebuild_branch(
                self.children,
                self.children_count,
                self.entry_count,
            ))
        }
    }
}

// =============================================================================
// difference
// =============================================================================

/// Keeps the entries of `left` that are absent from `right` or bound to a
/// different value there.
///
/// Returns the left handle itself when nothing was removed, and `None` when
/// everything was.
pub(crate) fn difference<K, V>(
    left: Option<&Node<K, V>>,
    right: Option<&Node<K, V>>,
    shift: u32,
) -> Option<Node<K, V>>
where
    K: Eq,
    V: PartialEq,
{
    let left = left?;
    let Some(right) = right else {
        return Some(left.clone());
    };
    if left.ptr_eq(right) {
        return None;
    }
    match (left, right) {
        (Node::Array(left_array), Node::Array(right_array)) => {
            SlotMerge::run(left_array, right_array, |left_child, right_child| {
                difference(left_child, right_child, shift + BITS_PER_LEVEL)
            })
            .finish(left)
        }
        (_, Node::Entry(right_entry)) => remove_pair(left, shift, right_entry),
        (Node::Array(_), Node::Collision(right_collision)) => {
            let mut result = left.clone();
            for right_entry in &right_collision.children {
                result = remove_pair(&result, shift, right_entry)?;
            }
            Some(result)
        }
        (Node::Entry(left_entry), _) => {
            if contains_pair(right, shift, left_entry) {
                None
            } else {
                Some(left.clone())
            }
        }
        (Node::Collision(left_collision), _) => {
            retain_collision(left, left_collision, |left_entry| {
                !contains_pair(right, shift, left_entry)
            })
        }
    }
}

/// Point removal of `entry`'s key from `node`, only if bound to an equal value.
fn remove_pair<K, V>(
    node: &Node<K, V>,
    shift: u32,
    entry: &ReferenceCounter<Entry<K, V>>,
) -> Option<Node<K, V>>
where
    K: Eq,
    V: PartialEq,
{
    if contains_pair(node, shift, entry) {
        dissoc(node, shift, entry.key_hash, &entry.key)
    } else {
        Some(node.clone())
    }
}

// =============================================================================
// intersect
// =============================================================================

/// Keeps the entries bound to equal values in both tries.
///
/// Where a pair is present on both sides the result may reuse either side's
/// node; only the contents are defined.
pub(crate) fn intersect<K, V>(
    left: Option<&Node<K, V>>,
    right: Option<&Node<K, V>>,
    shift: u32,
) -> Option<Node<K, V>>
where
    K: Eq,
    V: PartialEq,
{
    let (left, right) = (left?, right?);
    if left.ptr_eq(right) {
        return Some(left.clone());
    }
    match (left, right) {
        (Node::Array(left_array), Node::Array(right_array)) => {
            SlotMerge::run(left_array, right_array, |left_child, right_child| {
                intersect(left_child, right_child, shift + BITS_PER_LEVEL)
            })
            .finish(left)
        }
        (Node::Entry(left_entry), _) => {
            contains_pair(right, shift, left_entry).then(|| left.clone())
        }
        (_, Node::Entry(right_entry)) => {
            get_entry(left, shift, right_entry.key_hash, &right_entry.key)
                .filter(|found| {
                    ReferenceCounter::ptr_eq(found, right_entry) || found.value == right_entry.value
                })
                .map(|found| Node::Entry(ReferenceCounter::clone(found)))
        }
        (Node::Collision(left_collision), _) => {
            retain_collision(left, left_collision, |left_entry| {
                contains_pair(right, shift, left_entry)
            })
        }
        (Node::Array(_), Node::Collision(right_collision)) => {
            retain_collision(right, right_collision, |right_entry| {
                contains_pair(left, shift, right_entry)
            })
        }
    }
}

// =============================================================================
// equiv
// =============================================================================

/// Content equivalence of two tries built with the same hasher.
///
/// Relies on the canonical shape: equal contents always produce matching
/// variants at matching positions, so any variant mismatch means inequality.
pub(crate) fn equiv<K, V>(left: Option<&Node<K, V>>, right: Option<&Node<K, V>>, shift: u32) -> bool
where
    K: Eq,
    V: PartialEq,
{
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => left.ptr_eq(right) || equiv_nodes(left, right, shift),
        _ => false,
    }
}

fn equiv_nodes<K, V>(left: &Node<K, V>, right: &Node<K, V>, shift: u32) -> bool
where
    K: Eq,
    V: PartialEq,
{
    match (left, right) {
        (Node::Array(left_array), Node::Array(right_array)) => {
            left_array.entry_count == right_array.entry_count
                && left_array
                    .children
                    .iter()
                    .zip(right_array.children.iter())
                    .all(|(left_child, right_child)| {
                        equiv(left_child.as_ref(), right_child.as_ref(), shift + BITS_PER_LEVEL)
                    })
        }
        (Node::Entry(left_entry), Node::Entry(right_entry)) => left_entry.same_pair(right_entry),
        (Node::Collision(left_collision), Node::Collision(right_collision)) => {
            left_collision.key_hash == right_collision.key_hash
                && left_collision.children.len() == right_collision.children.len()
                && left_collision.children.iter().all(|left_entry| {
                    right_collision
                        .children
                        .iter()
                        .any(|right_entry| left_entry.same_pair(right_entry))
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::node::test_support::*;
    use super::super::trie::assoc;
    use super::*;
    use rstest::rstest;

    type TestEntry = ReferenceCounter<Entry<i32, i32>>;

    /// Builds a trie by associating entries in order.
    fn build(entries: &[&TestEntry]) -> Node<i32, i32> {
        let (first, rest) = entries.split_first().expect("at least one entry");
        rest.iter()
            .fold(leaf(*first), |node, next| assoc(&node, 0, *next))
    }

    fn pairs(node: Option<&Node<i32, i32>>) -> Vec<(i32, i32)> {
        fn collect(node: &Node<i32, i32>, into: &mut Vec<(i32, i32)>) {
            match node {
                Node::Entry(entry) => into.push((entry.key, entry.value)),
                Node::Collision(collision) => {
                    into.extend(collision.children.iter().map(|entry| (entry.key, entry.value)));
                }
                Node::Array(array) => array.children.iter().flatten().for_each(|child| collect(child, into)),
            }
        }
        let mut result = Vec::new();
        if let Some(node) = node {
            collect(node, &mut result);
        }
        result.sort_unstable();
        result
    }

    // =========================================================================
    // difference
    // =========================================================================

    #[rstest]
    fn test_difference_trivial_operands() {
        let node = build(&[&entry(1, 1, 1), &entry(2, 2, 2)]);
        assert!(difference(Some(&node), Some(&node), 0).is_none());
        assert!(difference(None, Some(&node), 0).is_none());
        assert!(difference(Some(&node), None, 0).is_some_and(|kept| kept.ptr_eq(&node)));
    }

    #[rstest]
    fn test_difference_entries() {
        let left = leaf(&entry(1, 1, 1));
        assert!(difference(Some(&left), Some(&leaf(&entry(1, 1, 1))), 0).is_none());
        let changed = difference(Some(&left), Some(&leaf(&entry(1, 1, 2))), 0);
        assert!(changed.is_some_and(|kept| kept.ptr_eq(&left)));
    }

    #[rstest]
    fn test_difference_entry_against_branch() {
        let left = leaf(&entry(33, 33, 33));
        let right = build(&[&entry(1, 1, 1), &entry(33, 33, 33)]);
        assert!(difference(Some(&left), Some(&right), 0).is_none());
        let right = build(&[&entry(1, 1, 1), &entry(33, 33, 0)]);
        assert!(difference(Some(&left), Some(&right), 0).is_some_and(|kept| kept.ptr_eq(&left)));
    }

    #[rstest]
    fn test_difference_branch_against_entry_removes_match() {
        let survivor = entry(2, 2, 2);
        let left = build(&[&entry(1, 1, 1), &survivor]);
        let result = difference(Some(&left), Some(&leaf(&entry(1, 1, 1))), 0).unwrap();
        assert!(ReferenceCounter::ptr_eq(as_entry(&result), &survivor));
    }

    #[rstest]
    fn test_difference_branches_share_untouched_left() {
        let left = build(&[&entry(1, 1, 1), &entry(2, 2, 2), &entry(3, 3, 3)]);
        let right = build(&[&entry(4, 4, 4), &entry(5, 5, 5)]);
        assert!(difference(Some(&left), Some(&right), 0).is_some_and(|kept| kept.ptr_eq(&left)));
    }

    #[rstest]
    fn test_difference_branches_drop_shared_subtrees() {
        let base = build(&[&entry(1, 1, 1), &entry(2, 2, 2), &entry(3, 3, 3)]);
        let extended = assoc(&base, 0, &entry(4, 4, 4));
        let result = difference(Some(&extended), Some(&base), 0).unwrap();
        assert_eq!(pairs(Some(&result)), vec![(4, 4)]);
        assert!(as_entry(&result).key == 4);
    }

    #[rstest]
    fn test_difference_branch_against_collision() {
        let left = build(&[&entry(7, 1, 1), &entry(7, 2, 2), &entry(8, 3, 3)]);
        let right = collision(&entry(7, 1, 1), &entry(7, 2, 20));
        let result = difference(Some(&left), Some(&right), 0);
        assert_eq!(pairs(result.as_ref()), vec![(2, 2), (3, 3)]);
    }

    #[rstest]
    fn test_difference_collisions() {
        let left = build(&[&entry(7, 1, 1), &entry(7, 2, 2), &entry(7, 3, 3)]);
        let right = build(&[&entry(7, 1, 1), &entry(7, 2, 0)]);
        let result = difference(Some(&left), Some(&right), 0);
        assert_eq!(pairs(result.as_ref()), vec![(2, 2), (3, 3)]);

        let right = build(&[&entry(7, 1, 1), &entry(7, 3, 3)]);
        let result = difference(Some(&left), Some(&right), 0).unwrap();
        assert_eq!(as_entry(&result).key, 2);

        let right = build(&[&entry(7, 4, 4), &entry(7, 5, 5)]);
        assert!(difference(Some(&left), Some(&right), 0).is_some_and(|kept| kept.ptr_eq(&left)));
    }

    #[rstest]
    fn test_difference_collision_against_entry() {
        let survivor = entry(7, 2, 2);
        let left = collision(&entry(7, 1, 1), &survivor);
        let result = difference(Some(&left), Some(&leaf(&entry(7, 1, 1))), 0).unwrap();
        assert!(ReferenceCounter::ptr_eq(as_entry(&result), &survivor));
    }

    // =========================================================================
    // intersect
    // =========================================================================

    #[rstest]
    fn test_intersect_trivial_operands() {
        let node = build(&[&entry(1, 1, 1), &entry(2, 2, 2)]);
        assert!(intersect(Some(&node), Some(&node), 0).is_some_and(|kept| kept.ptr_eq(&node)));
        assert!(intersect(None, Some(&node), 0).is_none());
        assert!(intersect(Some(&node), None, 0).is_none());
    }

    #[rstest]
    #[case(&[(1, 1, 1), (2, 2, 2), (3, 3, 3)], &[(2, 2, 2), (3, 3, 0), (4, 4, 4)], &[(2, 2)])]
    #[case(&[(1, 1, 1), (33, 33, 33)], &[(33, 33, 33)], &[(33, 33)])]
    #[case(&[(33, 33, 33)], &[(1, 1, 1), (33, 33, 33)], &[(33, 33)])]
    #[case(&[(7, 1, 1), (7, 2, 2), (8, 3, 3)], &[(7, 1, 1), (7, 2, 2)], &[(1, 1), (2, 2)])]
    #[case(&[(7, 1, 1), (7, 2, 2)], &[(7, 1, 1), (7, 2, 2), (8, 3, 3)], &[(1, 1), (2, 2)])]
    #[case(&[(7, 1, 1), (7, 2, 2), (7, 3, 3)], &[(7, 3, 3), (7, 1, 0)], &[(3, 3)])]
    #[case(&[(1, 1, 1), (2, 2, 2)], &[(3, 3, 3), (4, 4, 4)], &[])]
    fn test_intersect_matches_reference(
        #[case] left: &[(u32, i32, i32)],
        #[case] right: &[(u32, i32, i32)],
        #[case] expected: &[(i32, i32)],
    ) {
        let to_entries = |triples: &[(u32, i32, i32)]| -> Vec<TestEntry> {
            triples.iter().map(|&(hash, key, value)| entry(hash, key, value)).collect()
        };
        let (left_entries, right_entries) = (to_entries(left), to_entries(right));
        let left = build(&left_entries.iter().collect::<Vec<_>>());
        let right = build(&right_entries.iter().collect::<Vec<_>>());

        let forward = intersect(Some(&left), Some(&right), 0);
        let backward = intersect(Some(&right), Some(&left), 0);
        assert_eq!(pairs(forward.as_ref()), expected.to_vec());
        assert_eq!(pairs(backward.as_ref()), expected.to_vec());
        assert!(equiv(forward.as_ref(), backward.as_ref(), 0));
    }

    // =========================================================================
    // equiv
    // =========================================================================

    #[rstest]
    fn test_equiv_ignores_insertion_order() {
        let forward = build(&[&entry(1, 1, 1), &entry(33, 33, 33), &entry(2, 2, 2)]);
        let backward = build(&[&entry(2, 2, 2), &entry(33, 33, 33), &entry(1, 1, 1)]);
        assert!(equiv(Some(&forward), Some(&backward), 0));
    }

    #[rstest]
    fn test_equiv_collisions_ignore_order() {
        let forward = build(&[&entry(7, 1, 1), &entry(7, 2, 2)]);
        let backward = build(&[&entry(7, 2, 2), &entry(7, 1, 1)]);
        assert!(equiv(Some(&forward), Some(&backward), 0));
        let other = build(&[&entry(7, 2, 2), &entry(7, 1, 0)]);
        assert!(!equiv(Some(&forward), Some(&other), 0));
    }

    #[rstest]
    fn test_equiv_detects_differences() {
        let base = build(&[&entry(1, 1, 1), &entry(2, 2, 2)]);
        let changed = build(&[&entry(1, 1, 1), &entry(2, 2, 3)]);
        let larger = build(&[&entry(1, 1, 1), &entry(2, 2, 2), &entry(3, 3, 3)]);
        assert!(!equiv(Some(&base), Some(&changed), 0));
        assert!(!equiv(Some(&base), Some(&larger), 0));
        assert!(!equiv(Some(&base), None, 0));
        assert!(equiv::<i32, i32>(None, None, 0));
    }

    #[rstest]
    fn test_equiv_after_removal_matches_fresh_build() {
        let removed = dissoc(&build(&[&entry(1, 1, 1), &entry(33, 33, 33)]), 0, 1, &1);
        let fresh = leaf(&entry(33, 33, 33));
        assert!(equiv(removed.as_ref(), Some(&fresh), 0));
    }
}
