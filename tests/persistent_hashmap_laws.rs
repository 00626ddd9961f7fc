//! Property-based tests for PersistentHashMap.
//!
//! Random assoc/dissoc sequences are replayed against `std::collections::HashMap`
//! and the results compared. Narrowed and clustered hashers force collision
//! buckets and deep branches.

use hashtrie::persistent::{KeyHasher, PersistentHashMap};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;

const KEY_SPACE: u32 = 200;

// =============================================================================
// Strategy for generating test data
// =============================================================================

#[derive(Clone, Copy, Debug)]
enum Operation {
    Assoc(u32, u8),
    Dissoc(u32),
}

#[derive(Clone, Copy, Debug)]
enum Hashing {
    Default,
    /// Only `pool` distinct hash values.
    Pool(u32),
    /// Hash bits only above bit 25: long single-child paths and shared buckets.
    Clustered,
}

impl Hashing {
    fn blank(self) -> PersistentHashMap<u32, u8> {
        match self {
            Self::Default => PersistentHashMap::blank(),
            Self::Pool(pool) => PersistentHashMap::blank_with(&KeyHasher::new(move |key: &u32| key % pool)),
            Self::Clustered => PersistentHashMap::blank_with(&KeyHasher::new(|key: &u32| (key % 64) << 26)),
        }
    }
}

fn arbitrary_hashing() -> impl Strategy<Value = Hashing> {
    prop_oneof![
        Just(Hashing::Default),
        (1u32..40).prop_map(Hashing::Pool),
        Just(Hashing::Clustered),
    ]
}

fn arbitrary_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..KEY_SPACE, 0u8..4).prop_map(|(key, value)| Operation::Assoc(key, value)),
        1 => (0..KEY_SPACE).prop_map(Operation::Dissoc),
    ]
}

fn arbitrary_operations(max: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(arbitrary_operation(), 0..max)
}

fn apply(map: &PersistentHashMap<u32, u8>, operations: &[Operation]) -> PersistentHashMap<u32, u8> {
    operations.iter().fold(map.clone(), |map, operation| match *operation {
        Operation::Assoc(key, value) => map.assoc(key, value),
        Operation::Dissoc(key) => map.dissoc(&key),
    })
}

fn apply_reference(map: &HashMap<u32, u8>, operations: &[Operation]) -> HashMap<u32, u8> {
    let mut map = map.clone();
    for operation in operations {
        match *operation {
            Operation::Assoc(key, value) => {
                map.insert(key, value);
            }
            Operation::Dissoc(key) => {
                map.remove(&key);
            }
        }
    }
    map
}

fn reference_difference(left: &HashMap<u32, u8>, right: &HashMap<u32, u8>) -> HashMap<u32, u8> {
    left.iter()
        .filter(|(key, value)| right.get(key) != Some(value))
        .map(|(key, value)| (*key, *value))
        .collect()
}

fn reference_intersection(left: &HashMap<u32, u8>, right: &HashMap<u32, u8>) -> HashMap<u32, u8> {
    left.iter()
        .filter(|(key, value)| right.get(key) == Some(value))
        .map(|(key, value)| (*key, *value))
        .collect()
}

fn assert_similar(
    map: &PersistentHashMap<u32, u8>,
    reference: &HashMap<u32, u8>,
) -> Result<(), TestCaseError> {
    for key in 0..KEY_SPACE {
        prop_assert_eq!(map.get(&key), reference.get(&key), "key {}", key);
    }
    prop_assert_eq!(map.len(), reference.len());
    Ok(())
}

// =============================================================================
// Differential build: assoc/dissoc sequences match HashMap
// =============================================================================

proptest! {
    #[test]
    fn prop_build_matches_reference(
        hashing in arbitrary_hashing(),
        operations in arbitrary_operations(300)
    ) {
        let map = apply(&hashing.blank(), &operations);
        let reference = apply_reference(&HashMap::new(), &operations);
        assert_similar(&map, &reference)?;
    }
}

// =============================================================================
// Iteration yields exactly the reference entries
// =============================================================================

proptest! {
    #[test]
    fn prop_iter_matches_reference(
        hashing in arbitrary_hashing(),
        operations in arbitrary_operations(300)
    ) {
        let map = apply(&hashing.blank(), &operations);
        let reference = apply_reference(&HashMap::new(), &operations);

        let mut entries: Vec<(u32, u8)> = map.iter().map(|(key, value)| (*key, *value)).collect();
        let mut expected: Vec<(u32, u8)> = reference.into_iter().collect();
        entries.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(map.iter().len(), expected.len());
        prop_assert_eq!(entries, expected);
    }
}

// =============================================================================
// difference / intersect / equiv match the reference in both directions
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_bulk_operations_match_reference(
        hashing in arbitrary_hashing(),
        build in arbitrary_operations(200),
        edits in arbitrary_operations(40)
    ) {
        let first = apply(&hashing.blank(), &build);
        let second = apply(&first, &edits);
        let first_reference = apply_reference(&HashMap::new(), &build);
        let second_reference = apply_reference(&first_reference, &edits);

        assert_similar(
            &first.difference(&second).unwrap(),
            &reference_difference(&first_reference, &second_reference),
        )?;
        assert_similar(
            &second.difference(&first).unwrap(),
            &reference_difference(&second_reference, &first_reference),
        )?;
        assert_similar(
            &first.intersect(&second).unwrap(),
            &reference_intersection(&first_reference, &second_reference),
        )?;
        assert_similar(
            &second.intersect(&first).unwrap(),
            &reference_intersection(&second_reference, &first_reference),
        )?;
        prop_assert_eq!(first.equiv(&second), first_reference == second_reference);
        prop_assert_eq!(second.equiv(&first), first_reference == second_reference);
    }
}

// =============================================================================
// Maps built independently compare by content
// =============================================================================

proptest! {
    #[test]
    fn prop_equiv_independent_of_insertion_order(
        hashing in arbitrary_hashing(),
        operations in arbitrary_operations(200)
    ) {
        let blank = hashing.blank();
        let map = apply(&blank, &operations);
        let reference = apply_reference(&HashMap::new(), &operations);

        let mut entries: Vec<(u32, u8)> = reference.into_iter().collect();
        entries.sort_unstable();
        let ascending = entries.iter().fold(blank.clone(), |map, (key, value)| map.assoc(*key, *value));
        let descending = entries.iter().rev().fold(blank, |map, (key, value)| map.assoc(*key, *value));

        prop_assert!(map.equiv(&ascending));
        prop_assert!(ascending.equiv(&descending));
        prop_assert!(map.intersect(&ascending).unwrap().equiv(&map));
        prop_assert!(map.difference(&descending).unwrap().is_empty());
    }
}

// =============================================================================
// No-op identity
// =============================================================================

proptest! {
    #[test]
    fn prop_noop_preserves_identity(
        hashing in arbitrary_hashing(),
        operations in arbitrary_operations(200),
        absent in KEY_SPACE..KEY_SPACE * 2
    ) {
        let map = apply(&hashing.blank(), &operations);

        let present: Vec<(u32, u8)> = map.iter().map(|(key, value)| (*key, *value)).collect();
        for (key, value) in present {
            prop_assert!(map.assoc(key, value).ptr_eq(&map));
        }
        prop_assert!(map.dissoc(&absent).ptr_eq(&map));
    }
}

// =============================================================================
// Removing every key returns the canonical blank map
// =============================================================================

proptest! {
    #[test]
    fn prop_dissoc_all_returns_canonical_blank(
        hashing in arbitrary_hashing(),
        operations in arbitrary_operations(200)
    ) {
        let blank = hashing.blank();
        let map = apply(&blank, &operations);
        let keys: Vec<u32> = map.keys().copied().collect();

        let emptied = keys.iter().fold(map, |map, key| map.dissoc(key));
        prop_assert!(emptied.ptr_eq(&blank));
    }
}
