use pretty_assertions::assert_eq;

use super::*;

fn entries(map: &BlotMap<u32, &'static str>) -> Vec<(u32, &'static str)> {
    map.iter().map(|(&k, &v)| (k, v)).collect()
}

#[test]
fn iterates_in_insertion_order() {
    let mut map = BlotMap::new();
    map.insert(3, "c");
    map.insert(1, "a");
    map.insert(2, "b");
    assert_eq!(entries(&map), vec![(3, "c"), (1, "a"), (2, "b")]);
    assert_eq!(map.len(), 3);
}

#[test]
fn overwrite_keeps_slot() {
    let mut map = BlotMap::new();
    map.insert(1, "a");
    map.insert(2, "b");
    assert_eq!(map.insert(1, "z"), Some("a"));
    assert_eq!(entries(&map), vec![(1, "z"), (2, "b")]);
}

#[test]
fn blot_leaves_other_positions_alone() {
    let mut map = BlotMap::new();
    map.insert(1, "a");
    map.insert(2, "b");
    map.insert(3, "c");

    assert!(map.blot(&2));
    assert!(!map.blot(&2));
    assert!(!map.contains_key(&2));
    assert_eq!(map.get(&2), None);
    assert_eq!(map.get(&3), Some(&"c"));
    assert_eq!(entries(&map), vec![(1, "a"), (3, "c")]);
    assert_eq!(map.len(), 2);
}

#[test]
fn reinsert_after_blot_goes_to_the_end() {
    let mut map = BlotMap::new();
    map.insert(1, "a");
    map.insert(2, "b");
    map.blot(&1);
    map.insert(1, "a");
    assert_eq!(entries(&map), vec![(2, "b"), (1, "a")]);
}

#[test]
fn compact_preserves_order() {
    let mut map = BlotMap::new();
    for (k, v) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        map.insert(k, v);
    }
    map.blot(&1);
    map.blot(&3);
    map.compact();
    assert_eq!(entries(&map), vec![(2, "b"), (4, "d")]);
    assert_eq!(map.get(&4), Some(&"d"));
    assert!(map.blot(&2));
    assert_eq!(entries(&map), vec![(4, "d")]);
}

#[test]
fn equality_ignores_tombstones() {
    let mut left = BlotMap::new();
    left.insert(1, "a");
    left.insert(2, "b");
    left.blot(&1);

    let mut right = BlotMap::new();
    right.insert(2, "b");
    assert_eq!(left, right);

    right.insert(5, "e");
    assert_ne!(left, right);

    left.clear();
    assert!(left.is_empty());
    assert_eq!(left, BlotMap::default());
}
