//! Integration tests for both dictionary variants
//!
//! Covers the behavioral contract end to end: round trips, prefix
//! retrieval, archive persistence and determinism, and the structural
//! invariant of the double arrays after arbitrary insert sequences.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tempfile::TempDir;

use dartrie::{
    create_trie, open_trie, DoubleArray, Key, TailTrie, TrieDict, TrieKind, TwoTrie, Value,
    CHARSET_SIZE,
};

fn both_kinds() -> Vec<(TrieKind, Box<dyn TrieDict>)> {
    vec![
        (TrieKind::Single, create_trie(TrieKind::Single, 0)),
        (TrieKind::Double, create_trie(TrieKind::Double, 0)),
    ]
}

/// Every allocated cell must be the target of exactly one arc from its
/// recorded parent.
fn assert_array_coherent(da: &DoubleArray) {
    for t in 2..da.size() {
        let parent = da.check(t);
        if parent <= 0 {
            continue;
        }
        let ch = t - da.base(parent);
        assert!(
            (1..=CHARSET_SIZE).contains(&ch),
            "state {} not reachable from its parent {}",
            t,
            parent
        );
        assert_eq!(da.next(parent, ch), t);
    }
}

fn generate_random_keys(count: usize, len: usize, seed: u64) -> Vec<Vec<u8>> {
    // Small xorshift generator; deterministic across runs.
    let mut state = seed | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut keys: Vec<Vec<u8>> = (0..count)
        .map(|_| (0..len).map(|_| (next() >> 24) as u8).collect())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

#[test]
fn test_seed_one_basic_retrieval() {
    for (kind, mut dict) in both_kinds() {
        let words: [&[u8]; 4] = [b"car", b"cat", b"cats", b"dog"];
        for (i, w) in words.iter().enumerate() {
            dict.insert(w, (i + 1) as Value).unwrap();
        }
        for (i, w) in words.iter().enumerate() {
            assert_eq!(dict.search(w), Some((i + 1) as Value), "{:?} in {:?}", w, kind);
        }
        assert_eq!(dict.search(b"ca"), None);
        assert_eq!(
            dict.prefix_search(b"ca"),
            vec![
                (b"car".to_vec(), 1),
                (b"cat".to_vec(), 2),
                (b"cats".to_vec(), 3)
            ],
            "prefix results in {:?}",
            kind
        );
    }
}

#[test]
fn test_seed_two_rearrangement_in_two_trie() {
    let mut dict = TwoTrie::with_capacity(0);
    let words: [&[u8]; 4] = [b"bachelor", b"jar", b"badge", b"baby"];
    for (i, w) in words.iter().enumerate() {
        dict.insert(&Key::from_bytes(w), (i + 1) as Value).unwrap();
    }
    for (i, w) in words.iter().enumerate() {
        assert_eq!(dict.search(&Key::from_bytes(w)), Some((i + 1) as Value));
    }
    assert_array_coherent(dict.front_trie());
    assert_array_coherent(dict.rear_trie());
}

#[test]
fn test_seed_three_tail_split() {
    let mut dict = TailTrie::with_capacity(0);
    dict.insert(&Key::from_bytes(b"the"), 1).unwrap();
    dict.insert(&Key::from_bytes(b"then"), 2).unwrap();
    assert_eq!(dict.search(&Key::from_bytes(b"the")), Some(1));
    assert_eq!(dict.search(&Key::from_bytes(b"then")), Some(2));
    assert_array_coherent(dict.trie());
}

#[test]
fn test_seed_four_random_keys_state_bound() {
    let keys = generate_random_keys(20_000, 8, 0x5eed);
    let bound = (10 * keys.len()) as i32;

    let mut single = TailTrie::with_capacity(0);
    for (i, k) in keys.iter().enumerate() {
        single.insert(&Key::from_bytes(k), (i + 1) as Value).unwrap();
    }
    assert!(
        single.trie().max_state() <= bound,
        "single-trie max_state {} over bound {}",
        single.trie().max_state(),
        bound
    );

    let mut double = TwoTrie::with_capacity(0);
    for (i, k) in keys.iter().enumerate() {
        double.insert(&Key::from_bytes(k), (i + 1) as Value).unwrap();
    }
    assert!(double.front_trie().max_state() <= bound);
    assert!(double.rear_trie().max_state() <= bound);

    for (i, k) in keys.iter().enumerate() {
        let want = Some((i + 1) as Value);
        assert_eq!(single.search(&Key::from_bytes(k)), want);
        assert_eq!(double.search(&Key::from_bytes(k)), want, "key {:?}", k);
    }
}

#[test]
fn test_seed_five_archive_round_trip() {
    let dir = TempDir::new().unwrap();
    for (kind, mut dict) in both_kinds() {
        let path = dir.path().join(format!("{:?}.trie", kind));
        dict.insert(b"a", 1).unwrap();
        dict.build(&path).unwrap();

        let reopened = open_trie(&path).unwrap();
        assert_eq!(reopened.search(b"a"), Some(1));
        assert_eq!(reopened.search(b"b"), None);
        assert_eq!(reopened.len(), 1);
    }
}

#[test]
fn test_seed_six_empty_prefix_is_lexicographic() {
    for (kind, mut dict) in both_kinds() {
        dict.insert(b"ab", 1).unwrap();
        dict.insert(b"abc", 2).unwrap();
        assert_eq!(
            dict.prefix_search(b""),
            vec![(b"ab".to_vec(), 1), (b"abc".to_vec(), 2)],
            "order in {:?}",
            kind
        );
    }
}

#[test]
fn test_mapped_instance_rejects_insert() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frozen.trie");
    let mut dict = create_trie(TrieKind::Double, 0);
    dict.insert(b"fixed", 1).unwrap();
    dict.build(&path).unwrap();

    let mut reopened = open_trie(&path).unwrap();
    let err = reopened.insert(b"more", 2).unwrap_err();
    assert_eq!(err.category(), "invalid");
    assert_eq!(reopened.search(b"fixed"), Some(1));
}

#[test]
fn test_wrong_magic_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.trie");
    std::fs::write(&path, vec![0xABu8; 256]).unwrap();
    let err = open_trie(&path).unwrap_err();
    assert_eq!(err.category(), "archive");

    let missing = open_trie(dir.path().join("absent.trie")).unwrap_err();
    assert_eq!(missing.category(), "archive");
}

#[test]
fn test_truncated_archive_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.trie");
    let mut dict = create_trie(TrieKind::Single, 0);
    dict.insert(b"whole", 1).unwrap();
    dict.build(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(open_trie(&path).is_err());
}

#[test]
fn test_archive_determinism() {
    // P6: same insert order, byte-identical archives.
    let dir = TempDir::new().unwrap();
    let keys = generate_random_keys(500, 6, 42);
    for kind in [TrieKind::Single, TrieKind::Double] {
        let mut paths = Vec::new();
        for run in 0..2 {
            let mut dict = create_trie(kind, 0);
            for (i, k) in keys.iter().enumerate() {
                dict.insert(k, (i + 1) as Value).unwrap();
            }
            let path = dir.path().join(format!("{:?}-{}.trie", kind, run));
            dict.build(&path).unwrap();
            paths.push(path);
        }
        let a = std::fs::read(&paths[0]).unwrap();
        let b = std::fs::read(&paths[1]).unwrap();
        assert_eq!(a, b, "{:?} archives differ between identical builds", kind);
    }
}

#[test]
fn test_reopened_archive_answers_like_original() {
    // P3 on a fixed mid-size key set.
    let dir = TempDir::new().unwrap();
    let keys = generate_random_keys(2_000, 7, 7);
    for kind in [TrieKind::Single, TrieKind::Double] {
        let mut dict = create_trie(kind, 0);
        for (i, k) in keys.iter().enumerate() {
            dict.insert(k, (i + 1) as Value).unwrap();
        }
        let path = dir.path().join(format!("{:?}-p3.trie", kind));
        dict.build(&path).unwrap();
        let reopened = open_trie(&path).unwrap();

        for k in &keys {
            assert_eq!(reopened.search(k), dict.search(k));
        }
        let probe = &keys[keys.len() / 2];
        assert_eq!(reopened.prefix_search(&probe[..2]), dict.prefix_search(&probe[..2]));
        assert_eq!(reopened.prefix_search(b""), dict.prefix_search(b""));
    }
}

fn key_set_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..10), 1..40)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // P1: whatever was inserted comes back with its value; everything
    // else misses.
    #[test]
    fn prop_round_trip(keys in key_set_strategy()) {
        for kind in [TrieKind::Single, TrieKind::Double] {
            let mut dict = create_trie(kind, 0);
            for (i, k) in keys.iter().enumerate() {
                dict.insert(k, (i + 1) as Value).unwrap();
            }
            prop_assert_eq!(dict.len(), keys.len());
            for (i, k) in keys.iter().enumerate() {
                prop_assert_eq!(dict.search(k), Some((i + 1) as Value));
            }
            for k in &keys {
                let mut longer = k.clone();
                longer.push(0xFF);
                if !keys.contains(&longer) {
                    prop_assert_eq!(dict.search(&longer), None);
                }
                let shorter = &k[..k.len() - 1];
                if !shorter.is_empty() && !keys.iter().any(|x| x.as_slice() == shorter) {
                    prop_assert_eq!(dict.search(shorter), None);
                }
            }
        }
    }

    // P2: prefix search returns exactly the matching subset, in key
    // order.
    #[test]
    fn prop_prefix_search(keys in key_set_strategy(), plen in 0usize..3) {
        let model: BTreeMap<Vec<u8>, Value> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), (i + 1) as Value))
            .collect();
        let prefix: Vec<u8> = keys[0].iter().copied().take(plen).collect();
        let expect: Vec<(Vec<u8>, Value)> = model
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, &v)| (k.clone(), v))
            .collect();
        for kind in [TrieKind::Single, TrieKind::Double] {
            let mut dict = create_trie(kind, 0);
            for (k, &v) in &model {
                dict.insert(k, v).unwrap();
            }
            prop_assert_eq!(dict.prefix_search(&prefix), expect.clone());
        }
    }

    // P4: the double arrays stay coherent whatever the insert order.
    #[test]
    fn prop_array_coherence(keys in key_set_strategy()) {
        let mut single = TailTrie::with_capacity(0);
        let mut double = TwoTrie::with_capacity(0);
        for (i, k) in keys.iter().enumerate() {
            single.insert(&Key::from_bytes(k), (i + 1) as Value).unwrap();
            double.insert(&Key::from_bytes(k), (i + 1) as Value).unwrap();
        }
        assert_array_coherent(single.trie());
        assert_array_coherent(double.front_trie());
        assert_array_coherent(double.rear_trie());
    }

    // P3: archives answer like the in-memory original.
    #[test]
    fn prop_persistence(keys in key_set_strategy()) {
        let dir = TempDir::new().unwrap();
        for kind in [TrieKind::Single, TrieKind::Double] {
            let mut dict = create_trie(kind, 0);
            for (i, k) in keys.iter().enumerate() {
                dict.insert(k, (i + 1) as Value).unwrap();
            }
            let path = dir.path().join(format!("{:?}.trie", kind));
            dict.build(&path).unwrap();
            let reopened = open_trie(&path).unwrap();
            for k in &keys {
                prop_assert_eq!(reopened.search(k), dict.search(k));
            }
            prop_assert_eq!(reopened.prefix_search(b""), dict.prefix_search(b""));
        }
    }
}
