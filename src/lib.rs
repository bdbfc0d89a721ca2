//! # dartrie: double-array trie dictionaries
//!
//! A static byte-string → integer dictionary on Aoe-style double-array
//! tries, in two flavors:
//!
//! - [`TailTrie`] keeps the branching prefix of the key set in one
//!   double array and every non-branching remainder in a flat suffix
//!   pool.
//! - [`TwoTrie`] keeps key prefixes in a forward trie and merges common
//!   suffixes into a second, reverse-direction trie, sharing them
//!   between keys through an indirection table.
//!
//! Both support insert, exact search, and lexicographic prefix search,
//! and persist to a compact archive that reopens as a read-only,
//! memory-mapped instance (`mmap` feature, on by default).
//!
//! ## Quick start
//!
//! ```rust
//! use dartrie::{create_trie, open_trie, TrieDict, TrieKind};
//!
//! let mut dict = create_trie(TrieKind::Double, 4096);
//! dict.insert(b"cat", 1).unwrap();
//! dict.insert(b"cats", 2).unwrap();
//! assert_eq!(dict.search(b"cat"), Some(1));
//! assert_eq!(dict.search(b"ca"), None);
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let path = dir.path().join("words.trie");
//! dict.build(&path).unwrap();
//! let reopened = open_trie(&path).unwrap();
//! assert_eq!(reopened.search(b"cats"), Some(2));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod fsa;
pub mod io;
pub mod key;

pub use error::{Result, TrieError};
pub use fsa::{create_trie, open_trie, DoubleArray, TailTrie, TrieDict, TrieKind, TrieStats, TwoTrie};
pub use key::{char_in, char_out, Key, CHARSET_SIZE, TERMINATOR};

/// State index into a double array. Signed: state `1` is the root,
/// `0` the null sentinel, and negative `base` values are variant tags.
pub type StateId = i32;

/// Transition symbol: a biased byte in `1..=256` or the terminator.
pub type Symbol = i32;

/// Value stored under a key. Zero is reserved to mean "absent".
pub type Value = i32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_variants() {
        let mut single = create_trie(TrieKind::Single, 0);
        let mut double = create_trie(TrieKind::Double, 0);
        for dict in [&mut single, &mut double] {
            dict.insert(b"alpha", 1).unwrap();
            dict.insert(b"beta", 2).unwrap();
            assert_eq!(dict.search(b"alpha"), Some(1));
            assert_eq!(dict.search(b"beta"), Some(2));
            assert_eq!(dict.search(b"gamma"), None);
            assert!(dict.contains(b"alpha"));
            assert_eq!(dict.len(), 2);
        }
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(std::mem::size_of::<StateId>(), 4);
        assert_eq!(std::mem::size_of::<Symbol>(), 4);
        assert_eq!(std::mem::size_of::<Value>(), 4);
    }
}
