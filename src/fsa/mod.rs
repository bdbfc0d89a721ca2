//! Trie structures and the variant factory
//!
//! The double-array core, the two dictionary variants built on it, and
//! the factory functions that create an empty dictionary or reopen one
//! from an archive (detecting the variant by its magic).

pub mod double_array;
pub mod tail_trie;
pub mod traits;
pub mod two_trie;

pub use double_array::{DoubleArray, Extremum, Relocator, DEFAULT_STATE_SIZE, ROOT};
pub use tail_trie::TailTrie;
pub use traits::{TrieDict, TrieKind, TrieStats};
pub use two_trie::TwoTrie;

use std::path::Path;

use crate::error::{Result, TrieError};
use crate::io::archive::{ArchiveBuf, TAIL_TRIE_MAGIC, TWO_TRIE_MAGIC};

/// Create an empty dictionary of the requested kind.
///
/// `size` is a sizing hint in states, not a limit; both variants grow
/// on demand.
pub fn create_trie(kind: TrieKind, size: usize) -> Box<dyn TrieDict> {
    match kind {
        TrieKind::Single => Box::new(TailTrie::with_capacity(size)),
        TrieKind::Double => Box::new(TwoTrie::with_capacity(size)),
    }
}

/// Reopen a dictionary from an archive file, read-only.
///
/// The variant is detected from the leading magic. The instance borrows
/// the archive bytes; `insert` on it fails.
pub fn open_trie<P: AsRef<Path>>(path: P) -> Result<Box<dyn TrieDict>> {
    let buf = ArchiveBuf::open(path)?;
    let head = buf.header(0)?;
    if head[..16] == TWO_TRIE_MAGIC {
        Ok(Box::new(TwoTrie::from_archive(&buf)?))
    } else if head[..16] == TAIL_TRIE_MAGIC {
        Ok(Box::new(TailTrie::from_archive(&buf)?))
    } else {
        Err(TrieError::bad_archive("unknown archive magic"))
    }
}
