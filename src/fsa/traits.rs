//! Dictionary façade and statistics
//!
//! [`TrieDict`] is the object-safe surface shared by both variants, so
//! callers can pick a structure at run time through the factory without
//! caring which one they got.

use std::io::BufRead;
use std::path::Path;

use crate::error::{Result, TrieError};
use crate::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which trie structure to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrieKind {
    /// Single double array with a tail pool.
    Single,
    /// Front/rear pair with shared suffixes.
    Double,
}

/// Size and memory figures of a dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrieStats {
    /// Number of stored keys.
    pub num_keys: usize,
    /// States actually in use across all arrays.
    pub num_states: usize,
    /// Allocated state capacity across all arrays.
    pub capacity_states: usize,
    /// Bytes held by the structure's arrays.
    pub memory_usage: usize,
}

/// Common dictionary operations of both trie variants.
pub trait TrieDict: std::fmt::Debug {
    /// Store `value` (non-zero) under `key`. Inserting an existing key
    /// is a no-op that keeps the stored value.
    fn insert(&mut self, key: &[u8], value: Value) -> Result<()>;

    /// Value stored under `key`, if any.
    fn search(&self, key: &[u8]) -> Option<Value>;

    /// All `(key, value)` pairs whose key starts with `prefix`, in
    /// lexicographic key order.
    fn prefix_search(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Value)>;

    /// Write the dictionary to an archive file.
    fn build(&self, path: &Path) -> Result<()>;

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Size and memory figures.
    fn stats(&self) -> TrieStats;

    /// True when `key` is stored.
    fn contains(&self, key: &[u8]) -> bool {
        self.search(key).is_some()
    }

    /// True when nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bulk-load a plain text file: one key per line, the 1-based line
    /// number as its value. Empty lines keep their number but store
    /// nothing. Returns how many keys were inserted.
    fn read_from_text(&mut self, path: &Path, verbose: bool) -> Result<usize> {
        let file = std::fs::File::open(path).map_err(|e| {
            TrieError::bad_source(format!("cannot open {}: {}", path.display(), e))
        })?;
        let reader = std::io::BufReader::new(file);
        let mut inserted = 0usize;
        for (at, line) in reader.split(b'\n').enumerate() {
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            self.insert(&line, (at + 1) as Value)?;
            inserted += 1;
            if verbose && inserted % 100_000 == 0 {
                log::info!("loaded {} keys from {}", inserted, path.display());
            }
        }
        if verbose {
            log::info!("loaded {} keys from {}", inserted, path.display());
        }
        Ok(inserted)
    }
}
