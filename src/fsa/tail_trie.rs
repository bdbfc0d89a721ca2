//! Tail-compressed single-trie dictionary
//!
//! One double array holds the branching prefix of the key set; every
//! non-branching remainder lives as a run of symbols in a flat suffix
//! pool. A state with a negative `base` is a tail state: `-base` is the
//! pool offset of the rest of the unique key passing through it, and
//! the associated value sits in the pool word after the remainder's
//! terminator. A tail reached through a terminator arc stores no
//! symbols at all, just the value word.
//!
//! Inserting a key that diverges inside a tail splits it: the shared
//! symbols are promoted to ordinary transitions and both remainders are
//! re-appended to the pool as fresh tails.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, TrieError};
use crate::fsa::double_array::{DoubleArray, ROOT};
use crate::io::archive::{write_words, ArchiveBuf, I32Slab, TailTrieHeader, HEADER_LEN};
use crate::key::{Key, TERMINATOR};
use crate::{StateId, Symbol, Value};

/// Dictionary on a single double array with a suffix pool.
#[derive(Debug)]
pub struct TailTrie {
    trie: DoubleArray,
    suffix: I32Slab,
    /// First free pool word; offset 0 is reserved so a live tail never
    /// has `base == 0`.
    next_suffix: StateId,
    num_keys: usize,
}

impl TailTrie {
    /// Create an empty dictionary sized for roughly `size` states.
    pub fn with_capacity(size: usize) -> Self {
        TailTrie {
            trie: DoubleArray::with_capacity(size),
            suffix: I32Slab::with_len(4096),
            next_suffix: 1,
            num_keys: 0,
        }
    }

    /// Borrow a dictionary from an opened archive.
    pub fn from_archive(buf: &ArchiveBuf) -> Result<Self> {
        let header = TailTrieHeader::decode(buf.header(0)?)?;
        let (trie, offset) = DoubleArray::from_archive(buf, HEADER_LEN)?;
        let suffix = buf.slab(offset, header.suffix_size as usize)?;
        log::debug!(
            "tail-trie archive: {} states, {} pool words",
            trie.size(),
            header.suffix_size
        );
        let mut this = TailTrie {
            trie,
            suffix,
            next_suffix: header.suffix_size,
            num_keys: 0,
        };
        this.num_keys = this.count_keys();
        Ok(this)
    }

    /// Write the archive: header, double array, then the used pool.
    pub fn build<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        let header = TailTrieHeader {
            suffix_size: self.next_suffix,
        };
        w.write_all(&header.encode())?;
        self.trie.save(&mut w)?;
        write_words(&mut w, &self.suffix, self.next_suffix as usize)?;
        w.flush()?;
        log::debug!(
            "wrote tail-trie archive: {} states, {} pool words",
            self.trie.max_state() + 1,
            self.next_suffix
        );
        Ok(())
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.num_keys
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// The underlying double array.
    pub fn trie(&self) -> &DoubleArray {
        &self.trie
    }

    /// True when this instance owns its arrays and accepts inserts.
    pub fn is_owned(&self) -> bool {
        self.trie.is_owned() && self.suffix.is_owned()
    }

    /// Insert `key` with a non-zero `value`. Re-inserting an existing
    /// key leaves the stored value unchanged.
    pub fn insert(&mut self, key: &Key, value: Value) -> Result<()> {
        if value == 0 {
            return Err(TrieError::invalid("value 0 is reserved"));
        }
        if !self.is_owned() {
            return Err(TrieError::invalid("cannot insert into a mapped archive"));
        }
        let syms = key.symbols();
        let (s, miss) = self.trie.go_forward(ROOT, syms);
        let Some(p) = miss else {
            // Whole key, terminator included, is already present.
            return Ok(());
        };
        if self.trie.base(s) < 0 {
            self.create_branch(s, &syms[p..], value)
        } else {
            self.insert_suffix(s, &syms[p..], value)?;
            self.num_keys += 1;
            Ok(())
        }
    }

    /// Look up `key` and return its stored value.
    pub fn search(&self, key: &Key) -> Option<Value> {
        let syms = key.symbols();
        let (s, miss) = self.trie.go_forward(ROOT, syms);
        match miss {
            None => {
                // Terminator arc consumed: the tail holds only the value.
                let off = -self.trie.base(s);
                if off <= 0 || off as usize >= self.suffix.len() {
                    return None;
                }
                Some(self.suffix.get(off as usize))
            }
            Some(p) => {
                let off = -self.trie.base(s);
                if off <= 0 {
                    return None;
                }
                let off = off as usize;
                let rem = &syms[p..];
                if off + rem.len() >= self.suffix.len() {
                    return None;
                }
                for (j, &ch) in rem.iter().enumerate() {
                    if self.suffix.get(off + j) != ch {
                        return None;
                    }
                }
                Some(self.suffix.get(off + rem.len()))
            }
        }
    }

    /// Collect every `(key, value)` whose key starts with `prefix`,
    /// lexicographically by key bytes.
    pub fn prefix_search(&self, prefix: &Key) -> Vec<(Vec<u8>, Value)> {
        let mut out = Vec::new();
        let syms = &prefix.symbols()[..prefix.len()];
        let (s, miss) = self.trie.go_forward(ROOT, syms);
        match miss {
            Some(p) => {
                // The walk died inside a tail: at most one key remains.
                let off = -self.trie.base(s);
                if off <= 0 {
                    return out;
                }
                let off = off as usize;
                let rem = &syms[p..];
                if off + rem.len() >= self.suffix.len() {
                    return out;
                }
                if rem.iter().enumerate().any(|(j, &ch)| self.suffix.get(off + j) != ch) {
                    return out;
                }
                let mut key = Key::from_bytes(&prefix.bytes()[..p]);
                self.emit_tail(off, &mut key, &mut out);
            }
            None => {
                let mut key = prefix.clone();
                if self.trie.base(s) < 0 {
                    self.emit_tail((-self.trie.base(s)) as usize, &mut key, &mut out);
                } else {
                    self.prefix_search_aux(s, &mut key, &mut out);
                }
            }
        }
        out
    }

    /// Depth-first collection below a branching state. The terminator
    /// child goes first so shorter keys precede their extensions.
    fn prefix_search_aux(&self, s: StateId, key: &mut Key, out: &mut Vec<(Vec<u8>, Value)>) {
        let t = self.trie.next(s, TERMINATOR);
        if self.trie.check_transition(s, t) {
            let off = -self.trie.base(t);
            if off > 0 && (off as usize) < self.suffix.len() {
                out.push((key.bytes(), self.suffix.get(off as usize)));
            }
        }
        for ch in 1..TERMINATOR {
            let t = self.trie.next(s, ch);
            if t >= self.trie.size() {
                break;
            }
            if !self.trie.check_transition(s, t) {
                continue;
            }
            key.push(ch);
            if self.trie.base(t) < 0 {
                self.emit_tail((-self.trie.base(t)) as usize, key, out);
            } else {
                self.prefix_search_aux(t, key, out);
            }
            key.pop();
        }
    }

    /// Append the pool remainder at `off` to `key`, emit the pair, and
    /// restore `key`.
    fn emit_tail(&self, off: usize, key: &mut Key, out: &mut Vec<(Vec<u8>, Value)>) {
        let mut j = off;
        let mut pushed = 0;
        while j < self.suffix.len() && self.suffix.get(j) != TERMINATOR {
            key.push(self.suffix.get(j));
            pushed += 1;
            j += 1;
        }
        if j + 1 < self.suffix.len() {
            out.push((key.bytes(), self.suffix.get(j + 1)));
        }
        for _ in 0..pushed {
            key.pop();
        }
    }

    /// Create one transition for the head of `rem` and park the rest in
    /// the pool. `rem` is terminator-terminated and non-empty. Returns
    /// the new tail state.
    fn insert_suffix(&mut self, s: StateId, rem: &[Symbol], value: Value) -> Result<StateId> {
        let t = self.trie.create_transition(s, rem[0], &mut ())?;
        let off = self.pool_append(&rem[1..], value)?;
        self.trie.set_base(t, -off);
        Ok(t)
    }

    /// Split the tail at `s` against the diverging remainder `rem`.
    fn create_branch(&mut self, s: StateId, rem: &[Symbol], value: Value) -> Result<()> {
        let off = (-self.trie.base(s)) as usize;
        // Copy the stored remainder out: the pool only ever grows, but
        // holding symbols locally keeps the split loop simple.
        let mut old = Vec::new();
        let mut j = off;
        while self.suffix.get(j) != TERMINATOR {
            old.push(self.suffix.get(j));
            j += 1;
        }
        old.push(TERMINATOR);
        let old_value = self.suffix.get(j + 1);

        let mut k = 0;
        while old[k] == rem[k] {
            if old[k] == TERMINATOR {
                // Identical remainder: the key is already stored.
                return Ok(());
            }
            k += 1;
        }

        // Promote the shared symbols to real transitions.
        self.trie.set_base(s, 0);
        let mut s = s;
        for &ch in &rem[..k] {
            s = self.trie.create_transition(s, ch, &mut ())?;
        }
        let t = self.insert_suffix(s, &old[k..], old_value)?;
        // Re-hanging the old tail may relocate `s` itself; its current
        // address is the new tail's check.
        let s = self.trie.prev(t);
        self.insert_suffix(s, &rem[k..], value)?;
        self.num_keys += 1;
        Ok(())
    }

    /// Reserve and fill one pool region: `tail` symbols, then the value.
    fn pool_append(&mut self, tail: &[Symbol], value: Value) -> Result<StateId> {
        let need = tail.len() + 1;
        if self.next_suffix as usize + need > self.suffix.len() {
            self.resize_suffix(need as StateId)?;
        }
        let off = self.next_suffix as usize;
        for (j, &ch) in tail.iter().enumerate() {
            self.suffix.set(off + j, ch);
        }
        self.suffix.set(off + tail.len(), value);
        self.next_suffix += need as StateId;
        Ok(off as StateId)
    }

    /// Grow the pool, 4 KiB-aligned like the state array.
    fn resize_suffix(&mut self, add: StateId) -> Result<()> {
        let nsize = (((self.suffix.len() as StateId * 2 + add) >> 12) + 1) << 12;
        self.suffix.grow(nsize as usize)
    }

    /// One tail state exists per key.
    fn count_keys(&self) -> usize {
        (1..self.trie.size())
            .filter(|&s| self.trie.check(s) > 0 && self.trie.base(s) < 0)
            .count()
    }
}

impl crate::fsa::traits::TrieDict for TailTrie {
    fn insert(&mut self, key: &[u8], value: Value) -> Result<()> {
        TailTrie::insert(self, &Key::from_bytes(key), value)
    }

    fn search(&self, key: &[u8]) -> Option<Value> {
        TailTrie::search(self, &Key::from_bytes(key))
    }

    fn prefix_search(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Value)> {
        TailTrie::prefix_search(self, &Key::from_bytes(prefix))
    }

    fn build(&self, path: &Path) -> Result<()> {
        TailTrie::build(self, path)
    }

    fn len(&self) -> usize {
        TailTrie::len(self)
    }

    fn stats(&self) -> crate::fsa::traits::TrieStats {
        crate::fsa::traits::TrieStats {
            num_keys: self.num_keys,
            num_states: self.trie.max_state() as usize + 1,
            capacity_states: self.trie.size() as usize,
            memory_usage: self.trie.size() as usize * 8 + self.suffix.len() * 4,
        }
    }
}

impl Clone for TailTrie {
    /// Deep copy; the clone always owns its arrays, even when cloned
    /// from a mapped instance.
    fn clone(&self) -> Self {
        TailTrie {
            trie: self.trie.to_owned_array(),
            suffix: self.suffix.to_owned_slab(),
            next_suffix: self.next_suffix,
            num_keys: self.num_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bytes: &[u8]) -> Key {
        Key::from_bytes(bytes)
    }

    #[test]
    fn test_single_key() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"hello"), 7).unwrap();
        assert_eq!(trie.search(&key(b"hello")), Some(7));
        assert_eq!(trie.search(&key(b"hell")), None);
        assert_eq!(trie.search(&key(b"hellos")), None);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_tail_split() {
        // "then" diverges inside the tail of "the".
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"the"), 1).unwrap();
        trie.insert(&key(b"then"), 2).unwrap();
        assert_eq!(trie.search(&key(b"the")), Some(1));
        assert_eq!(trie.search(&key(b"then")), Some(2));
        assert_eq!(trie.search(&key(b"th")), None);
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn test_prefix_collides_with_tail() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"then"), 1).unwrap();
        trie.insert(&key(b"the"), 2).unwrap();
        assert_eq!(trie.search(&key(b"then")), Some(1));
        assert_eq!(trie.search(&key(b"the")), Some(2));
    }

    #[test]
    fn test_duplicate_insert_keeps_value() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"dup"), 1).unwrap();
        trie.insert(&key(b"dup"), 9).unwrap();
        assert_eq!(trie.search(&key(b"dup")), Some(1));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_zero_value_rejected() {
        let mut trie = TailTrie::with_capacity(0);
        assert!(trie.insert(&key(b"zero"), 0).is_err());
        assert_eq!(trie.len(), 0);
    }

    #[test]
    fn test_empty_key() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b""), 3).unwrap();
        assert_eq!(trie.search(&key(b"")), Some(3));
        assert_eq!(trie.search(&key(b"a")), None);
    }

    #[test]
    fn test_prefix_search_orders_lexicographically() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"ab"), 1).unwrap();
        trie.insert(&key(b"abc"), 2).unwrap();
        trie.insert(&key(b"aa"), 3).unwrap();
        let hits = trie.prefix_search(&key(b""));
        let keys: Vec<&[u8]> = hits.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"aa".as_slice(), b"ab", b"abc"]);

        let hits = trie.prefix_search(&key(b"ab"));
        assert_eq!(
            hits,
            vec![(b"ab".to_vec(), 1), (b"abc".to_vec(), 2)]
        );
    }

    #[test]
    fn test_prefix_search_inside_tail() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"bachelor"), 5).unwrap();
        let hits = trie.prefix_search(&key(b"bach"));
        assert_eq!(hits, vec![(b"bachelor".to_vec(), 5)]);
        assert!(trie.prefix_search(&key(b"bad")).is_empty());
    }

    #[test]
    fn test_seed_scenario_one() {
        let mut trie = TailTrie::with_capacity(0);
        for (i, k) in [b"car".as_slice(), b"cat", b"cats", b"dog"].iter().enumerate() {
            trie.insert(&key(k), (i + 1) as Value).unwrap();
        }
        assert_eq!(trie.search(&key(b"car")), Some(1));
        assert_eq!(trie.search(&key(b"cat")), Some(2));
        assert_eq!(trie.search(&key(b"cats")), Some(3));
        assert_eq!(trie.search(&key(b"dog")), Some(4));
        assert_eq!(trie.search(&key(b"ca")), None);
        assert_eq!(
            trie.prefix_search(&key(b"ca")),
            vec![
                (b"car".to_vec(), 1),
                (b"cat".to_vec(), 2),
                (b"cats".to_vec(), 3)
            ]
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let mut trie = TailTrie::with_capacity(0);
        trie.insert(&key(b"one"), 1).unwrap();
        let mut copy = trie.clone();
        copy.insert(&key(b"two"), 2).unwrap();
        assert_eq!(trie.search(&key(b"two")), None);
        assert_eq!(copy.search(&key(b"one")), Some(1));
        assert_eq!(copy.search(&key(b"two")), Some(2));
    }
}
