//! Archive I/O
//!
//! Persistence for both trie variants: fixed 64-byte headers, raw
//! little-endian arrays, and shared owned-or-borrowed array storage.

pub mod archive;

pub use archive::{
    ArchiveBuf, DacHeader, I32Slab, TailTrieHeader, TwoTrieHeader, HEADER_LEN, TAIL_TRIE_MAGIC,
    TWO_TRIE_MAGIC,
};
