//! Archive frame and array storage
//!
//! An archive is a sequence of 64-byte headers and raw little-endian
//! `i32` arrays (see the layout notes on the two trie variants). Loading
//! borrows the arrays straight out of the archive bytes; saving streams
//! them back out. [`I32Slab`] is the storage unit shared by every array
//! in the crate: state cells, index and accept tables, and the suffix
//! pool. It is either a heap vector (owning, mutable) or a window into
//! an opened archive (borrowed, read-only).

#[cfg(feature = "mmap")]
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, TrieError};

#[cfg(feature = "mmap")]
use memmap2::Mmap;

/// Archive magic for the front/rear two-trie variant.
pub const TWO_TRIE_MAGIC: [u8; 16] = *b"TWO_TRIE\0\0\0\0\0\0\0\0";

/// Archive magic for the tail-compressed single-trie variant.
pub const TAIL_TRIE_MAGIC: [u8; 16] = *b"TAIL_TRIE\0\0\0\0\0\0\0";

/// Every archive header occupies exactly this many bytes.
pub const HEADER_LEN: usize = 64;

/// Read-only bytes of an opened archive, shared by all borrowed slabs.
#[derive(Debug, Clone)]
pub struct ArchiveBuf {
    inner: ArchiveInner,
}

#[derive(Debug, Clone)]
enum ArchiveInner {
    #[cfg(not(feature = "mmap"))]
    Owned(Arc<Vec<u8>>),
    #[cfg(feature = "mmap")]
    Mapped(Arc<Mmap>),
}

impl ArchiveBuf {
    /// Open an archive file.
    ///
    /// With the `mmap` feature (default) the file is memory-mapped and
    /// never copied; otherwise it is read into memory. Either way the
    /// resulting instance is read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        #[cfg(feature = "mmap")]
        {
            let file = File::open(path).map_err(|e| {
                TrieError::bad_archive(format!("cannot open {}: {}", path.display(), e))
            })?;
            let map = unsafe {
                Mmap::map(&file).map_err(|e| {
                    TrieError::bad_archive(format!("cannot map {}: {}", path.display(), e))
                })?
            };
            log::debug!("mapped archive {} ({} bytes)", path.display(), map.len());
            Ok(ArchiveBuf {
                inner: ArchiveInner::Mapped(Arc::new(map)),
            })
        }
        #[cfg(not(feature = "mmap"))]
        {
            let bytes = std::fs::read(path).map_err(|e| {
                TrieError::bad_archive(format!("cannot read {}: {}", path.display(), e))
            })?;
            log::debug!("read archive {} ({} bytes)", path.display(), bytes.len());
            Ok(ArchiveBuf {
                inner: ArchiveInner::Owned(Arc::new(bytes)),
            })
        }
    }

    /// Full archive contents.
    pub fn bytes(&self) -> &[u8] {
        match &self.inner {
            #[cfg(not(feature = "mmap"))]
            ArchiveInner::Owned(v) => v,
            #[cfg(feature = "mmap")]
            ArchiveInner::Mapped(m) => m,
        }
    }

    /// Borrow `words` little-endian `i32` values starting at `offset` bytes.
    pub fn slab(&self, offset: usize, words: usize) -> Result<I32Slab> {
        let end = offset
            .checked_add(words.checked_mul(4).ok_or_else(|| {
                TrieError::bad_archive("section size overflows")
            })?)
            .ok_or_else(|| TrieError::bad_archive("section offset overflows"))?;
        if end > self.bytes().len() {
            return Err(TrieError::bad_archive(format!(
                "truncated archive: section ends at {} of {} bytes",
                end,
                self.bytes().len()
            )));
        }
        Ok(I32Slab::Borrowed {
            buf: self.clone(),
            offset,
            len: words,
        })
    }

    /// Borrow one 64-byte header starting at `offset`, as a byte slice.
    pub fn header(&self, offset: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(HEADER_LEN)
            .ok_or_else(|| TrieError::bad_archive("header offset overflows"))?;
        if end > self.bytes().len() {
            return Err(TrieError::bad_archive("truncated archive: short header"));
        }
        Ok(&self.bytes()[offset..end])
    }
}

/// An `i32` array that is either heap-owned or borrowed from an archive.
///
/// Borrowed slabs are immutable; callers that mutate must hold an owned
/// slab, which the public trie surface guarantees before any write path
/// is entered.
#[derive(Debug, Clone)]
pub enum I32Slab {
    /// Heap-allocated, growable storage.
    Owned(Vec<i32>),
    /// Read-only window into an opened archive.
    Borrowed {
        /// Shared archive bytes.
        buf: ArchiveBuf,
        /// Byte offset of the first word.
        offset: usize,
        /// Number of words in the window.
        len: usize,
    },
}

impl I32Slab {
    /// Owned zero-filled slab of `len` words.
    pub fn with_len(len: usize) -> Self {
        I32Slab::Owned(vec![0; len])
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        match self {
            I32Slab::Owned(v) => v.len(),
            I32Slab::Borrowed { len, .. } => *len,
        }
    }

    /// True when the slab holds no words.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the slab owns its memory and may be mutated.
    pub fn is_owned(&self) -> bool {
        matches!(self, I32Slab::Owned(_))
    }

    /// Read the word at `i`.
    #[inline]
    pub fn get(&self, i: usize) -> i32 {
        match self {
            I32Slab::Owned(v) => v[i],
            I32Slab::Borrowed { buf, offset, len } => {
                debug_assert!(i < *len);
                let at = offset + i * 4;
                let b = &buf.bytes()[at..at + 4];
                i32::from_le_bytes([b[0], b[1], b[2], b[3]])
            }
        }
    }

    /// Write the word at `i`. Only owned slabs reach this path.
    #[inline]
    pub fn set(&mut self, i: usize, value: i32) {
        match self {
            I32Slab::Owned(v) => v[i] = value,
            I32Slab::Borrowed { .. } => unreachable!("write to a borrowed slab"),
        }
    }

    /// Grow an owned slab to `new_len` words, zero-filling the tail.
    pub fn grow(&mut self, new_len: usize) -> Result<()> {
        match self {
            I32Slab::Owned(v) => {
                if new_len > v.len() {
                    v.try_reserve(new_len - v.len())
                        .map_err(|_| TrieError::out_of_memory(new_len * 4))?;
                    v.resize(new_len, 0);
                }
                Ok(())
            }
            I32Slab::Borrowed { .. } => unreachable!("grow a borrowed slab"),
        }
    }

    /// Copy into freshly owned storage.
    pub fn to_owned_slab(&self) -> I32Slab {
        match self {
            I32Slab::Owned(v) => I32Slab::Owned(v.clone()),
            I32Slab::Borrowed { .. } => {
                I32Slab::Owned((0..self.len()).map(|i| self.get(i)).collect())
            }
        }
    }
}

/// Write the first `count` words of `slab` little-endian.
pub fn write_words<W: Write>(w: &mut W, slab: &I32Slab, count: usize) -> Result<()> {
    debug_assert!(count <= slab.len());
    match slab {
        I32Slab::Owned(v) => {
            for word in &v[..count] {
                w.write_all(&word.to_le_bytes())?;
            }
        }
        I32Slab::Borrowed { buf, offset, .. } => {
            // Already little-endian on disk.
            w.write_all(&buf.bytes()[*offset..*offset + count * 4])?;
        }
    }
    Ok(())
}

/// Fixed 64-byte header of one double-array section: cell count plus
/// reserved padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacHeader {
    /// Number of state cells that follow the header.
    pub size: i32,
}

impl DacHeader {
    /// Encode to the on-disk form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Decode from one header's bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let size = read_i32(bytes, 0);
        if size <= 0 {
            return Err(TrieError::bad_archive(format!(
                "non-positive state array size {}",
                size
            )));
        }
        Ok(DacHeader { size })
    }
}

/// Fixed 64-byte archive header of the two-trie variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoTrieHeader {
    /// Number of index-table entries.
    pub index_size: i32,
    /// Number of accept-table entries.
    pub accept_size: i32,
}

impl TwoTrieHeader {
    /// Encode to the on-disk form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..16].copy_from_slice(&TWO_TRIE_MAGIC);
        out[16..20].copy_from_slice(&self.index_size.to_le_bytes());
        out[20..24].copy_from_slice(&self.accept_size.to_le_bytes());
        out
    }

    /// Decode from one header's bytes, verifying the magic.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes[..16] != TWO_TRIE_MAGIC {
            return Err(TrieError::bad_archive("not a two-trie archive"));
        }
        let index_size = read_i32(bytes, 16);
        let accept_size = read_i32(bytes, 20);
        if index_size <= 0 || accept_size <= 0 {
            return Err(TrieError::bad_archive("non-positive table size"));
        }
        Ok(TwoTrieHeader {
            index_size,
            accept_size,
        })
    }
}

/// Fixed 64-byte archive header of the tail-trie variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailTrieHeader {
    /// Number of suffix-pool words.
    pub suffix_size: i32,
}

impl TailTrieHeader {
    /// Encode to the on-disk form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..16].copy_from_slice(&TAIL_TRIE_MAGIC);
        out[16..20].copy_from_slice(&self.suffix_size.to_le_bytes());
        out
    }

    /// Decode from one header's bytes, verifying the magic.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes[..16] != TAIL_TRIE_MAGIC {
            return Err(TrieError::bad_archive("not a tail-trie archive"));
        }
        let suffix_size = read_i32(bytes, 16);
        if suffix_size <= 0 {
            return Err(TrieError::bad_archive("non-positive suffix pool size"));
        }
        Ok(TailTrieHeader { suffix_size })
    }
}

#[inline]
fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
