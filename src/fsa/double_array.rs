//! Double-array trie core
//!
//! The primitive state machine both dictionary variants are built on:
//! one flat array of `(base, check)` cell pairs, with the transition
//! function `next(s, ch) = base(s) + ch` and the reverse arc implicit in
//! `check`. State `1` is the root, state `0` the null sentinel, and a
//! negative `base` is an opaque tag owned by the layer above (tail
//! offset or index-slot reference).
//!
//! Cell conflicts are resolved by relocating the smaller sibling set to
//! a fresh base found by a monotonically advancing cursor. Upper layers
//! that keep state addresses in side tables observe every move through
//! a [`Relocator`] passed into the mutating operations, so no back
//! pointer from the core to its owner exists.

use std::io::Write;

use crate::error::Result;
use crate::io::archive::{write_words, ArchiveBuf, DacHeader, I32Slab, HEADER_LEN};
use crate::key::CHARSET_SIZE;
use crate::{StateId, Symbol};

/// The root state of every double array.
pub const ROOT: StateId = 1;

/// Default initial state-array size, matching the growth alignment.
pub const DEFAULT_STATE_SIZE: usize = 4096;

/// Observer of state relocations.
///
/// During [`DoubleArray::create_transition`] the core may move a set of
/// sibling states. For each moved state the observer receives the old
/// address, the new address, and the moved cell's `base` value (already
/// copied to the new address), which is all an indirection table needs
/// to rewrite itself. Observers must not touch the array being
/// relocated.
pub trait Relocator {
    /// Called once per moved state.
    fn relocate(&mut self, s: StateId, t: StateId, base: StateId);
}

/// No-op observer for arrays without side tables.
impl Relocator for () {
    fn relocate(&mut self, _s: StateId, _t: StateId, _base: StateId) {}
}

/// Smallest and largest outgoing symbol of a state, for base searching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extremum {
    /// Smallest symbol seen, 0 when none.
    pub min: Symbol,
    /// Largest symbol seen, 0 when none.
    pub max: Symbol,
}

impl Extremum {
    /// Widen the range to include `ch`.
    #[inline]
    pub fn absorb(&mut self, ch: Symbol) {
        if ch > self.max || self.max == 0 {
            self.max = ch;
        }
        if ch < self.min || self.min == 0 {
            self.min = ch;
        }
    }
}

/// The double-array core: paired `base`/`check` cells plus the
/// relocation cursor and high-water mark.
#[derive(Debug, Clone)]
pub struct DoubleArray {
    /// Interleaved `(base, check)` words, two per state.
    cells: I32Slab,
    /// Relocation cursor; advances, never retreats.
    last_base: StateId,
    /// Highest state ever written, bounds the archive image.
    max_state: StateId,
}

impl DoubleArray {
    /// Create an empty array with room for at least `size` states.
    pub fn with_capacity(size: usize) -> Self {
        let size = size.max(CHARSET_SIZE as usize);
        let aligned = ((size >> 12) + 1) << 12;
        DoubleArray {
            cells: I32Slab::with_len(aligned * 2),
            last_base: 0,
            max_state: ROOT,
        }
    }

    /// Borrow one double-array section from an opened archive.
    ///
    /// Returns the array and the byte offset just past its section.
    pub fn from_archive(buf: &ArchiveBuf, offset: usize) -> Result<(Self, usize)> {
        let header = DacHeader::decode(buf.header(offset)?)?;
        let words = header.size as usize * 2;
        let cells = buf.slab(offset + HEADER_LEN, words)?;
        log::debug!("double-array section: {} states", header.size);
        Ok((
            DoubleArray {
                cells,
                last_base: 0,
                max_state: header.size - 1,
            },
            offset + HEADER_LEN + words * 4,
        ))
    }

    /// Write the header and the used prefix of the state array.
    ///
    /// The persisted size is compacted to `max_state + 1`; unused tail
    /// cells never reach the archive.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        let count = (self.max_state + 1).min(self.size());
        w.write_all(&DacHeader { size: count }.encode())?;
        write_words(w, &self.cells, count as usize * 2)
    }

    /// Deep copy into owning storage.
    pub fn to_owned_array(&self) -> Self {
        DoubleArray {
            cells: self.cells.to_owned_slab(),
            last_base: self.last_base,
            max_state: self.max_state,
        }
    }

    /// True when this array owns its cells and may be mutated.
    pub fn is_owned(&self) -> bool {
        self.cells.is_owned()
    }

    /// Current state-array size in cells.
    #[inline]
    pub fn size(&self) -> StateId {
        (self.cells.len() / 2) as StateId
    }

    /// Highest state written so far.
    pub fn max_state(&self) -> StateId {
        self.max_state
    }

    /// `base` value of state `s`.
    #[inline]
    pub fn base(&self, s: StateId) -> StateId {
        self.cells.get(s as usize * 2)
    }

    /// `check` value of state `s`.
    #[inline]
    pub fn check(&self, s: StateId) -> StateId {
        self.cells.get(s as usize * 2 + 1)
    }

    /// Store a `base` value, tracking the high-water mark.
    pub fn set_base(&mut self, s: StateId, value: StateId) {
        self.cells.set(s as usize * 2, value);
        if s > self.max_state {
            self.max_state = s;
        }
    }

    /// Store a `check` value, tracking the high-water mark.
    pub fn set_check(&mut self, s: StateId, value: StateId) {
        self.cells.set(s as usize * 2 + 1, value);
        if s > self.max_state {
            self.max_state = s;
        }
    }

    /// Target of the arc `s --ch-->`, whether or not it exists.
    #[inline]
    pub fn next(&self, s: StateId, ch: Symbol) -> StateId {
        self.base(s) + ch
    }

    /// Parent of `s` along its unique incoming arc.
    #[inline]
    pub fn prev(&self, s: StateId) -> StateId {
        self.check(s)
    }

    /// True when the arc `s --> t` is allocated.
    #[inline]
    pub fn check_transition(&self, s: StateId, t: StateId) -> bool {
        s > 0 && t > 0 && t < self.size() && self.check(t) == s
    }

    /// True when the arc into `s` is labelled `ch`.
    #[inline]
    pub fn check_reverse_transition(&self, s: StateId, ch: Symbol) -> bool {
        let p = self.prev(s);
        p > 0 && p < self.size() && self.next(p, ch) == s && self.check_transition(p, s)
    }

    /// Follow `symbols` from `s`, stopping at the first missing arc.
    ///
    /// Returns the last reached state and the index of the first
    /// unconsumed symbol, or `None` when everything matched.
    pub fn go_forward(&self, s: StateId, symbols: &[Symbol]) -> (StateId, Option<usize>) {
        let mut s = s;
        for (i, &ch) in symbols.iter().enumerate() {
            let t = self.next(s, ch);
            if !self.check_transition(s, t) {
                return (s, Some(i));
            }
            s = t;
        }
        (s, None)
    }

    /// Like [`go_forward`](Self::go_forward) but consuming `symbols`
    /// from right to left; used to descend the rear trie, which spells
    /// suffixes reversed.
    pub fn go_forward_reverse(&self, s: StateId, symbols: &[Symbol]) -> (StateId, Option<usize>) {
        let mut s = s;
        for i in (0..symbols.len()).rev() {
            let t = self.next(s, symbols[i]);
            if !self.check_transition(s, t) {
                return (s, Some(i));
            }
            s = t;
        }
        (s, None)
    }

    /// Climb parent arcs from `s`, requiring the arc into each visited
    /// state to spell `symbols` in order.
    pub fn go_backward(&self, s: StateId, symbols: &[Symbol]) -> (StateId, Option<usize>) {
        let mut s = s;
        for (i, &ch) in symbols.iter().enumerate() {
            if !self.check_reverse_transition(s, ch) {
                return (s, Some(i));
            }
            s = self.prev(s);
        }
        (s, None)
    }

    /// All outgoing symbols of `s` in ascending order, with their range.
    pub fn find_exist_targets(&self, s: StateId) -> (Vec<Symbol>, Extremum) {
        let mut targets = Vec::new();
        let mut ext = Extremum::default();
        for ch in 1..=CHARSET_SIZE {
            let t = self.next(s, ch);
            if t >= self.size() {
                break;
            }
            if self.check_transition(s, t) {
                targets.push(ch);
                ext.absorb(ch);
            }
        }
        (targets, ext)
    }

    /// Number of outgoing arcs of `s`.
    pub fn out_degree(&self, s: StateId) -> usize {
        self.find_exist_targets(s).0.len()
    }

    /// Grow the state array, 4 KiB-aligned, zero-filling the tail.
    fn resize_state(&mut self, add: StateId) -> Result<()> {
        let nsize = (((self.size() * 2 + add) >> 12) + 1) << 12;
        self.cells.grow(nsize as usize * 2)
    }

    /// Find a base from which every symbol in `targets` lands on a free
    /// cell. The cursor only moves forward across calls.
    fn find_base(&mut self, targets: &[Symbol], ext: Extremum) -> Result<StateId> {
        let mut i = self.last_base;
        loop {
            i += 1;
            if i + ext.max >= self.size() {
                self.resize_state(ext.max)?;
            }
            if self.check(i + ext.min) <= 0
                && self.check(i + ext.max) <= 0
                && targets.iter().all(|&ch| self.check(i + ch) <= 0)
            {
                break;
            }
        }
        self.last_base = i;
        Ok(i)
    }

    /// Move the listed children of `s` to a fresh base.
    ///
    /// `stand` is an address the caller wants tracked across the move;
    /// the updated value is returned. Each moved child is reported to
    /// `obs` before its old cell is cleared.
    fn relocate(
        &mut self,
        mut stand: StateId,
        s: StateId,
        targets: &[Symbol],
        ext: Extremum,
        obs: &mut dyn Relocator,
    ) -> Result<StateId> {
        let obase = self.base(s);
        let nbase = self.find_base(targets, ext)?;
        for &ch in targets {
            let old_t = obase + ch;
            if self.check(old_t) != s {
                continue;
            }
            let new_t = nbase + ch;
            self.set_base(new_t, self.base(old_t));
            self.set_check(new_t, s);
            let (grand, _) = self.find_exist_targets(old_t);
            let gbase = self.base(old_t);
            for &g in &grand {
                self.set_check(gbase + g, new_t);
            }
            if stand == old_t {
                stand = new_t;
            }
            obs.relocate(old_t, new_t, self.base(old_t));
            self.set_base(old_t, 0);
            self.set_check(old_t, 0);
        }
        self.set_base(s, nbase);
        Ok(stand)
    }

    /// Ensure the arc `s --ch--> t` exists and return `t`.
    ///
    /// On a cell conflict, either the foreign owner's children or `s`'s
    /// own children (whichever set is smaller) are relocated first.
    pub fn create_transition(
        &mut self,
        s: StateId,
        ch: Symbol,
        obs: &mut dyn Relocator,
    ) -> Result<StateId> {
        debug_assert!((1..=CHARSET_SIZE).contains(&ch));
        let mut s = s;
        let mut t = self.next(s, ch);
        if t >= self.size() {
            self.resize_state(t - self.size() + 1)?;
        }
        if !(self.base(s) > 0 && self.check(t) <= 0) {
            let (mut targets, mut ext) = self.find_exist_targets(s);
            let parent = if t > 0 { self.check(t) } else { 0 };
            if parent > 0 {
                let (parent_targets, parent_ext) = self.find_exist_targets(parent);
                if !parent_targets.is_empty() && targets.len() + 1 > parent_targets.len() {
                    s = self.relocate(s, parent, &parent_targets, parent_ext, obs)?;
                } else {
                    targets.push(ch);
                    ext.absorb(ch);
                    s = self.relocate(s, s, &targets, ext, obs)?;
                }
            } else {
                targets.push(ch);
                ext.absorb(ch);
                s = self.relocate(s, s, &targets, ext, obs)?;
            }
            t = self.next(s, ch);
            if t >= self.size() {
                self.resize_state(t - self.size() + 1)?;
            }
        }
        self.set_check(t, s);
        Ok(t)
    }
}
