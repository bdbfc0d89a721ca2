//! Front/rear two-trie dictionary
//!
//! Keys are split in two: the distinguishing prefix lives in a forward
//! `front` double array, the shared remainder in a `rear` double array
//! that spells suffixes in reverse from its root. A front state with a
//! negative `base` is a separator: `-base` names an index-table slot
//! holding the key's value and (through the accept table) the rear
//! state its suffix hangs from. Several separators whose keys share a
//! suffix share one accept entry; the `refer` map is the inverse link,
//! from a rear state back to the separators using it.
//!
//! Inserting through an existing separator runs the four-step
//! rearrangement: detach the separator (R-1), extend the front along
//! the shared part and hang the new key (R-2), re-link the displaced
//! old key beside it (R-3), then garbage-collect rear states the old
//! link no longer holds (R-4).
//!
//! Relocations in either array are reported to observers that patch the
//! index/accept/refer bookkeeping, so the tables never hold a stale
//! state address.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, TrieError};
use crate::fsa::double_array::{DoubleArray, Relocator, ROOT};
use crate::io::archive::{write_words, ArchiveBuf, I32Slab, TwoTrieHeader, HEADER_LEN};
use crate::key::{char_out, Key, TERMINATOR};
use crate::{StateId, Symbol, Value};

/// Initial number of index and accept entries.
const DEFAULT_TABLE_SIZE: usize = 1024;

/// Back-pointer record of one rear state: the accept slot publishing it
/// and the separators currently linked through that slot.
#[derive(Debug, Clone, Default)]
struct ReferRecord {
    accept_index: StateId,
    referers: BTreeSet<StateId>,
}

/// Index table, accept table, and the bookkeeping around them.
///
/// Index entries are `(data, index)` word pairs; accept entries a
/// single rear-state word. Entry 0 of both tables is reserved so a
/// separator's `-base` is never 0.
#[derive(Debug)]
struct LinkTable {
    index: I32Slab,
    accept: I32Slab,
    next_index: StateId,
    next_accept: StateId,
    free_index: VecDeque<StateId>,
    free_accept: VecDeque<StateId>,
    refer: BTreeMap<StateId, ReferRecord>,
    /// Rear position R-3 resumes from; relocation-tracked.
    stand: StateId,
}

impl LinkTable {
    fn new() -> Self {
        LinkTable {
            index: I32Slab::with_len(DEFAULT_TABLE_SIZE * 2),
            accept: I32Slab::with_len(DEFAULT_TABLE_SIZE),
            next_index: 1,
            next_accept: 1,
            free_index: VecDeque::new(),
            free_accept: VecDeque::new(),
            refer: BTreeMap::new(),
            stand: 0,
        }
    }

    fn index_entries(&self) -> StateId {
        (self.index.len() / 2) as StateId
    }

    fn accept_entries(&self) -> StateId {
        self.accept.len() as StateId
    }

    fn index_data(&self, i: StateId) -> Value {
        self.index.get(i as usize * 2)
    }

    fn set_index_data(&mut self, i: StateId, value: Value) {
        self.index.set(i as usize * 2, value);
    }

    fn index_link(&self, i: StateId) -> StateId {
        self.index.get(i as usize * 2 + 1)
    }

    fn set_index_link(&mut self, i: StateId, a: StateId) {
        self.index.set(i as usize * 2 + 1, a);
    }

    fn accept_state(&self, a: StateId) -> StateId {
        self.accept.get(a as usize)
    }

    fn set_accept_state(&mut self, a: StateId, s: StateId) {
        self.accept.set(a as usize, s);
    }

    fn count_referer(&self, s: StateId) -> usize {
        self.refer.get(&s).map_or(0, |r| r.referers.len())
    }

    /// Index slot of separator `s`, allocating one (and tagging `s`)
    /// when it does not have one yet.
    fn find_index_entry(&mut self, front: &mut DoubleArray, s: StateId) -> Result<StateId> {
        if front.base(s) >= 0 {
            let next = self.free_index.pop_front().unwrap_or_else(|| {
                let n = self.next_index;
                self.next_index += 1;
                n
            });
            if next >= self.index_entries() {
                let nsize = (((next * 2) >> 12) + 1) << 12;
                self.index.grow(nsize as usize * 2)?;
            }
            debug_assert_eq!(self.index_link(next), 0);
            front.set_base(s, -next);
        }
        Ok(-front.base(s))
    }

    /// Accept slot of index entry `i`, allocating one when unset.
    fn find_accept_entry(&mut self, i: StateId) -> Result<StateId> {
        if self.index_link(i) == 0 {
            let next = self.free_accept.pop_front().unwrap_or_else(|| {
                let n = self.next_accept;
                self.next_accept += 1;
                n
            });
            if next >= self.accept_entries() {
                let nsize = (((next * 2) >> 12) + 1) << 12;
                self.accept.grow(nsize as usize)?;
            }
            self.set_index_link(i, next);
        }
        Ok(self.index_link(i))
    }

    /// Point separator `s` at rear state `t`, sharing the accept entry
    /// with existing referers of `t` when there are any.
    fn set_link(&mut self, front: &mut DoubleArray, s: StateId, t: StateId) -> Result<StateId> {
        let i = self.find_index_entry(front, s)?;
        let shared = self.refer.get(&t).is_some_and(|r| !r.referers.is_empty());
        if shared {
            let a = self.refer[&t].accept_index;
            self.set_index_link(i, a);
        } else {
            let a = self.find_accept_entry(i)?;
            self.set_accept_state(a, t);
            self.refer.entry(t).or_default().accept_index = a;
        }
        debug_assert!(front.base(s) < 0);
        self.refer.entry(t).or_default().referers.insert(s);
        Ok(i)
    }

    /// Drop the refer record of `s`, recycling its accept slot when no
    /// referer holds it any more.
    fn free_accept_entry(&mut self, s: StateId) {
        if let Some(rec) = self.refer.get(&s) {
            let referers_empty = rec.referers.is_empty();
            let accept_index = rec.accept_index;
            if s > 0
                && referers_empty
                && accept_index > 0
                && accept_index < self.accept_entries()
            {
                self.set_accept_state(accept_index, 0);
                self.free_accept.push_back(accept_index);
            }
            self.refer.remove(&s);
        }
    }
}

/// Patches the link table when front states move.
struct FrontRelocator<'a> {
    links: &'a mut LinkTable,
}

impl Relocator for FrontRelocator<'_> {
    fn relocate(&mut self, s: StateId, t: StateId, base: StateId) {
        // A zero in `index` marks a slot whose value survives without an
        // accept link, so only follow genuinely linked separators.
        if base < 0 {
            let i = -base;
            if i < self.links.index_entries() && self.links.index_link(i) > 0 {
                let a = self.links.index_link(i);
                let r = self.links.accept_state(a);
                if let Some(rec) = self.links.refer.get_mut(&r) {
                    rec.referers.remove(&s);
                    rec.referers.insert(t);
                }
            }
        }
    }
}

/// Patches the link table when rear states move.
struct RearRelocator<'a> {
    links: &'a mut LinkTable,
}

impl Relocator for RearRelocator<'_> {
    fn relocate(&mut self, s: StateId, t: StateId, _base: StateId) {
        if let Some(rec) = self.links.refer.remove(&s) {
            self.links.set_accept_state(rec.accept_index, t);
            self.links.refer.insert(t, rec);
        }
        if self.links.stand == s {
            self.links.stand = t;
        }
    }
}

/// Dictionary on a forward front trie and a reversed rear trie with
/// shared suffixes.
#[derive(Debug)]
pub struct TwoTrie {
    front: DoubleArray,
    rear: DoubleArray,
    links: LinkTable,
    num_keys: usize,
}

impl TwoTrie {
    /// Create an empty dictionary sized for roughly `size` front states.
    pub fn with_capacity(size: usize) -> Self {
        TwoTrie {
            front: DoubleArray::with_capacity(size),
            rear: DoubleArray::with_capacity(size),
            links: LinkTable::new(),
            num_keys: 0,
        }
    }

    /// Borrow a dictionary from an opened archive.
    pub fn from_archive(buf: &ArchiveBuf) -> Result<Self> {
        let header = TwoTrieHeader::decode(buf.header(0)?)?;
        let mut offset = HEADER_LEN;
        let index = buf.slab(offset, header.index_size as usize * 2)?;
        offset += header.index_size as usize * 8;
        let accept = buf.slab(offset, header.accept_size as usize)?;
        offset += header.accept_size as usize * 4;
        let (front, offset) = DoubleArray::from_archive(buf, offset)?;
        let (rear, _) = DoubleArray::from_archive(buf, offset)?;
        log::debug!(
            "two-trie archive: {} index entries, {} accept entries, front {} states, rear {} states",
            header.index_size,
            header.accept_size,
            front.size(),
            rear.size()
        );
        let mut links = LinkTable::new();
        links.index = index;
        links.accept = accept;
        links.next_index = header.index_size;
        links.next_accept = header.accept_size;
        let num_keys = (1..header.index_size)
            .filter(|&i| links.index_data(i) != 0)
            .count();
        Ok(TwoTrie {
            front,
            rear,
            links,
            num_keys,
        })
    }

    /// Write the archive: header, index, accept, front, rear.
    ///
    /// Table sizes compact to the allocation counters, so identical
    /// insert sequences produce byte-identical archives.
    pub fn build<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        let header = TwoTrieHeader {
            index_size: self.links.next_index,
            accept_size: self.links.next_accept,
        };
        w.write_all(&header.encode())?;
        write_words(&mut w, &self.links.index, self.links.next_index as usize * 2)?;
        write_words(&mut w, &self.links.accept, self.links.next_accept as usize)?;
        self.front.save(&mut w)?;
        self.rear.save(&mut w)?;
        w.flush()?;
        log::debug!(
            "wrote two-trie archive: {} index entries, {} accept entries",
            self.links.next_index,
            self.links.next_accept
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

    /// The forward trie.
    pub fn front_trie(&self) -> &DoubleArray {
        &self.front
    }

    /// The reversed suffix trie.
    pub fn rear_trie(&self) -> &DoubleArray {
        &self.rear
    }

    /// True when this instance owns its arrays and accepts inserts.
    pub fn is_owned(&self) -> bool {
        self.front.is_owned()
            && self.rear.is_owned()
            && self.links.index.is_owned()
            && self.links.accept.is_owned()
    }

    fn is_separator(&self, s: StateId) -> bool {
        self.front.base(s) < 0
    }

    /// Rear state a separator's suffix hangs from, 0 when unlinked.
    fn link_state(&self, s: StateId) -> StateId {
        let i = -self.front.base(s);
        if i <= 0 || i >= self.links.index_entries() {
            return 0;
        }
        let a = self.links.index_link(i);
        if a <= 0 || a >= self.links.accept_entries() {
            return 0;
        }
        self.links.accept_state(a)
    }

    fn front_create(&mut self, s: StateId, ch: Symbol) -> Result<StateId> {
        self.front
            .create_transition(s, ch, &mut FrontRelocator { links: &mut self.links })
    }

    fn rear_create(&mut self, s: StateId, ch: Symbol) -> Result<StateId> {
        self.rear
            .create_transition(s, ch, &mut RearRelocator { links: &mut self.links })
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
        let (s, miss) = self.front.go_forward(ROOT, syms);
        let Some(p) = miss else {
            // The key's own terminator arc exists: already stored.
            return Ok(());
        };
        if !self.is_separator(s) {
            let i = self.lhs_insert(s, &syms[p..])?;
            self.links.set_index_data(i, value);
            self.num_keys += 1;
            return Ok(());
        }

        // Walk the old key's suffix backwards through the rear until the
        // two keys part ways.
        let rem = &syms[p..];
        let mut r = self.link_state(s);
        debug_assert!(r > 0, "separator without a live link");
        if self.rear.check_reverse_transition(r, TERMINATOR) && self.rear.prev(r) != ROOT {
            // The accept hangs under an end marker; the suffix itself
            // continues from the marker's parent.
            r = self.rear.prev(r);
        }
        let mut matched = Vec::new();
        let mut i = 0;
        loop {
            let ch = rem[i];
            if ch != TERMINATOR && self.rear.check_reverse_transition(r, ch) {
                matched.push(ch);
                r = self.rear.prev(r);
                i += 1;
                continue;
            }
            let old_ch = r - self.rear.base(self.rear.prev(r));
            if ch == TERMINATOR && old_ch == TERMINATOR {
                // Both keys end here: duplicate.
                return Ok(());
            }
            self.rhs_insert(s, r, &matched, &rem[i..], old_ch, value)?;
            self.num_keys += 1;
            return Ok(());
        }
    }

    /// Hang a brand-new key below non-separator `s`: one front
    /// transition, the rest of the remainder in the rear.
    fn lhs_insert(&mut self, s: StateId, rem: &[Symbol]) -> Result<StateId> {
        let t = self.front_create(s, rem[0])?;
        let suffix: Vec<Symbol> = if rem.len() > 1 {
            rem[1..rem.len() - 1].to_vec()
        } else {
            Vec::new()
        };
        let target = self.rhs_append(&suffix)?;
        self.links.set_link(&mut self.front, t, target)
    }

    /// Build or reuse the rear path spelling `suffix` (real symbols
    /// only) in reverse, and return the accept state for it.
    fn rhs_append(&mut self, suffix: &[Symbol]) -> Result<StateId> {
        let mut s = ROOT;
        let mut from = suffix.len();
        let t = self.rear.next(ROOT, TERMINATOR);
        if self.rear.check_transition(ROOT, t) {
            let (reached, miss) = self.rear.go_forward_reverse(t, suffix);
            match miss {
                None => {
                    // The whole suffix is already spelled out.
                    let tt = self.rear.next(reached, TERMINATOR);
                    if self.rear.out_degree(reached) == 0 {
                        return Ok(reached);
                    } else if self.rear.check_transition(reached, tt) {
                        return Ok(tt);
                    }
                    return self.rear_create(reached, TERMINATOR);
                }
                Some(at) => {
                    s = reached;
                    from = at + 1;
                }
            }
        }
        if self.rear.out_degree(s) == 0 {
            // Branching off a pure leaf: its keys now end under an
            // explicit marker, so re-link every referer first.
            let t = self.rear_create(s, TERMINATOR)?;
            let referers: Vec<StateId> = self
                .links
                .refer
                .get(&s)
                .map(|r| r.referers.iter().copied().collect())
                .unwrap_or_default();
            for rs in referers {
                self.links.set_link(&mut self.front, rs, t)?;
            }
            self.links.free_accept_entry(s);
        }
        if s == ROOT {
            from = suffix.len();
            let t = self.rear.next(ROOT, TERMINATOR);
            s = if self.rear.check_transition(ROOT, t) {
                t
            } else {
                self.rear_create(ROOT, TERMINATOR)?
            };
        }
        for at in (0..from).rev() {
            s = self.rear_create(s, suffix[at])?;
        }
        Ok(s)
    }

    /// The R-1…R-4 rearrangement: split separator `s` whose old suffix
    /// parts from the new remainder `rem` at rear state `r`.
    ///
    /// `matched` holds the shared symbols already walked, `old_ch` the
    /// label of the arc into `r` (the old key's next symbol, or the
    /// terminator when the old key ends at the divergence).
    fn rhs_insert(
        &mut self,
        s: StateId,
        r: StateId,
        matched: &[Symbol],
        rem: &[Symbol],
        old_ch: Symbol,
        value: Value,
    ) -> Result<()> {
        // R-1: detach the separator.
        let islot = -self.front.base(s);
        let u = self.link_state(s);
        let old_value = self.links.index_data(islot);
        self.links.set_index_link(islot, 0);
        self.links.set_index_data(islot, 0);
        self.links.free_index.push_back(islot);
        self.front.set_base(s, 0);
        self.links.stand = r;
        if u > 0 {
            if let Some(rec) = self.links.refer.get_mut(&u) {
                rec.referers.remove(&s);
                if rec.referers.is_empty() {
                    self.links.free_accept_entry(u);
                }
            }
        }

        // R-2: push the shared symbols into the front, then hang the new
        // key off the first divergent one.
        let mut s = s;
        for &ch in matched {
            s = self.front_create(s, ch)?;
        }
        let t = self.front_create(s, rem[0])?;
        // The parent may have been carried along by a relocation inside
        // the call; its current address is the new arc's check.
        s = self.front.prev(t);
        let suffix: Vec<Symbol> = if rem.len() > 1 {
            rem[1..rem.len() - 1].to_vec()
        } else {
            Vec::new()
        };
        let target = self.rhs_append(&suffix)?;
        let i = self.links.set_link(&mut self.front, t, target)?;
        self.links.set_index_data(i, value);

        // R-3: re-link the displaced old key as a sibling, ending at a
        // terminator child of the divergence point's parent.
        let t = self.front_create(s, old_ch)?;
        let v = self.rear.prev(self.links.stand);
        let tt = self.rear.next(v, TERMINATOR);
        let rr = if self.rear.check_transition(v, tt) {
            tt
        } else {
            self.rear_create(v, TERMINATOR)?
        };
        let i = self.links.set_link(&mut self.front, t, rr)?;
        self.links.set_index_data(i, old_value);

        // R-4: collect whatever the detached link no longer holds.
        if u > 0 && !self.rhs_clean_one(u) {
            self.rhs_clean_more(u)?;
        }
        Ok(())
    }

    /// Remove `t` when it is an unreferenced end marker.
    fn rhs_clean_one(&mut self, t: StateId) -> bool {
        let s = self.rear.prev(t);
        if s > 0
            && s < self.rear.size()
            && t == self.rear.next(s, TERMINATOR)
            && self.links.count_referer(t) == 0
        {
            self.remove_accept_state(t);
            return true;
        }
        false
    }

    /// Climb from `t`, deleting unreferenced leaf chains and collapsing
    /// pass-through states whose only child is their end marker.
    fn rhs_clean_more(&mut self, t: StateId) -> Result<()> {
        debug_assert!(t > 0);
        if self.rear.out_degree(t) == 0 && self.links.count_referer(t) == 0 {
            let s = self.rear.prev(t);
            self.remove_accept_state(t);
            if s > 0 {
                self.rhs_clean_more(s)?;
            }
        } else if self.rear.out_degree(t) == 1 {
            let r = self.rear.next(t, TERMINATOR);
            if self.rear.check_transition(t, r) {
                // Only the marker is left: the parent absorbs the accept
                // role and the marker goes away.
                let referers: Vec<StateId> = self
                    .links
                    .refer
                    .get(&r)
                    .map(|x| x.referers.iter().copied().collect())
                    .unwrap_or_default();
                for s in referers {
                    self.links.set_link(&mut self.front, s, t)?;
                }
                if let Some(rec) = self.links.refer.get(&t) {
                    let a = rec.accept_index;
                    debug_assert!(
                        self.links.accept_state(a) == r || self.links.accept_state(a) == t,
                        "accept entry strayed during collapse"
                    );
                    self.links.set_accept_state(a, t);
                }
                self.remove_accept_state(r);
            }
        }
        Ok(())
    }

    fn remove_accept_state(&mut self, s: StateId) {
        debug_assert!(s > 0);
        self.rear.set_base(s, 0);
        self.rear.set_check(s, 0);
        self.links.free_accept_entry(s);
    }

    /// Look up `key` and return its stored value.
    pub fn search(&self, key: &Key) -> Option<Value> {
        let syms = key.symbols();
        let (s, miss) = self.front.go_forward(ROOT, syms);
        let Some(p) = miss else {
            return self.separator_value(s);
        };
        if !self.is_separator(s) {
            return None;
        }
        let islot = -self.front.base(s);
        if islot >= self.links.index_entries() {
            return None;
        }
        let rem = &syms[p..];
        let mut r = self.link_state(s);
        if r <= 0 || r >= self.rear.size() {
            return None;
        }
        if self.rear.check_reverse_transition(r, TERMINATOR) && self.rear.prev(r) != ROOT {
            r = self.rear.prev(r);
        }
        let (r, miss) = self.rear.go_backward(r, &rem[..rem.len() - 1]);
        if miss.is_some() {
            return None;
        }
        // The surviving path must be exactly the suffix: one terminator
        // arc away from the rear root.
        if self.rear.prev(r) == ROOT && self.rear.check_reverse_transition(r, TERMINATOR) {
            Some(self.links.index_data(islot))
        } else {
            None
        }
    }

    fn separator_value(&self, s: StateId) -> Option<Value> {
        if !self.is_separator(s) {
            return None;
        }
        let i = -self.front.base(s);
        if i >= self.links.index_entries() {
            return None;
        }
        Some(self.links.index_data(i))
    }

    /// Collect every `(key, value)` whose key starts with `prefix`,
    /// lexicographically by key bytes.
    pub fn prefix_search(&self, prefix: &Key) -> Vec<(Vec<u8>, Value)> {
        let mut out = Vec::new();
        let syms = &prefix.symbols()[..prefix.len()];
        let (s, miss) = self.front.go_forward(ROOT, syms);
        match miss {
            Some(p) => {
                if !self.is_separator(s) {
                    return out;
                }
                // One candidate: front path plus the separator's suffix.
                let mut key_syms: Vec<Symbol> = syms[..p].to_vec();
                key_syms.extend(self.rear_suffix(s));
                if key_syms.len() >= syms.len() && key_syms[p..syms.len()] == syms[p..] {
                    if let Some(value) = self.separator_value(s) {
                        let bytes: Vec<u8> = key_syms.iter().map(|&c| char_out(c)).collect();
                        out.push((bytes, value));
                    }
                }
            }
            None => {
                let mut key = prefix.clone();
                if self.is_separator(s) {
                    self.emit_separator(s, &mut key, &mut out);
                } else {
                    self.prefix_search_aux(s, &mut key, &mut out);
                }
            }
        }
        out
    }

    /// Depth-first collection below a front state. The terminator child
    /// goes first so shorter keys precede their extensions.
    fn prefix_search_aux(&self, s: StateId, key: &mut Key, out: &mut Vec<(Vec<u8>, Value)>) {
        let t = self.front.next(s, TERMINATOR);
        if self.front.check_transition(s, t) && self.is_separator(t) {
            self.emit_separator(t, key, out);
        }
        for ch in 1..TERMINATOR {
            let t = self.front.next(s, ch);
            if t >= self.front.size() {
                break;
            }
            if !self.front.check_transition(s, t) {
                continue;
            }
            key.push(ch);
            if self.is_separator(t) {
                self.emit_separator(t, key, out);
            } else {
                self.prefix_search_aux(t, key, out);
            }
            key.pop();
        }
    }

    fn emit_separator(&self, s: StateId, key: &Key, out: &mut Vec<(Vec<u8>, Value)>) {
        if let Some(value) = self.separator_value(s) {
            let mut bytes = key.bytes();
            bytes.extend(self.rear_suffix(s).iter().map(|&c| char_out(c)));
            out.push((bytes, value));
        }
    }

    /// Read the suffix of separator `s` by climbing its rear path to
    /// the root's terminator child.
    fn rear_suffix(&self, s: StateId) -> Vec<Symbol> {
        let mut out = Vec::new();
        let mut r = self.link_state(s);
        if r <= 0 || r >= self.rear.size() {
            return out;
        }
        if self.rear.check_reverse_transition(r, TERMINATOR) && self.rear.prev(r) != ROOT {
            r = self.rear.prev(r);
        }
        let mut steps = 0;
        loop {
            let p = self.rear.prev(r);
            if p == ROOT || !self.rear.check_transition(p, r) {
                break;
            }
            out.push(r - self.rear.base(p));
            r = p;
            steps += 1;
            if steps > self.rear.size() {
                break;
            }
        }
        out
    }

    /// Rebuild refer records and free lists by scanning the tables; used
    /// when a borrowed instance is deep-copied into a mutable one.
    fn rebuild_bookkeeping(&mut self) {
        self.links.refer.clear();
        self.links.free_index.clear();
        self.links.free_accept.clear();
        for s in 1..self.front.size() {
            if self.front.check(s) <= 0 || !self.is_separator(s) {
                continue;
            }
            let i = -self.front.base(s);
            if i >= self.links.index_entries() {
                continue;
            }
            let a = self.links.index_link(i);
            if a <= 0 || a >= self.links.accept_entries() {
                continue;
            }
            let r = self.links.accept_state(a);
            let rec = self.links.refer.entry(r).or_default();
            rec.accept_index = a;
            rec.referers.insert(s);
        }
        for i in 1..self.links.next_index {
            if self.links.index_data(i) == 0 && self.links.index_link(i) == 0 {
                self.links.free_index.push_back(i);
            }
        }
        for a in 1..self.links.next_accept {
            if self.links.accept_state(a) == 0 {
                self.links.free_accept.push_back(a);
            }
        }
    }
}

impl crate::fsa::traits::TrieDict for TwoTrie {
    fn insert(&mut self, key: &[u8], value: Value) -> Result<()> {
        TwoTrie::insert(self, &Key::from_bytes(key), value)
    }

    fn search(&self, key: &[u8]) -> Option<Value> {
        TwoTrie::search(self, &Key::from_bytes(key))
    }

    fn prefix_search(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Value)> {
        TwoTrie::prefix_search(self, &Key::from_bytes(prefix))
    }

    fn build(&self, path: &Path) -> Result<()> {
        TwoTrie::build(self, path)
    }

    fn len(&self) -> usize {
        TwoTrie::len(self)
    }

    fn stats(&self) -> crate::fsa::traits::TrieStats {
        crate::fsa::traits::TrieStats {
            num_keys: self.num_keys,
            num_states: (self.front.max_state() + self.rear.max_state()) as usize + 2,
            capacity_states: (self.front.size() + self.rear.size()) as usize,
            memory_usage: (self.front.size() + self.rear.size()) as usize * 8
                + self.links.index.len() * 4
                + self.links.accept.len() * 4,
        }
    }
}

impl Clone for TwoTrie {
    /// Deep copy; the clone always owns its arrays, even when cloned
    /// from a mapped instance, and reconstructs the insert-time
    /// bookkeeping the archive does not carry.
    fn clone(&self) -> Self {
        let mut links = LinkTable::new();
        links.index = self.links.index.to_owned_slab();
        links.accept = self.links.accept.to_owned_slab();
        links.next_index = self.links.next_index;
        links.next_accept = self.links.next_accept;
        let mut this = TwoTrie {
            front: self.front.to_owned_array(),
            rear: self.rear.to_owned_array(),
            links,
            num_keys: self.num_keys,
        };
        this.rebuild_bookkeeping();
        this
    }
}
