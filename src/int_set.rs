//! Dynamic paged bitmap set recentered on the first inserted value.
//!
//! [`IntSet`] stores membership as one bit per value in a growable array of
//! 64-bit pages. The first value ever added becomes the set's origin; every
//! later value is zig-zag encoded relative to that origin, so data clustered
//! anywhere on the number line stays in a handful of low pages.
//!
//! Two sets built independently usually carry different origins and are not
//! bit-compatible. Binary operations between instances therefore rebase one
//! operand's pages into the other's encoded domain before combining; see
//! [`IntSet::union_with_set`] and friends. Rebasing moves most bits with two
//! multi-word shifts and touches only the members lying between the two
//! origins individually, so each set keeps its own centering instead of
//! normalizing into a shared global origin.

use crate::bits::{
    pop_count, shift_words_down, shift_words_up, trailing_zero_count, zigzag_decode, zigzag_encode,
};

const PAGE_BITS: u32 = 6;
const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;
const INITIAL_PAGES: usize = 16;

/// Words selecting even zig-zag indices (deltas at or above the origin).
const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
/// Words selecting odd zig-zag indices (deltas below the origin).
const ODD_BITS: u64 = 0xAAAA_AAAA_AAAA_AAAA;

/// Memory-efficient set of `i32` values optimized for dense or loosely
/// clustered keys, with `HashSet`-equivalent semantics.
///
/// # Examples
/// ```
/// use intset::IntSet;
///
/// let mut set = IntSet::new();
/// assert!(set.add(1000));
/// assert!(!set.add(1000));
/// assert!(set.contains(1000));
/// assert!(set.remove(1000));
/// assert!(set.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct IntSet {
    pages: Vec<u64>,
    page_count: usize,
    count: usize,
    origin: i32,
    initialized: bool,
}

impl IntSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            pages: vec![0; INITIAL_PAGES],
            page_count: 0,
            count: 0,
            origin: 0,
            initialized: false,
        }
    }

    /// Creates a set containing the given values; duplicates collapse.
    pub fn from_values(values: &[i32]) -> Self {
        let mut set = Self::new();
        set.union_with(values);
        set
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` when the set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn key_for(&self, value: i32) -> u32 {
        zigzag_encode(value.wrapping_sub(self.origin))
    }

    #[inline]
    fn ensure_page(&mut self, page: usize) {
        if page >= self.pages.len() {
            let new_len = (self.pages.len() * 2).max(page + 1);
            self.pages.resize(new_len, 0);
        }
    }

    /// Inserts `value`, returning `true` if it was not already present.
    ///
    /// The first insertion into an empty, never-used set fixes the origin the
    /// remaining key space is centered on.
    #[inline]
    pub fn add(&mut self, value: i32) -> bool {
        if !self.initialized {
            self.origin = value;
            self.initialized = true;
        }
        let key = self.key_for(value);
        let page = (key >> PAGE_BITS) as usize;
        let mask = 1u64 << (key & PAGE_MASK);
        self.ensure_page(page);
        let previous = self.pages[page];
        self.pages[page] |= mask;
        if page >= self.page_count {
            self.page_count = page + 1;
        }
        if previous & mask != 0 {
            return false;
        }
        self.count += 1;
        true
    }

    /// Membership test. Never allocates or grows the page array.
    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        let key = self.key_for(value);
        let page = (key >> PAGE_BITS) as usize;
        if page >= self.page_count {
            return false;
        }
        self.pages[page] & (1u64 << (key & PAGE_MASK)) != 0
    }

    /// Removes `value`, returning `true` if it was present.
    #[inline]
    pub fn remove(&mut self, value: i32) -> bool {
        let key = self.key_for(value);
        let page = (key >> PAGE_BITS) as usize;
        if page >= self.page_count {
            return false;
        }
        let mask = 1u64 << (key & PAGE_MASK);
        if self.pages[page] & mask == 0 {
            return false;
        }
        self.pages[page] &= !mask;
        self.count -= 1;
        true
    }

    /// Removes all members and forgets the origin; keeps the allocation.
    pub fn clear(&mut self) {
        for word in &mut self.pages[..self.page_count] {
            *word = 0;
        }
        self.page_count = 0;
        self.count = 0;
        self.origin = 0;
        self.initialized = false;
    }

    /// Adds every value in `values`.
    pub fn union_with(&mut self, values: &[i32]) {
        for &value in values {
            self.add(value);
        }
    }

    /// Removes every value in `values`.
    pub fn except_with(&mut self, values: &[i32]) {
        for &value in values {
            self.remove(value);
        }
    }

    /// Retains only members that also appear in `values`.
    ///
    /// Input values outside the current page range cannot be members and are
    /// dropped without growing the set.
    pub fn intersect_with(&mut self, values: &[i32]) {
        let page_count = self.page_count;
        let mut masks = vec![0u64; page_count];
        for &value in values {
            let key = self.key_for(value);
            let page = (key >> PAGE_BITS) as usize;
            if page >= page_count {
                continue;
            }
            masks[page] |= 1u64 << (key & PAGE_MASK);
        }
        for (page, mask) in masks.iter().enumerate() {
            self.pages[page] &= mask;
        }
        self.recount();
    }

    /// Toggles membership of every distinct value in `values`.
    ///
    /// Duplicate input values collapse into the per-page masks and toggle
    /// once, matching symmetric-difference semantics.
    pub fn symmetric_except_with(&mut self, values: &[i32]) {
        if values.is_empty() {
            return;
        }
        if !self.initialized {
            self.origin = values[0];
            self.initialized = true;
        }
        let mut max_page = self.page_count;
        for &value in values {
            let page = (self.key_for(value) >> PAGE_BITS) as usize;
            max_page = max_page.max(page + 1);
        }
        if max_page > self.pages.len() {
            self.pages.resize(max_page, 0);
        }
        self.page_count = max_page;

        let mut masks = vec![0u64; max_page];
        for &value in values {
            let key = self.key_for(value);
            masks[(key >> PAGE_BITS) as usize] |= 1u64 << (key & PAGE_MASK);
        }
        for (page, &flip) in masks.iter().enumerate() {
            if flip != 0 {
                self.pages[page] ^= flip;
            }
        }
        self.recount();
    }

    /// Adds every member of `other`.
    pub fn union_with_set(&mut self, other: &IntSet) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.copy_from(other);
            return;
        }
        let rebased = self.rebased_pages(other, usize::MAX);
        if rebased.len() > self.pages.len() {
            let new_len = (self.pages.len() * 2).max(rebased.len());
            self.pages.resize(new_len, 0);
        }
        self.page_count = self.page_count.max(rebased.len());
        for (page, &word) in rebased.iter().enumerate() {
            self.pages[page] |= word;
        }
        self.recount();
    }

    /// Retains only members that are also members of `other`.
    pub fn intersect_with_set(&mut self, other: &IntSet) {
        if self.count == 0 {
            return;
        }
        if other.count == 0 {
            self.clear();
            return;
        }
        let rebased = self.rebased_pages(other, self.page_count);
        for page in 0..self.page_count {
            self.pages[page] &= rebased.get(page).copied().unwrap_or(0);
        }
        self.recount();
    }

    /// Removes every member of `other`.
    pub fn except_with_set(&mut self, other: &IntSet) {
        if self.count == 0 || other.count == 0 {
            return;
        }
        let rebased = self.rebased_pages(other, self.page_count);
        let overlap = self.page_count.min(rebased.len());
        for page in 0..overlap {
            self.pages[page] &= !rebased[page];
        }
        self.recount();
    }

    /// Toggles membership of every member of `other`.
    pub fn symmetric_except_with_set(&mut self, other: &IntSet) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.copy_from(other);
            return;
        }
        let rebased = self.rebased_pages(other, usize::MAX);
        if rebased.len() > self.pages.len() {
            let new_len = (self.pages.len() * 2).max(rebased.len());
            self.pages.resize(new_len, 0);
        }
        self.page_count = self.page_count.max(rebased.len());
        for (page, &word) in rebased.iter().enumerate() {
            if word != 0 {
                self.pages[page] ^= word;
            }
        }
        self.recount();
    }

    fn copy_from(&mut self, other: &IntSet) {
        self.pages.clear();
        self.pages.extend_from_slice(&other.pages);
        self.page_count = other.page_count;
        self.count = other.count;
        self.origin = other.origin;
        self.initialized = other.initialized;
    }

    /// Rebuilds `other`'s page array as it would look encoded against
    /// `self`'s origin, keeping only the first `max_pages` words.
    ///
    /// With equal origins this is a plain copy. Otherwise every bit index
    /// moves by a fixed amount *within its parity class*: even indices hold
    /// deltas at or above the origin and odd indices deltas below it, and a
    /// change of origin by `delta` translates each class by `2 * |delta|` in
    /// opposite directions. The two translations are multi-word shifts with
    /// carry. The only indices that cross parity are the members lying
    /// between the two origins (index below `2 * |delta|` on the shrinking
    /// side); those are re-encoded one bit at a time.
    ///
    /// The uniform translation holds only while the shifted indices stay
    /// inside the `u32` key space. Once any could leave it, the re-encoded
    /// deltas wrap `i32` and the class stops translating uniformly, so every
    /// member is re-encoded individually instead.
    fn rebased_pages(&self, other: &IntSet, max_pages: usize) -> Vec<u64> {
        let src = &other.pages[..other.page_count];
        let delta = i64::from(other.origin) - i64::from(self.origin);
        if delta == 0 {
            return src[..src.len().min(max_pages)].to_vec();
        }

        let shift = delta.unsigned_abs() * 2;
        if shift + (src.len() as u64) * 64 > u64::from(u32::MAX) {
            return self.reencoded_pages(other, max_pages);
        }
        let word_off = (shift >> 6) as usize;
        let mut dst = vec![0u64; (src.len() + word_off + 1).min(max_pages)];

        // Deltas keeping their sign relative to the new origin translate
        // uniformly: one parity class moves up, the other down.
        let up_mask = if delta > 0 { EVEN_BITS } else { ODD_BITS };
        let up_words: Vec<u64> = src.iter().map(|&w| w & up_mask).collect();
        let down_words: Vec<u64> = src.iter().map(|&w| w & !up_mask).collect();
        shift_words_up(&up_words, &mut dst, shift);
        shift_words_down(&down_words, &mut dst, shift);

        // Members between the two origins change sign relative to the new
        // origin; their indices sit below `shift` on the down-moving side
        // (dropped by the shift above) and are re-encoded individually.
        let limit_word = word_off;
        let boundary_words = src.len().min(limit_word + 1);
        for (word_idx, &word) in src[..boundary_words].iter().enumerate() {
            let mut bits = word & !up_mask;
            if word_idx == limit_word {
                let rem = (shift & 63) as u32;
                bits &= if rem == 0 { 0 } else { (1u64 << rem) - 1 };
            }
            while bits != 0 {
                let bit = trailing_zero_count(bits);
                bits &= bits.wrapping_sub(1);
                let index = ((word_idx as u64) << PAGE_BITS) | u64::from(bit);
                let member = other.origin.wrapping_add(zigzag_decode(index as u32));
                let key = zigzag_encode(member.wrapping_sub(self.origin));
                let page = (key >> PAGE_BITS) as usize;
                if page < dst.len() {
                    dst[page] |= 1u64 << (key & PAGE_MASK);
                }
            }
        }

        while dst.last() == Some(&0) {
            dst.pop();
        }
        dst
    }

    /// Re-encodes each member of `other` against `self`'s origin with the
    /// same wrapping arithmetic `add` uses, dropping pages at or above
    /// `max_pages`.
    fn reencoded_pages(&self, other: &IntSet, max_pages: usize) -> Vec<u64> {
        let mut dst = Vec::new();
        for member in other {
            let key = zigzag_encode(member.wrapping_sub(self.origin));
            let page = (key >> PAGE_BITS) as usize;
            if page >= max_pages {
                continue;
            }
            if page >= dst.len() {
                dst.resize(page + 1, 0);
            }
            dst[page] |= 1u64 << (key & PAGE_MASK);
        }
        dst
    }

    fn recount(&mut self) {
        let mut count = 0usize;
        for &word in &self.pages[..self.page_count] {
            if word != 0 {
                count += pop_count(word) as usize;
            }
        }
        self.count = count;
    }

    /// Iterates members in increasing internal-storage order (increasing
    /// absolute distance from the origin). Each call starts fresh.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            pages: &self.pages,
            page_count: self.page_count,
            page_idx: 0,
            current: if self.page_count > 0 { self.pages[0] } else { 0 },
            base: 0,
            origin: self.origin,
        }
    }

    /// Materializes the member sequence.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a IntSet {
    type Item = i32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Cursor over an [`IntSet`]'s pages, produced by [`IntSet::iter`].
pub struct Iter<'a> {
    pages: &'a [u64],
    page_count: usize,
    page_idx: usize,
    current: u64,
    base: u32,
    origin: i32,
}

impl<'a> Iterator for Iter<'a> {
    type Item = i32;

    #[inline]
    fn next(&mut self) -> Option<i32> {
        loop {
            if self.current != 0 {
                let bit = trailing_zero_count(self.current);
                self.current &= self.current.wrapping_sub(1);
                let key = self.base | bit;
                return Some(zigzag_decode(key).wrapping_add(self.origin));
            }
            self.page_idx += 1;
            if self.page_idx >= self.page_count {
                return None;
            }
            self.current = self.pages[self.page_idx];
            self.base = (self.page_idx as u32) << PAGE_BITS;
        }
    }
}
