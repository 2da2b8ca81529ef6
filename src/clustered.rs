//! Center-relative bitmap sets.
//!
//! [`ClusteredBitmap`] keeps a single zig-zag bitmap re-centered on the
//! first value set after the map was last empty. [`ClusteredIntSet`] instead
//! splits the key space at a 64-aligned center into two raw-index bitmaps,
//! one per side, trading the zig-zag interleave for straight-line indices
//! within each half.

use crate::bits::{pop_count, trailing_zero_count, zigzag_decode, zigzag_encode};

const PAGE_BITS: u32 = 6;
const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;
const INITIAL_PAGES: usize = 16;

/// Growable bitmap over non-negative indices. Backs each half of a
/// [`ClusteredIntSet`].
#[derive(Clone, Debug)]
struct IndexBitmap {
    pages: Vec<u64>,
    page_count: usize,
    count: usize,
}

impl IndexBitmap {
    fn new() -> Self {
        Self {
            pages: vec![0; INITIAL_PAGES],
            page_count: 0,
            count: 0,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.count
    }

    #[inline]
    fn locate(index: u32) -> (usize, u64) {
        ((index >> PAGE_BITS) as usize, 1u64 << (index & PAGE_MASK))
    }

    #[inline]
    fn ensure_page(&mut self, page: usize) {
        if page >= self.pages.len() {
            let new_len = (self.pages.len() * 2).max(page + 1);
            self.pages.resize(new_len, 0);
        }
    }

    #[inline]
    fn set(&mut self, index: u32) -> bool {
        let (page, mask) = Self::locate(index);
        self.ensure_page(page);
        if self.pages[page] & mask != 0 {
            return false;
        }
        self.pages[page] |= mask;
        if page >= self.page_count {
            self.page_count = page + 1;
        }
        self.count += 1;
        true
    }

    #[inline]
    fn is_set(&self, index: u32) -> bool {
        let (page, mask) = Self::locate(index);
        page < self.page_count && self.pages[page] & mask != 0
    }

    #[inline]
    fn unset(&mut self, index: u32) -> bool {
        let (page, mask) = Self::locate(index);
        if page >= self.page_count || self.pages[page] & mask == 0 {
            return false;
        }
        self.pages[page] &= !mask;
        self.count -= 1;
        true
    }

    fn clear(&mut self) {
        for word in &mut self.pages[..self.page_count] {
            *word = 0;
        }
        self.page_count = 0;
        self.count = 0;
    }

    /// Retains only indices present in `indices`; out-of-range input cannot
    /// match and is dropped.
    fn intersect_with_indices(&mut self, indices: &[u32]) {
        let page_count = self.page_count;
        let mut masks = vec![0u64; page_count];
        for &index in indices {
            let (page, mask) = Self::locate(index);
            if page >= page_count {
                continue;
            }
            masks[page] |= mask;
        }
        for (page, &mask) in masks.iter().enumerate() {
            self.pages[page] &= mask;
        }
        self.recount();
    }

    /// Toggles each distinct index in `indices`. Indices beyond the current
    /// page range cannot be present and are simply set.
    fn toggle_indices(&mut self, indices: &[u32]) {
        let page_count = self.page_count;
        let mut masks = vec![0u64; page_count];
        for &index in indices {
            let (page, mask) = Self::locate(index);
            if page >= page_count {
                self.set(index);
            } else {
                masks[page] |= mask;
            }
        }
        for (page, &flip) in masks.iter().enumerate() {
            self.pages[page] ^= flip;
        }
        self.recount();
    }

    fn union_with(&mut self, other: &IndexBitmap) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.copy_from(other);
            return;
        }
        if self.page_count < other.page_count {
            self.ensure_page(other.page_count);
            self.page_count = other.page_count;
        }
        for page in 0..other.page_count {
            self.pages[page] |= other.pages[page];
        }
        self.recount();
    }

    fn intersect_with(&mut self, other: &IndexBitmap) {
        if self.count == 0 || other.count == 0 {
            self.clear();
            return;
        }
        let overlap = self.page_count.min(other.page_count);
        for page in 0..overlap {
            self.pages[page] &= other.pages[page];
        }
        for page in overlap..self.page_count {
            self.pages[page] = 0;
        }
        self.page_count = overlap;
        self.recount();
    }

    fn except_with(&mut self, other: &IndexBitmap) {
        if self.count == 0 || other.count == 0 {
            return;
        }
        let overlap = self.page_count.min(other.page_count);
        for page in 0..overlap {
            self.pages[page] &= !other.pages[page];
        }
        self.recount();
    }

    fn symmetric_except_with(&mut self, other: &IndexBitmap) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.union_with(other);
            return;
        }
        let max_pages = self.page_count.max(other.page_count);
        self.ensure_page(max_pages - 1);
        let overlap = self.page_count.min(other.page_count);
        for page in 0..overlap {
            self.pages[page] ^= other.pages[page];
        }
        for page in self.page_count..other.page_count {
            self.pages[page] = other.pages[page];
        }
        self.page_count = max_pages;
        self.recount();
    }

    fn copy_from(&mut self, other: &IndexBitmap) {
        if other.page_count > self.pages.len() {
            self.pages.resize(other.page_count, 0);
        }
        self.pages[..other.page_count].copy_from_slice(&other.pages[..other.page_count]);
        for word in &mut self.pages[other.page_count..] {
            *word = 0;
        }
        self.page_count = other.page_count;
        self.count = other.count;
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

    fn iter(&self) -> IndexIter<'_> {
        IndexIter {
            pages: &self.pages,
            page_count: self.page_count,
            page_idx: 0,
            current: if self.page_count > 0 { self.pages[0] } else { 0 },
            base: 0,
        }
    }
}

/// Ascending cursor over an [`IndexBitmap`].
struct IndexIter<'a> {
    pages: &'a [u64],
    page_count: usize,
    page_idx: usize,
    current: u64,
    base: u32,
}

impl<'a> Iterator for IndexIter<'a> {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        loop {
            if self.current != 0 {
                let bit = trailing_zero_count(self.current);
                self.current &= self.current.wrapping_sub(1);
                return Some(self.base | bit);
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

/// Zig-zag bitmap centered on the first value set while the map was empty.
///
/// Instances built independently carry different centers and their page
/// arrays are not bit-compatible, so this type only offers span operations;
/// combining two `ClusteredBitmap`s directly is not supported. Removing
/// every member lets the next [`set`](Self::set) pick a fresh center.
#[derive(Clone, Debug)]
pub struct ClusteredBitmap {
    pages: Vec<u64>,
    page_count: usize,
    count: usize,
    center: i32,
}

impl ClusteredBitmap {
    /// Creates an empty bitmap.
    pub fn new() -> Self {
        Self {
            pages: vec![0; INITIAL_PAGES],
            page_count: 0,
            count: 0,
            center: 0,
        }
    }

    /// Creates a bitmap containing the given values; the first value fixes
    /// the center.
    pub fn from_values(values: &[i32]) -> Self {
        let mut bitmap = Self::new();
        bitmap.union_with(values);
        bitmap
    }

    /// Number of set values.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` when nothing is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn locate(&self, value: i32) -> (usize, u64) {
        let key = zigzag_encode(value.wrapping_sub(self.center));
        ((key >> PAGE_BITS) as usize, 1u64 << (key & PAGE_MASK))
    }

    #[inline]
    fn ensure_page(&mut self, page: usize) {
        if page >= self.pages.len() {
            let new_len = (self.pages.len() * 2).max(page + 1);
            self.pages.resize(new_len, 0);
        }
    }

    /// Sets `value`, returning `true` if it was not already set. Setting
    /// into an empty bitmap re-centers on `value`.
    #[inline]
    pub fn set(&mut self, value: i32) -> bool {
        if self.count == 0 {
            self.center = value;
        }
        let (page, mask) = self.locate(value);
        self.ensure_page(page);
        if self.pages[page] & mask != 0 {
            return false;
        }
        self.pages[page] |= mask;
        if page >= self.page_count {
            self.page_count = page + 1;
        }
        self.count += 1;
        true
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        let (page, mask) = self.locate(value);
        page < self.page_count && self.pages[page] & mask != 0
    }

    /// Unsets `value`, returning `true` if it was set.
    #[inline]
    pub fn unset(&mut self, value: i32) -> bool {
        let (page, mask) = self.locate(value);
        if page >= self.page_count || self.pages[page] & mask == 0 {
            return false;
        }
        self.pages[page] &= !mask;
        self.count -= 1;
        true
    }

    /// Unsets everything and forgets the center; keeps the allocation.
    pub fn clear(&mut self) {
        for word in &mut self.pages[..self.page_count] {
            *word = 0;
        }
        self.page_count = 0;
        self.count = 0;
        self.center = 0;
    }

    /// Sets every value in `values`.
    pub fn union_with(&mut self, values: &[i32]) {
        for &value in values {
            self.set(value);
        }
    }

    /// Unsets every value in `values`.
    pub fn except_with(&mut self, values: &[i32]) {
        for &value in values {
            self.unset(value);
        }
    }

    /// Retains only values that also appear in `values`.
    pub fn intersect_with(&mut self, values: &[i32]) {
        let page_count = self.page_count;
        let mut masks = vec![0u64; page_count];
        for &value in values {
            let (page, mask) = self.locate(value);
            if page >= page_count {
                continue;
            }
            masks[page] |= mask;
        }
        for (page, &mask) in masks.iter().enumerate() {
            self.pages[page] &= mask;
        }
        self.recount();
    }

    /// Toggles every distinct value in `values`. Values beyond the current
    /// page range cannot be set yet and are set directly.
    pub fn symmetric_except_with(&mut self, values: &[i32]) {
        let page_count = self.page_count;
        let mut masks = vec![0u64; page_count];
        for &value in values {
            let (page, mask) = self.locate(value);
            if page >= page_count {
                self.set(value);
            } else {
                masks[page] |= mask;
            }
        }
        for (page, &flip) in masks.iter().enumerate() {
            self.pages[page] ^= flip;
        }
        self.recount();
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

    /// Iterates set values in increasing distance from the center.
    pub fn iter(&self) -> ClusteredBitmapIter<'_> {
        ClusteredBitmapIter {
            inner: IndexIter {
                pages: &self.pages,
                page_count: self.page_count,
                page_idx: 0,
                current: if self.page_count > 0 { self.pages[0] } else { 0 },
                base: 0,
            },
            center: self.center,
        }
    }

    /// Materializes the set values.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }
}

impl Default for ClusteredBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a ClusteredBitmap {
    type Item = i32;
    type IntoIter = ClusteredBitmapIter<'a>;

    fn into_iter(self) -> ClusteredBitmapIter<'a> {
        self.iter()
    }
}

/// Cursor produced by [`ClusteredBitmap::iter`].
pub struct ClusteredBitmapIter<'a> {
    inner: IndexIter<'a>,
    center: i32,
}

impl<'a> Iterator for ClusteredBitmapIter<'a> {
    type Item = i32;

    #[inline]
    fn next(&mut self) -> Option<i32> {
        self.inner
            .next()
            .map(|key| zigzag_decode(key).wrapping_add(self.center))
    }
}

/// Set of `i32` values split at a 64-aligned center into two raw-index
/// bitmaps, one for each side of the center.
///
/// The first added value rounds down to a multiple of 64 and becomes the
/// center; values below it index the low bitmap by distance, values at or
/// above it index the high bitmap. Cross-instance operations combine the
/// halves page-wise when both sets share a center and fall back to
/// re-encoding members one at a time when they do not.
///
/// # Examples
/// ```
/// use intset::ClusteredIntSet;
///
/// let mut set = ClusteredIntSet::from_values(&[100, 37, 162]);
/// assert!(set.contains(37));
/// set.except_with(&[37]);
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct ClusteredIntSet {
    lo: IndexBitmap,
    hi: IndexBitmap,
    center: i32,
    initialized: bool,
}

impl ClusteredIntSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            lo: IndexBitmap::new(),
            hi: IndexBitmap::new(),
            center: 0,
            initialized: false,
        }
    }

    /// Creates a set containing the given values.
    pub fn from_values(values: &[i32]) -> Self {
        let mut set = Self::new();
        set.union_with(values);
        set
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.lo.len() + self.hi.len()
    }

    /// Returns `true` when the set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signed distance from the center; i64 keeps the subtraction exact for
    /// values on the far side of the range.
    #[inline]
    fn index_of(&self, value: i32) -> i64 {
        i64::from(value) - i64::from(self.center)
    }

    /// Inserts `value`, returning `true` if it was not already present. The
    /// first insertion fixes the center at `value` rounded down to a
    /// multiple of 64.
    #[inline]
    pub fn add(&mut self, value: i32) -> bool {
        if !self.initialized {
            self.center = value & !(PAGE_MASK as i32);
            self.initialized = true;
        }
        let index = self.index_of(value);
        if index < 0 {
            self.lo.set((-index) as u32)
        } else {
            self.hi.set(index as u32)
        }
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        let index = self.index_of(value);
        if index < 0 {
            self.lo.is_set((-index) as u32)
        } else {
            self.hi.is_set(index as u32)
        }
    }

    /// Removes `value`, returning `true` if it was present.
    #[inline]
    pub fn remove(&mut self, value: i32) -> bool {
        let index = self.index_of(value);
        if index < 0 {
            self.lo.unset((-index) as u32)
        } else {
            self.hi.unset(index as u32)
        }
    }

    /// Removes all members and forgets the center.
    pub fn clear(&mut self) {
        self.lo.clear();
        self.hi.clear();
        self.center = 0;
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
    pub fn intersect_with(&mut self, values: &[i32]) {
        let (lo_indices, hi_indices) = self.partition(values);
        self.lo.intersect_with_indices(&lo_indices);
        self.hi.intersect_with_indices(&hi_indices);
    }

    /// Toggles membership of every distinct value in `values`.
    pub fn symmetric_except_with(&mut self, values: &[i32]) {
        if !self.initialized {
            self.union_with(values);
            return;
        }
        let (lo_indices, hi_indices) = self.partition(values);
        self.lo.toggle_indices(&lo_indices);
        self.hi.toggle_indices(&hi_indices);
    }

    /// Splits span values into low/high index buffers against this set's
    /// center.
    fn partition(&self, values: &[i32]) -> (Vec<u32>, Vec<u32>) {
        let mut lo_indices = Vec::new();
        let mut hi_indices = Vec::new();
        for &value in values {
            let index = self.index_of(value);
            if index < 0 {
                lo_indices.push((-index) as u32);
            } else {
                hi_indices.push(index as u32);
            }
        }
        (lo_indices, hi_indices)
    }

    /// Adds every member of `other`.
    pub fn union_with_set(&mut self, other: &ClusteredIntSet) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        if self.center == other.center {
            self.lo.union_with(&other.lo);
            self.hi.union_with(&other.hi);
            return;
        }
        for value in other.iter() {
            self.add(value);
        }
    }

    /// Retains only members that are also members of `other`.
    pub fn intersect_with_set(&mut self, other: &ClusteredIntSet) {
        if self.is_empty() {
            return;
        }
        if other.is_empty() {
            self.clear();
            return;
        }
        if self.center == other.center {
            self.lo.intersect_with(&other.lo);
            self.hi.intersect_with(&other.hi);
            return;
        }
        let keep = other.to_vec();
        self.intersect_with(&keep);
    }

    /// Removes every member of `other`.
    pub fn except_with_set(&mut self, other: &ClusteredIntSet) {
        if self.is_empty() || other.is_empty() {
            return;
        }
        if self.center == other.center {
            self.lo.except_with(&other.lo);
            self.hi.except_with(&other.hi);
            return;
        }
        for value in other.iter() {
            self.remove(value);
        }
    }

    /// Toggles membership of every member of `other`.
    pub fn symmetric_except_with_set(&mut self, other: &ClusteredIntSet) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        if self.center == other.center {
            self.lo.symmetric_except_with(&other.lo);
            self.hi.symmetric_except_with(&other.hi);
            return;
        }
        for value in other.iter() {
            if !self.remove(value) {
                self.add(value);
            }
        }
    }

    /// Iterates members: first the low side walking away from the center,
    /// then the high side walking up from it.
    pub fn iter(&self) -> ClusteredIter<'_> {
        ClusteredIter {
            lo: self.lo.iter(),
            hi: self.hi.iter(),
            center: self.center,
            on_lo: true,
        }
    }

    /// Materializes the member sequence.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }
}

impl Default for ClusteredIntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a ClusteredIntSet {
    type Item = i32;
    type IntoIter = ClusteredIter<'a>;

    fn into_iter(self) -> ClusteredIter<'a> {
        self.iter()
    }
}

/// Cursor produced by [`ClusteredIntSet::iter`].
pub struct ClusteredIter<'a> {
    lo: IndexIter<'a>,
    hi: IndexIter<'a>,
    center: i32,
    on_lo: bool,
}

impl<'a> Iterator for ClusteredIter<'a> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.on_lo {
            if let Some(index) = self.lo.next() {
                return Some(self.center.wrapping_sub(index as i32));
            }
            self.on_lo = false;
        }
        self.hi
            .next()
            .map(|index| self.center.wrapping_add(index as i32))
    }
}
