//! [`ClusteredBitmap`](crate::ClusteredBitmap)'s algorithm over a manually
//! managed allocation.
//!
//! The page array lives in a raw heap block owned through a `NonNull`
//! pointer and released in `Drop`, keeping the storage outside any `Vec`
//! header or growth policy the allocator-aware callers may want to avoid.
//! The handle is move-only; there is no `Clone`, so the block has exactly
//! one owner for its whole lifetime.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

use crate::bits::{pop_count, trailing_zero_count, zigzag_decode, zigzag_encode};

const PAGE_BITS: u32 = 6;
const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;
const INITIAL_CAPACITY: usize = 16;

fn page_layout(words: usize) -> Layout {
    Layout::array::<u64>(words)
        .unwrap_or_else(|_| panic!("bitmap capacity overflow: {words} words"))
}

/// Zig-zag bitmap centered on the first value set while empty, backed by a
/// manually allocated word block.
///
/// # Examples
/// ```
/// use intset::NativeClusteredBitmap;
///
/// let mut bitmap = NativeClusteredBitmap::new();
/// bitmap.set(9000);
/// bitmap.set(9001);
/// assert!(bitmap.contains(9000));
/// assert_eq!(bitmap.len(), 2);
/// // The allocation is freed when `bitmap` goes out of scope.
/// ```
#[derive(Debug)]
pub struct NativeClusteredBitmap {
    ptr: NonNull<u64>,
    capacity: usize,
    page_count: usize,
    count: usize,
    center: i32,
}

impl NativeClusteredBitmap {
    /// Creates an empty bitmap with a zeroed 16-word block.
    pub fn new() -> Self {
        let layout = page_layout(INITIAL_CAPACITY);
        // SAFETY: layout is non-zero-sized (16 u64 words).
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<u64>()) else {
            handle_alloc_error(layout);
        };
        Self {
            ptr,
            capacity: INITIAL_CAPACITY,
            page_count: 0,
            count: 0,
            center: 0,
        }
    }

    /// Creates a bitmap containing the given values via
    /// [`union_with`](Self::union_with); the center stays at zero.
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
    fn words(&self) -> &[u64] {
        // SAFETY: ptr owns `capacity` initialized words; page_count never
        // exceeds capacity.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.page_count) }
    }

    #[inline]
    fn words_mut(&mut self) -> &mut [u64] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.page_count) }
    }

    #[inline]
    fn locate(&self, value: i32) -> (usize, u64) {
        let key = zigzag_encode(value.wrapping_sub(self.center));
        ((key >> PAGE_BITS) as usize, 1u64 << (key & PAGE_MASK))
    }

    /// Grows the block to hold at least `min_pages` words: allocate zeroed,
    /// copy live words, free the old block.
    fn ensure_capacity(&mut self, min_pages: usize) {
        if min_pages <= self.capacity {
            return;
        }
        let new_capacity = (self.capacity * 2).max(min_pages);
        let new_layout = page_layout(new_capacity);
        // SAFETY: new_layout is non-zero-sized.
        let raw = unsafe { alloc_zeroed(new_layout) };
        let Some(new_ptr) = NonNull::new(raw.cast::<u64>()) else {
            handle_alloc_error(new_layout);
        };
        // SAFETY: both blocks are valid for `capacity` words and distinct.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.capacity);
            dealloc(self.ptr.as_ptr().cast(), page_layout(self.capacity));
        }
        self.ptr = new_ptr;
        self.capacity = new_capacity;
    }

    /// Sets `value`, returning `true` if it was not already set. Setting
    /// into an empty bitmap re-centers on `value`.
    #[inline]
    pub fn set(&mut self, value: i32) -> bool {
        if self.count == 0 {
            self.center = value;
        }
        let (page, mask) = self.locate(value);
        self.ensure_capacity(page + 1);
        if page >= self.page_count {
            self.page_count = page + 1;
        }
        let words = self.words_mut();
        if words[page] & mask != 0 {
            return false;
        }
        words[page] |= mask;
        self.count += 1;
        true
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        let (page, mask) = self.locate(value);
        page < self.page_count && self.words()[page] & mask != 0
    }

    /// Unsets `value`, returning `true` if it was set.
    #[inline]
    pub fn unset(&mut self, value: i32) -> bool {
        let (page, mask) = self.locate(value);
        if page >= self.page_count || self.words()[page] & mask == 0 {
            return false;
        }
        self.words_mut()[page] &= !mask;
        self.count -= 1;
        true
    }

    /// Unsets everything and forgets the center; keeps the allocation.
    pub fn clear(&mut self) {
        for word in self.words_mut() {
            *word = 0;
        }
        self.page_count = 0;
        self.count = 0;
        self.center = 0;
    }

    /// Sets every value in `values` against the current center, growing the
    /// block once up-front to the highest touched page.
    pub fn union_with(&mut self, values: &[i32]) {
        let mut max_pages = self.page_count;
        for &value in values {
            let (page, _) = self.locate(value);
            max_pages = max_pages.max(page + 1);
        }
        if max_pages > 0 {
            self.ensure_capacity(max_pages);
            self.page_count = self.page_count.max(max_pages);
        }
        let page_count = self.page_count;
        let mut masks = vec![0u64; page_count];
        for &value in values {
            let (page, mask) = self.locate(value);
            masks[page] |= mask;
        }
        let words = self.words_mut();
        for (page, &mask) in masks.iter().enumerate() {
            words[page] |= mask;
        }
        self.recount();
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
        if page_count == 0 {
            return;
        }
        let mut masks = vec![0u64; page_count];
        for &value in values {
            let (page, mask) = self.locate(value);
            if page >= page_count {
                continue;
            }
            masks[page] |= mask;
        }
        let words = self.words_mut();
        for (page, &mask) in masks.iter().enumerate() {
            words[page] &= mask;
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
        let words = self.words_mut();
        for (page, &flip) in masks.iter().enumerate() {
            words[page] ^= flip;
        }
        self.recount();
    }

    fn recount(&mut self) {
        let mut count = 0usize;
        for &word in self.words() {
            if word != 0 {
                count += pop_count(word) as usize;
            }
        }
        self.count = count;
    }

    /// Iterates set values in increasing distance from the center.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: self.words(),
            page_idx: 0,
            current: if self.page_count > 0 { self.words()[0] } else { 0 },
            base: 0,
            center: self.center,
        }
    }

    /// Materializes the set values.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }
}

impl Default for NativeClusteredBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeClusteredBitmap {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this layout and is released exactly
        // once; the handle is move-only.
        unsafe {
            dealloc(self.ptr.as_ptr().cast(), page_layout(self.capacity));
        }
    }
}

// SAFETY: the block is owned exclusively by the handle; no interior
// mutability or thread-local state.
unsafe impl Send for NativeClusteredBitmap {}
unsafe impl Sync for NativeClusteredBitmap {}

impl<'a> IntoIterator for &'a NativeClusteredBitmap {
    type Item = i32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Cursor produced by [`NativeClusteredBitmap::iter`]. Borrows the word
/// block, so the bitmap cannot be mutated or dropped while iterating.
pub struct Iter<'a> {
    words: &'a [u64],
    page_idx: usize,
    current: u64,
    base: u32,
    center: i32,
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
                return Some(zigzag_decode(key).wrapping_add(self.center));
            }
            self.page_idx += 1;
            if self.page_idx >= self.words.len() {
                return None;
            }
            self.current = self.words[self.page_idx];
            self.base = (self.page_idx as u32) << PAGE_BITS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const PROPTEST_CASES: u32 = 32;

    fn as_hash_set(bitmap: &NativeClusteredBitmap) -> HashSet<i32> {
        bitmap.iter().collect()
    }

    #[test]
    fn set_contains_unset() {
        let mut bitmap = NativeClusteredBitmap::new();
        assert!(bitmap.set(123_456));
        assert!(!bitmap.set(123_456));
        assert!(bitmap.contains(123_456));
        assert!(bitmap.set(123_400));
        assert_eq!(bitmap.len(), 2);
        assert!(bitmap.unset(123_456));
        assert!(!bitmap.unset(123_456));
        assert!(!bitmap.contains(123_456));
        assert_eq!(bitmap.len(), 1);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut bitmap = NativeClusteredBitmap::new();
        // Center on 0, then walk far enough to force several regrows.
        bitmap.set(0);
        for offset in 1..=5000 {
            assert!(bitmap.set(offset));
        }
        assert_eq!(bitmap.len(), 5001);
        assert!(bitmap.capacity > INITIAL_CAPACITY);
        for offset in 0..=5000 {
            assert!(bitmap.contains(offset));
        }
        assert!(!bitmap.contains(5001));
        assert!(!bitmap.contains(-1));
    }

    #[test]
    fn recenters_after_emptying() {
        let mut bitmap = NativeClusteredBitmap::new();
        bitmap.set(50_000);
        bitmap.unset(50_000);
        bitmap.set(-50_000);
        assert!(bitmap.contains(-50_000));
        assert!(!bitmap.contains(50_000));
    }

    #[test]
    fn union_span_keeps_center() {
        // The bulk path encodes against the existing center (zero for a
        // fresh bitmap) instead of re-centering on the first value.
        let bitmap = NativeClusteredBitmap::from_values(&[5, -5, 2000, -2000]);
        assert_eq!(
            as_hash_set(&bitmap),
            HashSet::from([5, -5, 2000, -2000])
        );
        assert_eq!(bitmap.center, 0);
    }

    #[test]
    fn union_span_grows_once_to_max_page() {
        let mut bitmap = NativeClusteredBitmap::new();
        bitmap.set(0);
        bitmap.union_with(&[3000, 1, -1]);
        assert_eq!(as_hash_set(&bitmap), HashSet::from([0, 3000, 1, -1]));
        assert!(bitmap.capacity * 64 > zigzag_encode(3000) as usize);
    }

    #[test]
    fn span_intersect_and_symmetric_except() {
        let mut bitmap = NativeClusteredBitmap::from_values(&[1, 2, 3, 4]);
        bitmap.intersect_with(&[2, 4, 99]);
        assert_eq!(as_hash_set(&bitmap), HashSet::from([2, 4]));

        bitmap.symmetric_except_with(&[4, 5]);
        assert_eq!(as_hash_set(&bitmap), HashSet::from([2, 5]));
        assert_eq!(bitmap.len(), 2);
    }

    #[test]
    fn intersect_on_empty_is_noop() {
        let mut bitmap = NativeClusteredBitmap::new();
        bitmap.intersect_with(&[1, 2, 3]);
        assert!(bitmap.is_empty());
    }

    #[test]
    fn clear_then_reuse() {
        let mut bitmap = NativeClusteredBitmap::from_values(&[10, 20, 30]);
        bitmap.clear();
        assert!(bitmap.is_empty());
        assert!(bitmap.set(-10));
        assert!(bitmap.contains(-10));
        assert_eq!(bitmap.len(), 1);
    }

    #[test]
    fn drop_after_growth_releases_cleanly() {
        // Exercises Drop across several reallocations; run under Miri or
        // ASan to validate the unsafe blocks.
        for _ in 0..8 {
            let mut bitmap = NativeClusteredBitmap::new();
            bitmap.set(7);
            bitmap.union_with(&[8, 9, 10_000]);
            assert_eq!(bitmap.len(), 4);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(
            crate::test_utils::proptest_cases(PROPTEST_CASES)
        ))]

        #[test]
        fn matches_hash_set(
            ops in proptest::collection::vec((-10_000i32..10_000, any::<bool>()), 0..200)
        ) {
            let mut bitmap = NativeClusteredBitmap::new();
            let mut model = HashSet::new();
            for (value, is_set) in ops {
                if is_set {
                    prop_assert_eq!(bitmap.set(value), model.insert(value));
                } else {
                    prop_assert_eq!(bitmap.unset(value), model.remove(&value));
                }
            }
            prop_assert_eq!(bitmap.len(), model.len());
            prop_assert_eq!(as_hash_set(&bitmap), model);
        }

        #[test]
        fn bulk_union_matches_hash_set(
            seed in proptest::collection::vec(-5_000i32..5_000, 0..64),
            more in proptest::collection::vec(-5_000i32..5_000, 0..64),
        ) {
            let mut bitmap = NativeClusteredBitmap::from_values(&seed);
            bitmap.union_with(&more);
            let model: HashSet<i32> = seed.iter().chain(&more).copied().collect();
            prop_assert_eq!(as_hash_set(&bitmap), model);
            prop_assert_eq!(bitmap.len(), bitmap.iter().count());
        }
    }
}
