//! Sparse two-level bitmap set with lazily allocated fixed-size blocks.
//!
//! Unlike [`IntSet`](crate::IntSet), [`PagedIntSet`] has no origin: values
//! are zig-zag encoded against zero and the key space is split into 1024-bit
//! blocks that are only allocated when a key lands in them. Two instances
//! are always bit-compatible, so set-to-set operations combine matching
//! blocks directly. The trade-off is a pointer-sized slot per covered block,
//! which favors data clustered near zero or spread over few blocks.

use crate::bits::{pop_count, trailing_zero_count, zigzag_decode, zigzag_encode};

const PAGE_BITS: u32 = 10;
const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;
/// 64-bit words per block: 1024 bits split as 16 x 64.
const WORDS_PER_PAGE: usize = 1 << (PAGE_BITS - 6);

type Page = Box<[u64; WORDS_PER_PAGE]>;

fn new_page() -> Page {
    Box::new([0u64; WORDS_PER_PAGE])
}

/// Set of `i32` values over lazily allocated 1024-bit blocks.
///
/// # Examples
/// ```
/// use intset::PagedIntSet;
///
/// let mut a = PagedIntSet::from_values(&[1, -1, 5000]);
/// let b = PagedIntSet::from_values(&[-1, 7]);
/// a.intersect_with_set(&b);
/// assert_eq!(a.to_vec(), vec![-1]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PagedIntSet {
    pages: Vec<Option<Page>>,
    count: usize,
}

impl PagedIntSet {
    /// Creates an empty set; no blocks are allocated until the first add.
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            count: 0,
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
        self.count
    }

    /// Returns `true` when the set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn locate(value: i32) -> (usize, usize, u64) {
        let key = zigzag_encode(value);
        let page = (key >> PAGE_BITS) as usize;
        let local = key & PAGE_MASK;
        let slot = (local >> 6) as usize;
        let mask = 1u64 << (local & 63);
        (page, slot, mask)
    }

    fn ensure_page(&mut self, page: usize) -> &mut Page {
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        self.pages[page].get_or_insert_with(new_page)
    }

    /// Inserts `value`, returning `true` if it was not already present.
    /// Allocates the covering block on first touch.
    #[inline]
    pub fn add(&mut self, value: i32) -> bool {
        let (page, slot, mask) = Self::locate(value);
        let block = self.ensure_page(page);
        if block[slot] & mask != 0 {
            return false;
        }
        block[slot] |= mask;
        self.count += 1;
        true
    }

    /// Membership test. Never allocates.
    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        let (page, slot, mask) = Self::locate(value);
        match self.pages.get(page) {
            Some(Some(block)) => block[slot] & mask != 0,
            _ => false,
        }
    }

    /// Removes `value`, returning `true` if it was present. The emptied
    /// block stays allocated.
    #[inline]
    pub fn remove(&mut self, value: i32) -> bool {
        let (page, slot, mask) = Self::locate(value);
        match self.pages.get_mut(page) {
            Some(Some(block)) if block[slot] & mask != 0 => {
                block[slot] &= !mask;
                self.count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Removes all members and releases every block; the outer directory
    /// keeps its length.
    pub fn clear(&mut self) {
        for page in &mut self.pages {
            *page = None;
        }
        self.count = 0;
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
        let other = Self::from_values(values);
        self.intersect_with_set(&other);
    }

    /// Toggles membership of every distinct value in `values`.
    pub fn symmetric_except_with(&mut self, values: &[i32]) {
        let other = Self::from_values(values);
        self.symmetric_except_with_set(&other);
    }

    /// Adds every member of `other`, cloning blocks this set does not cover
    /// and ORing into blocks it does.
    pub fn union_with_set(&mut self, other: &PagedIntSet) {
        if other.pages.len() > self.pages.len() {
            self.pages.resize_with(other.pages.len(), || None);
        }
        for (page, other_block) in other.pages.iter().enumerate() {
            let Some(other_block) = other_block else {
                continue;
            };
            match &mut self.pages[page] {
                Some(block) => {
                    for (word, &other_word) in block.iter_mut().zip(other_block.iter()) {
                        *word |= other_word;
                    }
                }
                slot @ None => {
                    *slot = Some(other_block.clone());
                }
            }
        }
        self.recount();
    }

    /// Retains only members that are also members of `other`. Blocks with no
    /// counterpart in `other` are released.
    pub fn intersect_with_set(&mut self, other: &PagedIntSet) {
        if self.count == 0 || other.count == 0 {
            self.clear();
            return;
        }
        for (page, block_slot) in self.pages.iter_mut().enumerate() {
            let Some(block) = block_slot else {
                continue;
            };
            match other.pages.get(page) {
                Some(Some(other_block)) => {
                    for (word, &other_word) in block.iter_mut().zip(other_block.iter()) {
                        *word &= other_word;
                    }
                }
                _ => {
                    *block_slot = None;
                }
            }
        }
        self.recount();
    }

    /// Removes every member of `other`. Only blocks both sets cover are
    /// touched.
    pub fn except_with_set(&mut self, other: &PagedIntSet) {
        let overlap = self.pages.len().min(other.pages.len());
        for page in 0..overlap {
            let (Some(block), Some(other_block)) = (&mut self.pages[page], &other.pages[page])
            else {
                continue;
            };
            for (word, &other_word) in block.iter_mut().zip(other_block.iter()) {
                *word &= !other_word;
            }
        }
        self.recount();
    }

    /// Toggles membership of every member of `other`: XOR on shared blocks,
    /// block clones where only `other` has one.
    pub fn symmetric_except_with_set(&mut self, other: &PagedIntSet) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.union_with_set(other);
            return;
        }
        if other.pages.len() > self.pages.len() {
            self.pages.resize_with(other.pages.len(), || None);
        }
        for (page, other_block) in other.pages.iter().enumerate() {
            let Some(other_block) = other_block else {
                continue;
            };
            match &mut self.pages[page] {
                Some(block) => {
                    for (word, &other_word) in block.iter_mut().zip(other_block.iter()) {
                        *word ^= other_word;
                    }
                }
                slot @ None => {
                    *slot = Some(other_block.clone());
                }
            }
        }
        self.recount();
    }

    fn recount(&mut self) {
        let mut count = 0usize;
        for block in self.pages.iter().flatten() {
            for &word in block.iter() {
                if word != 0 {
                    count += pop_count(word) as usize;
                }
            }
        }
        self.count = count;
    }

    /// Iterates members in increasing zig-zag key order (increasing absolute
    /// distance from zero). Unallocated blocks are skipped whole.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            pages: &self.pages,
            page_idx: 0,
            slot_idx: 0,
            current: 0,
            base: 0,
        }
    }

    /// Materializes the member sequence.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a PagedIntSet {
    type Item = i32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Cursor over a [`PagedIntSet`]'s blocks, produced by [`PagedIntSet::iter`].
pub struct Iter<'a> {
    pages: &'a [Option<Page>],
    page_idx: usize,
    slot_idx: usize,
    current: u64,
    base: u32,
}

impl<'a> Iterator for Iter<'a> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        loop {
            if self.current != 0 {
                let bit = trailing_zero_count(self.current);
                self.current &= self.current.wrapping_sub(1);
                return Some(zigzag_decode(self.base | bit));
            }
            let block = loop {
                match self.pages.get(self.page_idx) {
                    Some(Some(block)) => break block,
                    Some(None) => {
                        self.page_idx += 1;
                        self.slot_idx = 0;
                    }
                    None => return None,
                }
            };
            if self.slot_idx < WORDS_PER_PAGE {
                self.current = block[self.slot_idx];
                self.base =
                    ((self.page_idx as u32) << PAGE_BITS) | ((self.slot_idx as u32) << 6);
                self.slot_idx += 1;
            } else {
                self.page_idx += 1;
                self.slot_idx = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const PROPTEST_CASES: u32 = 32;

    fn as_hash_set(set: &PagedIntSet) -> HashSet<i32> {
        set.iter().collect()
    }

    #[test]
    fn empty_set() {
        let set = PagedIntSet::new();
        assert!(set.is_empty());
        assert!(!set.contains(0));
        assert_eq!(set.to_vec(), Vec::<i32>::new());
    }

    #[test]
    fn add_contains_remove() {
        let mut set = PagedIntSet::new();
        for v in [0, -1, 1, 511, 512, -512, 1_000_000, i32::MIN, i32::MAX] {
            assert!(set.add(v));
            assert!(!set.add(v));
            assert!(set.contains(v));
        }
        assert_eq!(set.len(), 9);
        assert!(set.remove(511));
        assert!(!set.remove(511));
        assert!(!set.contains(511));
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn block_is_allocated_lazily() {
        let mut set = PagedIntSet::new();
        set.add(2_000_000);
        // The directory covers all lower blocks but only one holds storage.
        let allocated = set.pages.iter().filter(|p| p.is_some()).count();
        assert_eq!(allocated, 1);
        assert!(set.contains(2_000_000));
        assert!(!set.contains(0));
    }

    #[test]
    fn values_straddling_block_boundaries() {
        // Keys 1023 and 1024 sit in adjacent blocks.
        let boundary = [zigzag_decode(1023), zigzag_decode(1024)];
        let set = PagedIntSet::from_values(&boundary);
        assert!(set.contains(boundary[0]));
        assert!(set.contains(boundary[1]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn union_clones_missing_blocks() {
        let mut a = PagedIntSet::from_values(&[1, 2]);
        let b = PagedIntSet::from_values(&[2, 100_000]);
        a.union_with_set(&b);
        assert_eq!(as_hash_set(&a), HashSet::from([1, 2, 100_000]));
    }

    #[test]
    fn intersect_releases_uncovered_blocks() {
        let mut a = PagedIntSet::from_values(&[1, 100_000]);
        let b = PagedIntSet::from_values(&[1]);
        a.intersect_with_set(&b);
        assert_eq!(as_hash_set(&a), HashSet::from([1]));
        assert!(a.pages.iter().skip(1).all(|p| p.is_none()));
    }

    #[test]
    fn intersect_with_empty_clears() {
        let mut a = PagedIntSet::from_values(&[1, 2, 3]);
        a.intersect_with_set(&PagedIntSet::new());
        assert!(a.is_empty());
        assert!(!a.contains(1));
    }

    #[test]
    fn symmetric_except_empty_fast_paths() {
        let mut a = PagedIntSet::from_values(&[1, 2]);
        a.symmetric_except_with_set(&PagedIntSet::new());
        assert_eq!(as_hash_set(&a), HashSet::from([1, 2]));

        let mut empty = PagedIntSet::new();
        empty.symmetric_except_with_set(&a);
        assert_eq!(as_hash_set(&empty), HashSet::from([1, 2]));
    }

    #[test]
    fn span_ops_delegate_to_set_ops() {
        let a = [12, 98, 123, 118_281, -2131, 329_999, 32, 1, 2, 0];
        let b = [12, 1, 2, 3, -82, 11, 54, 27, 901, 324];

        let mut inter = PagedIntSet::from_values(&a);
        inter.intersect_with(&b);
        assert_eq!(as_hash_set(&inter), HashSet::from([12, 1, 2]));

        let mut sym = PagedIntSet::from_values(&a);
        sym.symmetric_except_with(&b);
        let expected: HashSet<i32> = {
            let sa: HashSet<i32> = a.iter().copied().collect();
            let sb: HashSet<i32> = b.iter().copied().collect();
            sa.symmetric_difference(&sb).copied().collect()
        };
        assert_eq!(as_hash_set(&sym), expected);
        assert_eq!(sym.len(), sym.iter().count());
    }

    #[test]
    fn clear_then_reuse() {
        let mut set = PagedIntSet::from_values(&[5, -5, 70_000]);
        set.clear();
        assert!(set.is_empty());
        assert!(set.add(5));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn iteration_order_is_zigzag_key_order() {
        let set = PagedIntSet::from_values(&[2, -2, 1, -1, 0]);
        assert_eq!(set.to_vec(), vec![0, -1, 1, -2, 2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(
            crate::test_utils::proptest_cases(PROPTEST_CASES)
        ))]

        #[test]
        fn matches_hash_set_under_add_remove(
            ops in proptest::collection::vec((-5000i32..5000, any::<bool>()), 0..256)
        ) {
            let mut set = PagedIntSet::new();
            let mut model = HashSet::new();
            for (value, is_add) in ops {
                if is_add {
                    prop_assert_eq!(set.add(value), model.insert(value));
                } else {
                    prop_assert_eq!(set.remove(value), model.remove(&value));
                }
            }
            prop_assert_eq!(set.len(), model.len());
            prop_assert_eq!(as_hash_set(&set), model);
        }

        #[test]
        fn set_algebra_matches_hash_set(
            a in proptest::collection::vec(-50_000i32..50_000, 0..64),
            b in proptest::collection::vec(-50_000i32..50_000, 0..64),
            op in 0u8..4,
        ) {
            let mut set = PagedIntSet::from_values(&a);
            let other = PagedIntSet::from_values(&b);
            let mut model: HashSet<i32> = a.iter().copied().collect();
            let other_model: HashSet<i32> = b.iter().copied().collect();
            match op {
                0 => {
                    set.union_with_set(&other);
                    model.extend(&other_model);
                }
                1 => {
                    set.intersect_with_set(&other);
                    model.retain(|v| other_model.contains(v));
                }
                2 => {
                    set.except_with_set(&other);
                    model.retain(|v| !other_model.contains(v));
                }
                _ => {
                    set.symmetric_except_with_set(&other);
                    model = model.symmetric_difference(&other_model).copied().collect();
                }
            }
            prop_assert_eq!(as_hash_set(&set), model);
            prop_assert_eq!(set.len(), set.iter().count());
        }
    }
}
