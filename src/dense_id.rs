//! Mapping from arbitrary `i32` keys to dense ids.
//!
//! [`DenseIdMap`] is an open-addressing hash table with linear probing and
//! tombstone deletion, paired with an inverse array for id-to-key lookup.
//! Ids are handed out as the live count at insertion time, so they stay
//! dense in `0..len` and make good indices into side tables. The flip side:
//! after a removal the next insertion reissues an id that another live key
//! may still hold; ids are only stable while no removals interleave.

const EMPTY: i32 = 0;
const TOMBSTONE: i32 = -1;

const DEFAULT_CAPACITY: usize = 16;

/// Fibonacci hashing constant, 2^32 / phi.
const HASH_MULTIPLIER: u32 = 0x9E37_79B1;

/// Assigns dense 0-based ids to `i32` keys with inverse lookup.
///
/// # Examples
/// ```
/// use intset::DenseIdMap;
///
/// let mut map = DenseIdMap::new();
/// assert_eq!(map.get_or_add(500), 0);
/// assert_eq!(map.get_or_add(-7), 1);
/// assert_eq!(map.get_or_add(500), 0);
/// assert_eq!(map.get_key(1), -7);
/// ```
#[derive(Clone, Debug)]
pub struct DenseIdMap {
    keys: Vec<i32>,
    /// Per-slot state: `id + 1` for occupied, [`EMPTY`], or [`TOMBSTONE`].
    slots: Vec<i32>,
    /// Inverse map, dense in `0..len`.
    id_to_key: Vec<i32>,
    mask: usize,
    len: usize,
    tombstones: usize,
}

impl DenseIdMap {
    /// Creates an empty map with the default slot capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty map sized for `capacity` keys, rounded up to a power
    /// of two.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            keys: vec![0; capacity],
            slots: vec![EMPTY; capacity],
            id_to_key: Vec::new(),
            mask: capacity - 1,
            len: 0,
            tombstones: 0,
        }
    }

    /// Creates a map assigning ids to `keys` in order; duplicates keep their
    /// first id.
    pub fn from_keys(keys: &[i32]) -> Self {
        let mut map = Self::with_capacity(keys.len());
        for &key in keys {
            map.get_or_add(key);
        }
        map
    }

    /// Number of live keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the map has no live keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn hash_index(&self, key: i32) -> usize {
        ((key as u32).wrapping_mul(HASH_MULTIPLIER) as usize) & self.mask
    }

    /// Probes for `key`. Returns the slot holding it (`exists == true`) or
    /// the slot an insertion should use, preferring the first tombstone on
    /// the probe path.
    #[inline]
    fn find_slot(&self, key: i32) -> (usize, bool) {
        let mut idx = self.hash_index(key);
        let mut first_tombstone = None;
        for _ in 0..=self.mask {
            let stored = self.slots[idx];
            if stored == EMPTY {
                return (first_tombstone.unwrap_or(idx), false);
            }
            if stored == TOMBSTONE {
                if first_tombstone.is_none() {
                    first_tombstone = Some(idx);
                }
            } else if self.keys[idx] == key {
                return (idx, true);
            }
            idx = (idx + 1) & self.mask;
        }
        // The load factor cap guarantees an empty slot on every probe path.
        panic!("dense id map probe exhausted all slots");
    }

    /// Returns the id for `key`, assigning the next dense id (the current
    /// live count) if the key is new.
    pub fn get_or_add(&mut self, key: i32) -> usize {
        let (idx, exists) = self.find_slot(key);
        if exists {
            return (self.slots[idx] - 1) as usize;
        }

        let id = self.len;
        self.keys[idx] = key;
        self.slots[idx] = id as i32 + 1;
        self.len += 1;

        if self.len + self.tombstones > self.slots.len() * 3 / 4 {
            self.resize();
        }

        if id == self.id_to_key.len() {
            self.id_to_key.push(key);
        } else {
            self.id_to_key[id] = key;
        }
        id
    }

    /// Returns `true` if `key` is live in the map.
    pub fn contains(&self, key: i32) -> bool {
        self.find_slot(key).1
    }

    /// Returns the id for `key` if it is live.
    pub fn get_id(&self, key: i32) -> Option<usize> {
        let (idx, exists) = self.find_slot(key);
        exists.then(|| (self.slots[idx] - 1) as usize)
    }

    /// Returns the key holding `id`.
    ///
    /// # Panics
    /// Panics if `id >= self.len()`.
    pub fn get_key(&self, id: usize) -> i32 {
        assert!(id < self.len, "id {id} out of range for map of {}", self.len);
        self.id_to_key[id]
    }

    /// Removes `key`, returning `true` if it was live. The slot becomes a
    /// tombstone; the table is rebuilt once tombstones pass a quarter of the
    /// capacity.
    pub fn remove(&mut self, key: i32) -> bool {
        let mut idx = self.hash_index(key);
        for _ in 0..=self.mask {
            let stored = self.slots[idx];
            if stored == EMPTY {
                return false;
            }
            if stored != TOMBSTONE && self.keys[idx] == key {
                self.slots[idx] = TOMBSTONE;
                self.tombstones += 1;
                self.len -= 1;
                if self.tombstones > self.slots.len() / 4 {
                    self.rebuild(self.slots.len());
                }
                return true;
            }
            idx = (idx + 1) & self.mask;
        }
        false
    }

    fn resize(&mut self) {
        self.rebuild(self.slots.len() * 2);
    }

    /// Rehashes every live entry into a fresh table of `capacity` slots,
    /// dropping all tombstones.
    fn rebuild(&mut self, capacity: usize) {
        let old_keys = std::mem::replace(&mut self.keys, vec![0; capacity]);
        let old_slots = std::mem::replace(&mut self.slots, vec![EMPTY; capacity]);
        self.mask = capacity - 1;

        for (slot, &stored) in old_slots.iter().enumerate() {
            if stored <= 0 {
                continue;
            }
            let key = old_keys[slot];
            let mut idx = self.hash_index(key);
            while self.slots[idx] != EMPTY {
                idx = (idx + 1) & self.mask;
            }
            self.keys[idx] = key;
            self.slots[idx] = stored;
        }
        self.tombstones = 0;
    }

    /// Iterates live keys in id order. After removals the tail of the id
    /// space may still reflect the pre-removal assignment; see the type
    /// docs.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.id_to_key[..self.len].iter().copied()
    }
}

impl Default for DenseIdMap {
    fn default() -> Self {
        Self::new()
    }
}
