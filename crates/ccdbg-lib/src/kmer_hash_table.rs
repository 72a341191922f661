//! Open-addressing hash table keyed by packed k-mers or minimizers
//!
//! Linear probing over a power-of-two capacity, with two reserved sentinel
//! keys (empty, deleted). Lookups probe until the empty sentinel or a full
//! circuit; inserts reuse the first deleted slot seen on the probe path; the
//! table doubles when fewer than 20% of slots are empty.
//!
//! The bucket index of an entry is a stable handle for as long as no insert
//! grows the table: callers round-trip it to reach an entry again without
//! re-probing (the abundant-unitig container and the GFA writer both do).

use crate::hasher::DeterministicHasher;
use crate::kmer::Kmer;

/// Open-addressing map from k-mers/minimizers to `T`
pub struct KmerHashTable<T> {
    table: Vec<(Kmer, T)>,
    pop: usize,
    num_empty: usize,
    hasher: DeterministicHasher,
}

impl<T: Clone + Default> KmerHashTable<T> {
    const INIT_CAPACITY: usize = 1024;

    /// Create a table with the default initial capacity
    pub fn new(seed: u64) -> Self {
        Self::init(Self::INIT_CAPACITY, seed)
    }

    /// Create a table pre-sized for about `sz` entries
    pub fn with_capacity(sz: usize, seed: u64) -> Self {
        let want = ((sz as f64 * 1.2) as usize).max(Self::INIT_CAPACITY);
        Self::init(want, seed)
    }

    fn init(sz: usize, seed: u64) -> Self {
        let capacity = sz.next_power_of_two();
        Self {
            table: vec![(Kmer::empty_key(), T::default()); capacity],
            pop: 0,
            num_empty: capacity,
            hasher: DeterministicHasher::new(seed),
        }
    }

    /// Number of live entries
    #[inline]
    pub fn len(&self) -> usize {
        self.pop
    }

    /// True when no live entries remain
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pop == 0
    }

    /// Current capacity (bucket-index upper bound)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Remove every entry, keeping the capacity
    pub fn clear(&mut self) {
        for slot in self.table.iter_mut() {
            *slot = (Kmer::empty_key(), T::default());
        }
        self.pop = 0;
        self.num_empty = self.table.len();
    }

    #[inline]
    fn bucket_of(&self, key: &Kmer) -> usize {
        (self.hasher.hash_u128(key.bits()) as usize) & (self.table.len() - 1)
    }

    /// Find the bucket holding `key`
    pub fn find(&self, key: &Kmer) -> Option<usize> {
        let size = self.table.len();
        let mut h = self.bucket_of(key);
        let end_h = if h == 0 { size - 1 } else { h - 1 };

        loop {
            let slot_key = &self.table[h].0;
            if slot_key.is_empty_key() {
                return None;
            }
            if slot_key == key {
                return Some(h);
            }
            // Deleted slots do not terminate the probe
            if h == end_h {
                return None;
            }
            h = if h + 1 != size { h + 1 } else { 0 };
        }
    }

    /// Round-trip a bucket handle; None if the slot holds no live entry
    #[inline]
    pub fn entry(&self, h: usize) -> Option<(&Kmer, &T)> {
        let (key, val) = self.table.get(h)?;
        if key.is_empty_key() || key.is_deleted_key() {
            None
        } else {
            Some((key, val))
        }
    }

    /// Key stored at bucket `h`; panics on a dead slot
    #[inline]
    pub fn key_at(&self, h: usize) -> &Kmer {
        self.entry(h).expect("live bucket").0
    }

    /// Value stored at bucket `h`; panics on a dead slot
    #[inline]
    pub fn value_at(&self, h: usize) -> &T {
        self.entry(h).expect("live bucket").1
    }

    /// Mutable value stored at bucket `h`; panics on a dead slot
    #[inline]
    pub fn value_at_mut(&mut self, h: usize) -> &mut T {
        let (key, val) = &mut self.table[h];
        assert!(!key.is_empty_key() && !key.is_deleted_key());
        val
    }

    /// Look up a value by key
    pub fn get(&self, key: &Kmer) -> Option<&T> {
        self.find(key).map(|h| &self.table[h].1)
    }

    /// Look up a mutable value by key
    pub fn get_mut(&mut self, key: &Kmer) -> Option<&mut T> {
        match self.find(key) {
            Some(h) => Some(&mut self.table[h].1),
            None => None,
        }
    }

    /// Insert `(key, val)`. Returns the bucket and whether the key was new;
    /// an existing entry keeps its value.
    pub fn insert(&mut self, key: Kmer, val: T) -> (usize, bool) {
        if 5 * self.num_empty < self.table.len() {
            self.reserve(2 * self.table.len());
        }

        let size = self.table.len();
        let mut h = self.bucket_of(&key);
        let mut first_deleted: Option<usize> = None;

        loop {
            let slot_key = &self.table[h].0;
            if slot_key.is_empty_key() {
                let target = match first_deleted {
                    Some(d) => d,
                    None => {
                        self.num_empty -= 1;
                        h
                    }
                };
                self.table[target] = (key, val);
                self.pop += 1;
                return (target, true);
            }
            if slot_key == &key {
                return (h, false);
            }
            if first_deleted.is_none() && slot_key.is_deleted_key() {
                first_deleted = Some(h);
            }
            h = if h + 1 != size { h + 1 } else { 0 };
        }
    }

    /// Erase the entry at bucket `h`
    pub fn erase_bucket(&mut self, h: usize) {
        if self.entry(h).is_some() {
            self.table[h] = (Kmer::deleted_key(), T::default());
            self.pop -= 1;
        }
    }

    /// Erase by key; returns the number of removed entries (0 or 1)
    pub fn erase(&mut self, key: &Kmer) -> usize {
        match self.find(key) {
            Some(h) => {
                self.erase_bucket(h);
                1
            }
            None => 0,
        }
    }

    /// Grow to at least `sz` buckets, re-inserting every live entry.
    /// Bucket handles taken before a grow are invalidated by it.
    pub fn reserve(&mut self, sz: usize) {
        if sz <= self.table.len() {
            return;
        }

        let capacity = sz.next_power_of_two();
        let old = std::mem::replace(
            &mut self.table,
            vec![(Kmer::empty_key(), T::default()); capacity],
        );
        self.pop = 0;
        self.num_empty = capacity;

        for (key, val) in old {
            if !key.is_empty_key() && !key.is_deleted_key() {
                self.insert(key, val);
            }
        }
    }

    /// Iterate live entries as `(bucket, key, value)` in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Kmer, &T)> {
        self.table.iter().enumerate().filter_map(|(h, (key, val))| {
            if key.is_empty_key() || key.is_deleted_key() {
                None
            } else {
                Some((h, key, val))
            }
        })
    }

    /// Bucket handles of all live entries, in bucket order.
    ///
    /// Snapshot for loops that erase entries while walking the table.
    pub fn buckets(&self) -> Vec<usize> {
        self.iter().map(|(h, _, _)| h).collect()
    }
}
