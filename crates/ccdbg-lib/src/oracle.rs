//! K-mer membership oracles
//!
//! Graph construction walks neighbors through a may-have membership oracle:
//! `contains` must never report false for an inserted k-mer but may report
//! true for an absent one. The unitig walker carries two mitigations for the
//! false positives (symmetric-unique neighbor checks and tip pruning), so the
//! default oracle is a blocked Bloom filter; tests use the exact variant.
//!
//! Membership is over canonical forms: a k-mer and its twin are the same key.

use crate::hasher::DeterministicHasher;
use crate::kmer::Kmer;
use ahash::AHashSet;

/// May-have k-mer membership, borrowed by the mutation kernel
pub trait KmerOracle {
    /// Check membership of the canonical form of `km`
    fn contains(&self, km: &Kmer) -> bool;
}

const BLOCK_WORDS: usize = 8; // 512-bit cache-line blocks
const BLOCK_BITS: u64 = (BLOCK_WORDS * 64) as u64;

/// Cache-line blocked Bloom filter over canonical k-mers
///
/// One hash selects a 512-bit block, double hashing drives the probes inside
/// it, so each query touches a single cache line.
pub struct BlockedBloomFilter {
    blocks: Vec<[u64; BLOCK_WORDS]>,
    nb_hashes: u32,
    hasher_block: DeterministicHasher,
    hasher_bits: DeterministicHasher,
}

impl BlockedBloomFilter {
    /// Size the filter for `n_items` keys at `bits_per_key` bits each
    pub fn new(n_items: usize, bits_per_key: usize, seed: u64) -> Self {
        let total_bits = (n_items.max(1) * bits_per_key.max(1)) as u64;
        let nb_blocks = total_bits.div_ceil(BLOCK_BITS).next_power_of_two() as usize;
        let nb_hashes = ((bits_per_key as f64 * std::f64::consts::LN_2).round() as u32).clamp(1, 16);

        Self {
            blocks: vec![[0u64; BLOCK_WORDS]; nb_blocks],
            nb_hashes,
            hasher_block: DeterministicHasher::new(seed),
            hasher_bits: DeterministicHasher::new(!seed),
        }
    }

    #[inline]
    fn locate(&self, km: &Kmer) -> (usize, u64, u64) {
        let rep = km.rep().bits();
        let block = (self.hasher_block.hash_u128(rep) as usize) & (self.blocks.len() - 1);
        let h = self.hasher_bits.hash_u128(rep);
        // Split one 64-bit hash into the two double-hashing strides
        let h1 = h & 0xFFFF_FFFF;
        let h2 = (h >> 32) | 1;
        (block, h1, h2)
    }

    /// Insert the canonical form of `km`
    pub fn insert(&mut self, km: &Kmer) {
        let (block, h1, h2) = self.locate(km);
        for i in 0..self.nb_hashes as u64 {
            let bit = (h1.wrapping_add(i.wrapping_mul(h2))) % BLOCK_BITS;
            self.blocks[block][(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// Number of blocks (for diagnostics)
    pub fn nb_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl KmerOracle for BlockedBloomFilter {
    fn contains(&self, km: &Kmer) -> bool {
        let (block, h1, h2) = self.locate(km);
        for i in 0..self.nb_hashes as u64 {
            let bit = (h1.wrapping_add(i.wrapping_mul(h2))) % BLOCK_BITS;
            if self.blocks[block][(bit / 64) as usize] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }
}

/// Exact membership oracle: a hash set of canonical k-mer bits
///
/// Reports no false positives, which makes graph shapes in tests exact.
#[derive(Default)]
pub struct ExactKmerSet {
    set: AHashSet<u128>,
}

impl ExactKmerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the canonical form of `km`
    pub fn insert(&mut self, km: &Kmer) {
        self.set.insert(km.rep().bits());
    }

    /// Number of distinct canonical k-mers
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// True when no k-mer was inserted
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl KmerOracle for ExactKmerSet {
    fn contains(&self, km: &Kmer) -> bool {
        self.set.contains(&km.rep().bits())
    }
}
