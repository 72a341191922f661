//! The unitig graph: minimizer index, unitig containers and mutation kernel
//!
//! Three containers partition the unitigs: `v_unitigs` holds long unitigs
//! (more than one k-mer, tombstoned with `None` on delete so ids referenced
//! from minimizer bins stay stable), `v_kmers` holds short unitigs (exactly
//! one k-mer, tombstoned with the deleted sentinel key), and `h_kmers` holds
//! abundant unitigs (one k-mer whose minimizer bin saturated), addressed by
//! their table bucket.
//!
//! The index maps every minimizer to a small list of 64-bit entries
//! `(unitig_id | type_flag | position)`; entries with the reserved id are
//! bookkeeping records carrying the abundant reference count and the
//! overcrowding flag. Every lookup and every structural mutation walks the
//! distinct minimizers of the affected windows and keeps bins and containers
//! in lockstep.

mod find;
mod gfa;
mod mutate;
mod sweep;
mod walk;

use crate::compressed_coverage::CompressedCoverage;
use crate::constants::{
    DEFAULT_MAX_ABUNDANCE_LIM, DEFAULT_MIN_ABUNDANCE_LIM, DEFAULT_SEED,
};
use crate::hasher::DeterministicHasher;
use crate::kmer::{Kmer, Minimizer};
use crate::kmer_hash_table::KmerHashTable;
use crate::unitig::{Unitig, UnitigMap};

use smallvec::SmallVec;

/// Entry list attached to one minimizer
pub type BinList = SmallVec<[u64; 8]>;

/// The compacted de Bruijn graph over canonical k-mers
pub struct UnitigGraph {
    k: usize,
    g: usize,

    /// Long unitigs; `None` marks a tombstoned slot
    pub(crate) v_unitigs: Vec<Option<Box<Unitig>>>,
    /// Short unitigs; a deleted-sentinel key marks a tombstoned slot
    pub(crate) v_kmers: Vec<(Kmer, CompressedCoverage)>,
    /// Abundant unitigs, addressed by bucket
    pub(crate) h_kmers: KmerHashTable<CompressedCoverage>,
    /// Minimizer bins
    pub(crate) hmap_min_unitigs: KmerHashTable<BinList>,

    pub(crate) min_abundance_lim: usize,
    pub(crate) max_abundance_lim: usize,
    pub(crate) hasher: DeterministicHasher,
}

impl UnitigGraph {
    /// Create an empty graph for the given k-mer and minimizer lengths
    pub fn new(k: usize, g: usize) -> Self {
        Self::with_limits(k, g, DEFAULT_MIN_ABUNDANCE_LIM, DEFAULT_MAX_ABUNDANCE_LIM)
    }

    /// Create an empty graph with explicit abundance limits
    pub fn with_limits(
        k: usize,
        g: usize,
        min_abundance_lim: usize,
        max_abundance_lim: usize,
    ) -> Self {
        assert!(crate::constants::is_valid_k(k), "invalid k = {}", k);
        assert!(crate::constants::is_valid_g(g, k), "invalid g = {} for k = {}", g, k);

        Self {
            k,
            g,
            v_unitigs: Vec::new(),
            v_kmers: Vec::new(),
            h_kmers: KmerHashTable::new(DEFAULT_SEED.wrapping_add(1)),
            hmap_min_unitigs: KmerHashTable::new(DEFAULT_SEED.wrapping_add(2)),
            min_abundance_lim,
            max_abundance_lim,
            hasher: DeterministicHasher::new(DEFAULT_SEED),
        }
    }

    /// K-mer length
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Minimizer length
    #[inline]
    pub fn g(&self) -> usize {
        self.g
    }

    /// The minimizer hasher shared by every index operation
    #[inline]
    pub(crate) fn min_hasher(&self) -> &DeterministicHasher {
        &self.hasher
    }

    /// Number of long unitigs (live slots)
    pub fn n_long(&self) -> usize {
        self.v_unitigs.len()
    }

    /// Number of short unitigs (live slots)
    pub fn n_short(&self) -> usize {
        self.v_kmers.len()
    }

    /// Number of abundant unitigs
    pub fn n_abundant(&self) -> usize {
        self.h_kmers.len()
    }

    /// Total number of unitigs across the three containers
    pub fn unitig_count(&self) -> usize {
        self.n_long() + self.n_short() + self.n_abundant()
    }

    /// Drop every unitig and every bin
    pub fn clear(&mut self) {
        self.v_unitigs.clear();
        self.v_kmers.clear();
        self.h_kmers.clear();
        self.hmap_min_unitigs.clear();
    }

    /// Long unitig by id; panics on a tombstoned slot
    #[inline]
    pub fn long_unitig(&self, id: usize) -> &Unitig {
        self.v_unitigs[id].as_deref().expect("live long unitig")
    }

    #[inline]
    pub(crate) fn long_unitig_mut(&mut self, id: usize) -> &mut Unitig {
        self.v_unitigs[id].as_deref_mut().expect("live long unitig")
    }

    /// Canonical k-mer of a short unitig by id
    #[inline]
    pub fn short_kmer(&self, id: usize) -> &Kmer {
        &self.v_kmers[id].0
    }

    /// Canonical k-mer of an abundant unitig by bucket
    #[inline]
    pub fn abundant_kmer(&self, bucket: usize) -> &Kmer {
        self.h_kmers.key_at(bucket)
    }

    /// Buckets of all abundant unitigs, in bucket order
    pub fn abundant_buckets(&self) -> Vec<usize> {
        self.h_kmers.buckets()
    }

    /// The head (first) k-mer of the unitig a mapping points into
    pub(crate) fn mapped_head_kmer(&self, um: &UnitigMap) -> Kmer {
        if um.is_short {
            self.v_kmers[um.pos_unitig].0
        } else if um.is_abundant {
            *self.h_kmers.key_at(um.pos_unitig)
        } else {
            self.long_unitig(um.pos_unitig).head_kmer(self.k)
        }
    }

    /// Record one read mapping: bump coverage over the mapped k-mer range
    pub fn map_read(&mut self, cc: &UnitigMap) {
        if cc.is_empty {
            return;
        }

        let (start, end) = (cc.dist, cc.dist + cc.len - 1);
        if cc.is_short {
            self.v_kmers[cc.pos_unitig].1.cover(start, end);
        } else if cc.is_abundant {
            self.h_kmers.value_at_mut(cc.pos_unitig).cover(start, end);
        } else {
            let unitig = self.long_unitig_mut(cc.pos_unitig);
            unitig.ccov.cover(start, end);
            unitig.coveragesum += cc.len as u64;
        }
    }

    /// Decode the sequence a mapping refers to, honoring its strand
    pub fn mapped_sequence(&self, um: &UnitigMap) -> Vec<u8> {
        let km = if um.is_short {
            self.v_kmers[um.pos_unitig].0
        } else if um.is_abundant {
            *self.h_kmers.key_at(um.pos_unitig)
        } else {
            let seq = &self.long_unitig(um.pos_unitig).seq;
            return if um.strand { seq.to_seq() } else { seq.rev().to_seq() };
        };
        if um.strand { km.to_seq() } else { km.twin().to_seq() }
    }

    pub(crate) fn minimizer_bin(&self, minz: &Minimizer) -> Option<usize> {
        self.hmap_min_unitigs.find(minz)
    }

    /// Number of live minimizer bins (diagnostics)
    pub fn nb_minimizer_bins(&self) -> usize {
        self.hmap_min_unitigs.len()
    }
}
