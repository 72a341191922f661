//! Unitig storage types and the mapping record returned by lookups
//!
//! A unitig lives in exactly one of three containers, chosen by its k-mer
//! count and the state of its minimizer bins: long (packed sequence +
//! per-k-mer coverage), short (a single canonical k-mer), or abundant (a
//! single canonical k-mer indexed by direct k-mer hash because its minimizer
//! bin saturated). [`UnitigMap`] carries the container discriminant
//! explicitly, so callers never chase a pointer to learn what they hit.

use crate::compressed_coverage::CompressedCoverage;
use crate::compressed_sequence::CompressedSequence;
use crate::encoding::EncodingError;
use crate::kmer::Kmer;

/// A long unitig: more than one k-mer
#[derive(Clone, Debug)]
pub struct Unitig {
    /// Packed sequence, length >= k + 1
    pub seq: CompressedSequence,
    /// Per-k-mer saturating coverage
    pub ccov: CompressedCoverage,
    /// Sum of per-k-mer coverages over the unitig's lifetime
    pub coveragesum: u64,
}

impl Unitig {
    /// Pack a new unitig from its ACGT sequence
    pub fn new(seq: &[u8], k: usize) -> Result<Self, EncodingError> {
        let seq = CompressedSequence::from_seq(seq)?;
        let ccov = CompressedCoverage::new(seq.num_kmers(k));
        Ok(Self { seq, ccov, coveragesum: 0 })
    }

    /// Number of k-mers
    #[inline]
    pub fn num_kmers(&self, k: usize) -> usize {
        self.seq.num_kmers(k)
    }

    /// Reset coverage, either to zero or fully saturated
    pub fn initialize_coverage(&mut self, full: bool) {
        self.ccov = CompressedCoverage::new(self.ccov.size());
        if full {
            self.ccov.set_full();
        }
    }

    /// First k-mer of the sequence
    #[inline]
    pub fn head_kmer(&self, k: usize) -> Kmer {
        self.seq.get_kmer(0, k)
    }

    /// Last k-mer of the sequence
    #[inline]
    pub fn tail_kmer(&self, k: usize) -> Kmer {
        self.seq.get_kmer(self.seq.len() - k, k)
    }
}

/// Result of a k-mer lookup: which unitig, where, and in which orientation
///
/// `len` is the number of consecutive k-mers mapped (1 from a plain `find`,
/// possibly more after jump-extension); `dist` is the offset of the first
/// mapped k-mer within the unitig; `size` is the unitig length in bases.
/// `pos_min` is the bucket of the last minimizer bin consulted, kept as a
/// probe hint even on an empty result.
#[derive(Clone, Copy, Debug)]
pub struct UnitigMap {
    /// Unitig id: vector index (long/short) or table bucket (abundant)
    pub pos_unitig: usize,
    /// Bucket of the last minimizer bin consulted
    pub pos_min: usize,
    /// Offset of the first mapped k-mer within the unitig
    pub dist: usize,
    /// Number of consecutive mapped k-mers
    pub len: usize,
    /// Unitig length in bases
    pub size: usize,
    /// Container discriminant: short
    pub is_short: bool,
    /// Container discriminant: abundant
    pub is_abundant: bool,
    /// True when the k-mer matched the stored orientation
    pub strand: bool,
    /// True when nothing matched
    pub is_empty: bool,
}

impl UnitigMap {
    /// An empty mapping, keeping the last-consulted bin as a hint
    pub fn empty(pos_min: usize) -> Self {
        Self {
            pos_unitig: 0,
            pos_min,
            dist: 0,
            len: 0,
            size: 0,
            is_short: false,
            is_abundant: false,
            strand: true,
            is_empty: true,
        }
    }

    /// A non-empty mapping
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pos_unitig: usize,
        pos_min: usize,
        dist: usize,
        len: usize,
        size: usize,
        is_short: bool,
        is_abundant: bool,
        strand: bool,
    ) -> Self {
        Self {
            pos_unitig,
            pos_min,
            dist,
            len,
            size,
            is_short,
            is_abundant,
            strand,
            is_empty: false,
        }
    }

    /// True for a hit in the long-unitig container
    #[inline]
    pub fn is_long(&self) -> bool {
        !self.is_empty && !self.is_short && !self.is_abundant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unitig_new() {
        let u = Unitig::new(b"AAAAACCCCC", 5).unwrap();
        assert_eq!(u.seq.len(), 10);
        assert_eq!(u.num_kmers(5), 6);
        assert_eq!(u.ccov.size(), 6);
        assert_eq!(u.coveragesum, 0);
        assert_eq!(u.head_kmer(5).to_string(), "AAAAA");
        assert_eq!(u.tail_kmer(5).to_string(), "CCCCC");
    }

    #[test]
    fn test_initialize_coverage_full() {
        let mut u = Unitig::new(b"AAAAACCCCC", 5).unwrap();
        u.ccov.cover(0, 2);
        u.initialize_coverage(true);
        assert_eq!(u.ccov.size(), 6);
        assert!(u.ccov.is_full());

        u.initialize_coverage(false);
        assert_eq!(u.ccov.size(), 6);
        assert!(!u.ccov.is_full());
        assert_eq!(u.ccov.cov_at(0), 0);
    }

    #[test]
    fn test_unitig_map_discriminant() {
        let empty = UnitigMap::empty(7);
        assert!(empty.is_empty);
        assert!(!empty.is_long());
        assert_eq!(empty.pos_min, 7);

        let long = UnitigMap::new(0, 0, 2, 3, 10, false, false, true);
        assert!(long.is_long());

        let short = UnitigMap::new(0, 0, 0, 1, 5, true, false, true);
        assert!(!short.is_long());
        assert!(short.is_short);
    }
}
