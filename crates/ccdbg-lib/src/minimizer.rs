//! Minimizer extraction over strings and k-mer windows
//!
//! A minimizer is the canonical g-mer whose seeded hash is minimal within a
//! k-long window. [`MinimizerSpace`] precomputes the canonical g-mer hash at
//! every position of a string once, so that sliding k-mer windows, tie
//! enumeration and the next-distinct-minimizer fallback (used when a bin is
//! overcrowded) are all O(k - g) slice scans with no re-hashing.
//!
//! Positions reported by a window are relative to the window start; the
//! unitig index stores absolute positions, which callers derive by adding the
//! window start back.

use crate::hasher::DeterministicHasher;
use crate::kmer::{Kmer, Minimizer};

/// A minimizer hit inside a k-mer window: seeded hash and relative position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinHashResult {
    /// Seeded hash of the canonical g-mer
    pub hash: u64,
    /// Position of the g-mer, relative to the window start
    pub pos: usize,
}

/// Precomputed canonical g-mer hashes for every position of one string
pub struct MinimizerSpace<'a> {
    seq: &'a [u8],
    g: usize,
    hashes: Vec<u64>,
}

impl<'a> MinimizerSpace<'a> {
    /// Precompute hashes for `seq`; `seq` must be ACGT-only
    pub fn new(seq: &'a [u8], g: usize, hasher: &DeterministicHasher) -> Self {
        let n = if seq.len() >= g { seq.len() - g + 1 } else { 0 };
        let mut hashes = Vec::with_capacity(n);

        if n > 0 {
            let mut gmer = Kmer::from_sub_seq(&seq[..g]).expect("ACGT-only input");
            hashes.push(hasher.hash_u128(gmer.rep().bits()));

            for p in 1..n {
                let base = crate::encoding::encode_base(seq[p + g - 1]).expect("ACGT-only input");
                gmer = gmer.forward_base(base);
                hashes.push(hasher.hash_u128(gmer.rep().bits()));
            }
        }

        Self { seq, g, hashes }
    }

    /// The minimizer length
    #[inline]
    pub fn g(&self) -> usize {
        self.g
    }

    /// The canonical g-mer starting at absolute position `pos`
    #[inline]
    pub fn minimizer_at(&self, pos: usize) -> Minimizer {
        Kmer::from_sub_seq(&self.seq[pos..pos + self.g])
            .expect("ACGT-only input")
            .rep()
    }

    /// The k-mer window starting at absolute position `start`
    #[inline]
    pub fn window(&self, start: usize, k: usize) -> MinimizerWindow<'_, 'a> {
        debug_assert!(start + k <= self.seq.len());
        MinimizerWindow { space: self, start, k }
    }
}

/// One k-long window of a [`MinimizerSpace`]
#[derive(Clone, Copy)]
pub struct MinimizerWindow<'s, 'a> {
    space: &'s MinimizerSpace<'a>,
    start: usize,
    k: usize,
}

impl<'s, 'a> MinimizerWindow<'s, 'a> {
    /// Absolute start position of the window
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    fn hashes(&self) -> &[u64] {
        let n = self.k - self.space.g + 1;
        &self.space.hashes[self.start..self.start + n]
    }

    /// The leftmost minimal g-mer of the window
    pub fn min(&self) -> MinHashResult {
        let mut best = MinHashResult { hash: u64::MAX, pos: 0 };
        for (pos, &hash) in self.hashes().iter().enumerate() {
            if hash < best.hash {
                best = MinHashResult { hash, pos };
            }
        }
        best
    }

    /// All positions of the minimal g-mer, left to right
    pub fn ties(&self) -> impl Iterator<Item = MinHashResult> + '_ {
        let min_hash = self.min().hash;
        self.hashes()
            .iter()
            .enumerate()
            .filter(move |(_, &h)| h == min_hash)
            .map(move |(pos, &h)| MinHashResult { hash: h, pos })
    }

    /// The next distinct minimizer: leftmost occurrence of the smallest hash
    /// strictly greater than `cur.hash`, or None when `cur` was already the
    /// largest distinct g-mer hash in the window
    pub fn next_distinct(&self, cur: &MinHashResult) -> Option<MinHashResult> {
        let mut best: Option<MinHashResult> = None;
        for (pos, &hash) in self.hashes().iter().enumerate() {
            if hash > cur.hash && best.map_or(true, |b| hash < b.hash) {
                best = Some(MinHashResult { hash, pos });
            }
        }
        best
    }

    /// The canonical g-mer at window-relative position `pos`
    #[inline]
    pub fn minimizer(&self, pos: usize) -> Minimizer {
        self.space.minimizer_at(self.start + pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_SEED;

    fn space<'a>(seq: &'a [u8], g: usize) -> MinimizerSpace<'a> {
        MinimizerSpace::new(seq, g, &DeterministicHasher::new(DEFAULT_SEED))
    }

    #[test]
    fn test_window_min_matches_exhaustive_scan() {
        let seq = b"ATTTTCAGGATGTTTTCAGGTTCATCATCTCC";
        let (k, g) = (15, 7);
        let hasher = DeterministicHasher::new(DEFAULT_SEED);
        let sp = space(seq, g);

        for start in 0..=(seq.len() - k) {
            let win = sp.window(start, k);
            let min = win.min();

            let mut best = u64::MAX;
            let mut best_pos = 0;
            for p in 0..=(k - g) {
                let gm = Kmer::from_sub_seq(&seq[start + p..start + p + g]).unwrap().rep();
                let h = hasher.hash_u128(gm.bits());
                if h < best {
                    best = h;
                    best_pos = p;
                }
            }
            assert_eq!(min.hash, best, "window at {}", start);
            assert_eq!(min.pos, best_pos, "window at {}", start);
        }
    }

    #[test]
    fn test_fresh_vs_embedded_window_agree() {
        // The minimizer of a k-mer must not depend on whether the k-mer is
        // hashed standalone or as a window of a longer string.
        let seq = b"ACGTTGCAACGTGGCATTACGGATTTACGGAT";
        let (k, g) = (11, 5);
        let sp = space(seq, g);

        for start in 0..=(seq.len() - k) {
            let embedded = sp.window(start, k).min();

            let kmer_bytes = &seq[start..start + k];
            let fresh_sp = space(kmer_bytes, g);
            let fresh = fresh_sp.window(0, k).min();

            assert_eq!(embedded.hash, fresh.hash, "k-mer at {}", start);
            assert_eq!(embedded.pos, fresh.pos, "k-mer at {}", start);
        }
    }

    #[test]
    fn test_strand_symmetric_hashes() {
        // A g-mer and its twin hash identically, so a k-mer and its twin
        // share the same minimizer hash (at mirrored positions).
        let (k, g) = (9, 3);
        let fwd = b"ACGGATTTA";
        let rc: Vec<u8> = Kmer::from_sub_seq(fwd).unwrap().twin().to_seq();

        let sp_fwd = space(fwd, g);
        let sp_rc = space(&rc, g);
        let min_fwd = sp_fwd.window(0, k).min();
        let min_rc = sp_rc.window(0, k).min();

        assert_eq!(min_fwd.hash, min_rc.hash);
        assert_eq!(min_rc.pos, k - g - min_fwd.pos);
    }

    #[test]
    fn test_ties_are_positional() {
        // AAAAAAA: every g-mer is AAA, so every position ties
        let seq = b"AAAAAAA";
        let sp = space(seq, 3);
        let win = sp.window(0, 7);
        let ties: Vec<_> = win.ties().collect();
        assert_eq!(ties.len(), 5);
        for (i, t) in ties.iter().enumerate() {
            assert_eq!(t.pos, i);
            assert_eq!(t.hash, win.min().hash);
        }
    }

    #[test]
    fn test_next_distinct_walks_up_the_hash_order() {
        let seq = b"ACGTTGCAACGTGGCA";
        let sp = space(seq, 5);
        let win = sp.window(0, 11);

        let mut cur = win.min();
        let mut seen = vec![cur.hash];
        while let Some(next) = win.next_distinct(&cur) {
            assert!(next.hash > cur.hash);
            seen.push(next.hash);
            cur = next;
        }

        // All distinct hashes of the window were visited, in order
        let mut expect: Vec<u64> = win.hashes().to_vec();
        expect.sort_unstable();
        expect.dedup();
        assert_eq!(seen, expect);
    }

    #[test]
    fn test_short_string_has_no_positions() {
        let sp = space(b"AC", 3);
        assert!(sp.hashes.is_empty());
    }
}
