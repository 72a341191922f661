//! K-mer lookup: minimizer-guided search over the unitig containers
//!
//! The search consults the distinct minimizers of the query window in
//! positional order. A bin entry either references a unitig directly (short
//! or long, with the position of the minimizer occurrence) or is a
//! bookkeeping record: the abundant flag routes the query to the direct
//! k-mer table, the overcrowding flag re-routes it to the window's next
//! distinct minimizer. The first verified match wins.

use super::UnitigGraph;
use crate::constants::{MASK_UNITIG_POS, MASK_UNITIG_TYPE, RESERVED_ID};
use crate::kmer::Kmer;
use crate::minimizer::{MinimizerSpace, MinimizerWindow};
use crate::unitig::UnitigMap;

impl UnitigGraph {
    /// Locate the canonical form of `km`; empty result if absent
    pub fn find(&self, km: &Kmer) -> UnitigMap {
        self.find_extremities(km, false)
    }

    /// Locate `km`, optionally accepting only hits at a unitig end
    /// (offset 0 or `len(unitig) - k`)
    pub fn find_extremities(&self, km: &Kmer, extremities_only: bool) -> UnitigMap {
        let bytes = km.to_seq();
        let space = MinimizerSpace::new(&bytes, self.g(), self.min_hasher());
        let window = space.window(0, self.k());
        self.find_in_window(km, &window, extremities_only)
    }

    /// Locate `km` at position `pos` of a read whose minimizer hashes were
    /// precomputed into `space`
    pub fn find_in(&self, km: &Kmer, space: &MinimizerSpace, pos: usize) -> UnitigMap {
        let window = space.window(pos, self.k());
        self.find_in_window(km, &window, false)
    }

    fn find_in_window(
        &self,
        km: &Kmer,
        window: &MinimizerWindow<'_, '_>,
        extremities_only: bool,
    ) -> UnitigMap {
        let k = self.k();
        let diff = k - self.g();

        let km_twin = km.twin();
        let km_rep = if km.bits() < km_twin.bits() { *km } else { km_twin };

        let mut it_h = 0usize;

        for min_h_res in window.ties() {
            let mut mhr = min_h_res;
            let mut it = self.minimizer_bin(&window.minimizer(mhr.pos));

            while let Some(bucket) = it.take() {
                it_h = bucket;
                let v = self.hmap_min_unitigs.value_at(bucket);

                for &entry in v.iter() {
                    let unitig_id = (entry >> 32) as usize;

                    if unitig_id as u64 == RESERVED_ID {
                        if entry & RESERVED_ID != 0 {
                            // Abundant k-mers share this minimizer: probe directly
                            if let Some(b) = self.h_kmers.find(&km_rep) {
                                return UnitigMap::new(b, it_h, 0, 1, k, false, true, *km == km_rep);
                            }
                        }

                        if entry & MASK_UNITIG_TYPE != 0 {
                            // Overcrowded bin: re-route through the next
                            // distinct minimizer of the window
                            if let Some(next) = window.next_distinct(&mhr) {
                                mhr = next;
                                it = self.minimizer_bin(&window.minimizer(mhr.pos));
                            }
                        }
                    } else {
                        let is_short = entry & MASK_UNITIG_TYPE != 0;
                        let entry_pos = (entry & MASK_UNITIG_POS) as usize;

                        if is_short {
                            if min_h_res.pos == entry_pos {
                                if self.v_kmers[unitig_id].0 == km_rep {
                                    return UnitigMap::new(
                                        unitig_id, it_h, 0, 1, k, true, false, true,
                                    );
                                }
                            } else if entry_pos <= diff
                                && min_h_res.pos == diff - entry_pos
                                && self.v_kmers[unitig_id].0 == km_rep
                            {
                                return UnitigMap::new(unitig_id, it_h, 0, 1, k, true, false, false);
                            }
                        } else if let Some(unitig) = self.v_unitigs[unitig_id].as_deref() {
                            let len = (unitig.seq.len() - k) as i64;
                            let accept = |p: i64| {
                                p >= 0 && p <= len && (!extremities_only || p == 0 || p == len)
                            };

                            let pos_match = entry_pos as i64 - min_h_res.pos as i64;
                            if accept(pos_match)
                                && unitig.seq.compare_kmer(pos_match as usize, km)
                            {
                                return UnitigMap::new(
                                    unitig_id,
                                    it_h,
                                    pos_match as usize,
                                    1,
                                    len as usize + k,
                                    false,
                                    false,
                                    true,
                                );
                            }

                            let pos_match = entry_pos as i64 - diff as i64 + min_h_res.pos as i64;
                            if accept(pos_match)
                                && unitig.seq.compare_kmer(pos_match as usize, &km_twin)
                            {
                                return UnitigMap::new(
                                    unitig_id,
                                    it_h,
                                    pos_match as usize,
                                    1,
                                    len as usize + k,
                                    false,
                                    false,
                                    false,
                                );
                            }
                        }
                    }
                }
            }
        }

        UnitigMap::empty(it_h)
    }

    /// `find` plus jump-extension: advance the mapping along `read` (which
    /// holds `km` at `pos`) for as long as read and unitig agree
    pub fn find_unitig(&self, km: &Kmer, read: &[u8], pos: usize) -> UnitigMap {
        let cc = self.find(km);
        self.extend_mapping(cc, read, pos)
    }

    /// Preallocated-iterator variant of [`find_unitig`](Self::find_unitig)
    pub fn find_unitig_in(
        &self,
        km: &Kmer,
        read: &[u8],
        pos: usize,
        space: &MinimizerSpace,
    ) -> UnitigMap {
        let cc = self.find_in(km, space, pos);
        self.extend_mapping(cc, read, pos)
    }

    fn extend_mapping(&self, cc: UnitigMap, read: &[u8], pos: usize) -> UnitigMap {
        if !cc.is_long() {
            return cc;
        }

        let k = self.k();
        let seq = &self.long_unitig(cc.pos_unitig).seq;
        let mut km_dist = cc.dist;

        let jlen = if cc.strand {
            seq.jump(read, pos, cc.dist, false) - k + 1
        } else {
            // Forward read against the twin strand: walk the packed
            // sequence backwards from the far end of the anchor k-mer
            let j = seq.jump(read, pos, cc.dist + k - 1, true) - k + 1;
            km_dist -= j - 1;
            j
        };

        UnitigMap::new(cc.pos_unitig, cc.pos_min, km_dist, jlen, cc.size, false, false, cc.strand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::KmerScanner;

    #[test]
    fn test_find_reports_both_strands() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"ACGGATTTACG", 0);

        for (km, pos) in KmerScanner::new(b"ACGGATTTACG", 5) {
            let fwd = graph.find(&km);
            assert!(!fwd.is_empty);
            assert!(fwd.strand);
            assert_eq!(fwd.dist, pos);

            let rev = graph.find(&km.twin());
            assert!(!rev.is_empty);
            assert!(!rev.strand);
            assert_eq!(rev.dist, pos);
        }
    }

    #[test]
    fn test_find_unitig_jump_extends_forward() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"AAAAACCCCC", 0);

        let read = b"AAAAACCCCC";
        let km = Kmer::from_str("AAAAA").unwrap();
        let um = graph.find_unitig(&km, read, 0);

        assert!(!um.is_empty);
        assert_eq!(um.dist, 0);
        assert_eq!(um.len, 6);
        assert!(um.strand);
    }

    #[test]
    fn test_find_unitig_jump_extends_twin() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"AAAAACCCCC", 0);

        // Read on the opposite strand of the stored unitig
        let read = b"GGGGGTTTTT";
        let km = Kmer::from_sub_seq(&read[..5]).unwrap();
        let um = graph.find_unitig(&km, read, 0);

        assert!(!um.is_empty);
        assert!(!um.strand);
        assert_eq!(um.len, 6);
        assert_eq!(um.dist, 0);
    }

    #[test]
    fn test_find_unitig_jump_stops_at_mismatch() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"AAAAACCCCC", 0);

        let read = b"AAAAACCGGG";
        let km = Kmer::from_str("AAAAA").unwrap();
        let um = graph.find_unitig(&km, read, 0);

        // AAAAA, AAAAC, AAACC match; AACCG does not
        assert_eq!(um.len, 3);
    }

    #[test]
    fn test_find_in_matches_standalone_find() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"ACGGATTTACGCATG", 0);

        let read = b"ACGGATTTACGCATG";
        let space = MinimizerSpace::new(read, 3, graph.min_hasher());

        for (km, pos) in KmerScanner::new(read, 5) {
            let direct = graph.find(&km);
            let streamed = graph.find_in(&km, &space, pos);
            assert_eq!(direct.is_empty, streamed.is_empty, "k-mer at {}", pos);
            assert_eq!(direct.pos_unitig, streamed.pos_unitig);
            assert_eq!(direct.dist, streamed.dist);
            assert_eq!(direct.strand, streamed.strand);
        }
    }
}
