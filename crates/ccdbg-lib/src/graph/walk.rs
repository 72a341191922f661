//! Oracle-guided unitig discovery
//!
//! Starting from a k-mer known to the membership oracle, the walker extends
//! backward and forward one base at a time. A neighbor is accepted only when
//! it is the unique oracle-positive extension and, symmetrically, the
//! accepted neighbor sees a unique extension back; a spurious oracle
//! positive almost never survives both directions. Candidates rejected by
//! the symmetric check are recorded as suspected false-positive tips and
//! revisited by `check_fp_tips` once the graph is built.

use super::UnitigGraph;
use crate::encoding::decode_base;
use crate::kmer::{Kmer, KmerScanner};
use crate::oracle::KmerOracle;

/// Outcome of a single oracle step
pub(crate) struct BfStep {
    /// The step found exactly one surviving neighbor
    pub unique: bool,
    /// No oracle-positive neighbor at all (only meaningful when not unique)
    pub has_no_neighbor: bool,
    /// The accepted neighbor and its appended/prepended base, when the step
    /// ran with candidate checking and actually advanced
    pub next: Option<(Kmer, u8)>,
}

impl BfStep {
    fn stuck(has_no_neighbor: bool) -> Self {
        Self { unique: false, has_no_neighbor, next: None }
    }
}

impl UnitigGraph {
    /// One forward step from `end`. The step never advances back into
    /// `end` itself, so a homopolymer k-mer cannot walk in place.
    pub(crate) fn fw_step(
        &self,
        oracle: &dyn KmerOracle,
        end: &Kmer,
        check_fp_cand: bool,
        tips: &mut Vec<Kmer>,
    ) -> BfStep {
        let mut nb_neigh = 0usize;
        let mut j: Option<u8> = None;
        let mut pres_fw = [false; 4];

        for i in 0..4u8 {
            let cand = end.forward_base(i);
            // A k-mer that extends into itself (homopolymer period 1) is not
            // a neighbor; counting it would split every homopolymer run
            if cand == *end {
                continue;
            }
            if oracle.contains(&cand) {
                j = Some(i);
                pres_fw[i as usize] = true;
                nb_neigh += 1;
                if !check_fp_cand && nb_neigh >= 2 {
                    break;
                }
            }
        }

        let mut found_fp_fw = 0usize;

        if check_fp_cand && nb_neigh >= 2 {
            let mut j_tmp: Option<u8> = None;

            for i in 0..4u8 {
                if !pres_fw[i as usize] {
                    continue;
                }
                let km_fp = end.forward_base(i);

                // A false-positive candidate is isolated: no forward
                // continuation, and the backward direction is unique only
                // back to where we came from
                let fw = self.fw_step(oracle, &km_fp, false, tips);
                if fw.has_no_neighbor && self.bw_step(oracle, &km_fp, false, tips).unique {
                    found_fp_fw += 1;
                } else {
                    j_tmp = Some(i);
                    pres_fw[i as usize] = false;
                }
            }

            if found_fp_fw != 0 {
                if nb_neigh - found_fp_fw != 0 {
                    j = j_tmp;
                    nb_neigh -= found_fp_fw;
                } else {
                    found_fp_fw = 0;
                }
            }
        }

        if nb_neigh != 1 {
            return BfStep::stuck(nb_neigh == 0);
        }

        if !check_fp_cand {
            return BfStep { unique: true, has_no_neighbor: false, next: None };
        }

        // Symmetric check: the accepted neighbor must see a unique way back
        let j = j.expect("one neighbor survived");
        let fw = end.forward_base(j);

        let mut nb_back = 0usize;
        let mut pres_bw = [false; 4];
        for i in 0..4u8 {
            let cand = fw.backward_base(i);
            if cand == fw {
                continue;
            }
            if oracle.contains(&cand) {
                nb_back += 1;
                pres_bw[i as usize] = true;
            }
        }

        let mut found_fp_bw = 0usize;

        if nb_back >= 2 {
            for i in 0..4u8 {
                if !pres_bw[i as usize] {
                    continue;
                }
                let km_fp = fw.backward_base(i);

                let bw = self.bw_step(oracle, &km_fp, false, tips);
                if bw.has_no_neighbor && self.fw_step(oracle, &km_fp, false, tips).unique {
                    if km_fp != *end {
                        found_fp_bw += 1;
                    } else {
                        found_fp_bw = 0;
                        break;
                    }
                } else {
                    pres_bw[i as usize] = false;
                }
            }

            if found_fp_bw != 0 {
                if nb_back - found_fp_bw != 0 {
                    nb_back -= found_fp_bw;
                } else {
                    found_fp_bw = 0;
                }
            }
        }

        if nb_back != 1 {
            return BfStep::stuck(false);
        }

        for i in 0..4u8 {
            if found_fp_bw == 0 {
                break;
            }
            if pres_bw[i as usize] {
                tips.push(fw.backward_base(i).rep());
                found_fp_bw -= 1;
            }
        }
        for i in 0..4u8 {
            if found_fp_fw == 0 {
                break;
            }
            if pres_fw[i as usize] {
                tips.push(end.forward_base(i).rep());
                found_fp_fw -= 1;
            }
        }

        BfStep { unique: true, has_no_neighbor: false, next: Some((fw, j)) }
    }

    /// One backward step from `front`; mirror of [`fw_step`](Self::fw_step)
    pub(crate) fn bw_step(
        &self,
        oracle: &dyn KmerOracle,
        front: &Kmer,
        check_fp_cand: bool,
        tips: &mut Vec<Kmer>,
    ) -> BfStep {
        let mut nb_neigh = 0usize;
        let mut j: Option<u8> = None;
        let mut pres_bw = [false; 4];

        for i in 0..4u8 {
            let cand = front.backward_base(i);
            if cand == *front {
                continue;
            }
            if oracle.contains(&cand) {
                j = Some(i);
                pres_bw[i as usize] = true;
                nb_neigh += 1;
                if !check_fp_cand && nb_neigh >= 2 {
                    break;
                }
            }
        }

        let mut found_fp_bw = 0usize;

        if check_fp_cand && nb_neigh >= 2 {
            let mut j_tmp: Option<u8> = None;

            for i in 0..4u8 {
                if !pres_bw[i as usize] {
                    continue;
                }
                let km_fp = front.backward_base(i);

                let bw = self.bw_step(oracle, &km_fp, false, tips);
                if bw.has_no_neighbor && self.fw_step(oracle, &km_fp, false, tips).unique {
                    found_fp_bw += 1;
                } else {
                    j_tmp = Some(i);
                    pres_bw[i as usize] = false;
                }
            }

            if found_fp_bw != 0 {
                if nb_neigh - found_fp_bw != 0 {
                    j = j_tmp;
                    nb_neigh -= found_fp_bw;
                } else {
                    found_fp_bw = 0;
                }
            }
        }

        if nb_neigh != 1 {
            return BfStep::stuck(nb_neigh == 0);
        }

        if !check_fp_cand {
            return BfStep { unique: true, has_no_neighbor: false, next: None };
        }

        let j = j.expect("one neighbor survived");
        let bw = front.backward_base(j);

        let mut nb_fwd = 0usize;
        let mut pres_fw = [false; 4];
        for i in 0..4u8 {
            let cand = bw.forward_base(i);
            if cand == bw {
                continue;
            }
            if oracle.contains(&cand) {
                nb_fwd += 1;
                pres_fw[i as usize] = true;
            }
        }

        let mut found_fp_fw = 0usize;

        if nb_fwd >= 2 {
            for i in 0..4u8 {
                if !pres_fw[i as usize] {
                    continue;
                }
                let km_fp = bw.forward_base(i);

                let fw = self.fw_step(oracle, &km_fp, false, tips);
                if fw.has_no_neighbor && self.bw_step(oracle, &km_fp, false, tips).unique {
                    if km_fp != *front {
                        found_fp_fw += 1;
                    } else {
                        found_fp_fw = 0;
                        break;
                    }
                } else {
                    pres_fw[i as usize] = false;
                }
            }

            if found_fp_fw != 0 {
                if nb_fwd - found_fp_fw != 0 {
                    nb_fwd -= found_fp_fw;
                } else {
                    found_fp_fw = 0;
                }
            }
        }

        if nb_fwd != 1 {
            return BfStep::stuck(false);
        }

        for i in 0..4u8 {
            if found_fp_fw == 0 {
                break;
            }
            if pres_fw[i as usize] {
                tips.push(bw.forward_base(i).rep());
                found_fp_fw -= 1;
            }
        }
        for i in 0..4u8 {
            if found_fp_bw == 0 {
                break;
            }
            if pres_bw[i as usize] {
                tips.push(front.backward_base(i).rep());
                found_fp_bw -= 1;
            }
        }

        BfStep { unique: true, has_no_neighbor: false, next: Some((bw, j)) }
    }

    /// Walk out from `km` in both directions and return the maximal unitig
    /// sequence, whether the walk closed on itself, and whether `km` is
    /// isolated (no neighbor on either side)
    pub fn find_unitig_sequence(
        &self,
        oracle: &dyn KmerOracle,
        km: &Kmer,
        tips: &mut Vec<Kmer>,
    ) -> (Vec<u8>, bool, bool) {
        let twin = km.twin();

        let mut self_loop = false;
        let mut is_isolated = false;

        let mut fw_s = Vec::new();
        let mut end = *km;
        let mut last = end;
        let mut steps = 0usize;

        loop {
            let st = self.fw_step(oracle, &end, true, tips);
            let Some((next, base)) = st.next else {
                is_isolated = steps == 0 && st.has_no_neighbor;
                break;
            };

            steps += 1;
            if next == *km {
                self_loop = true;
                break;
            }
            if next == twin || next == last.twin() {
                break;
            }
            fw_s.push(decode_base(base));
            last = next;
            end = next;
        }

        let mut bw_s = Vec::new();

        if !self_loop {
            let mut front = *km;
            let mut first = front;
            let mut bw_no_neighbor = false;
            steps = 0;

            loop {
                let st = self.bw_step(oracle, &front, true, tips);
                let Some((next, base)) = st.next else {
                    bw_no_neighbor = st.has_no_neighbor;
                    break;
                };

                steps += 1;
                if next == *km {
                    self_loop = true;
                    break;
                }
                if next == twin || next == first.twin() {
                    break;
                }
                bw_s.push(decode_base(base));
                first = next;
                front = next;
            }

            if is_isolated {
                is_isolated = steps == 0 && bw_no_neighbor;
            }

            bw_s.reverse();
        }

        let mut s = Vec::with_capacity(bw_s.len() + self.k() + fw_s.len());
        s.extend_from_slice(&bw_s);
        km.write_seq(&mut s);
        s.extend_from_slice(&fw_s);

        (s, self_loop, is_isolated)
    }

    /// Insert the unitig containing `km` (which the oracle reports present)
    /// and cover the k-mers observed in `read` at `pos`.
    ///
    /// Returns false when the k-mer could not be mapped after insertion.
    pub fn add_unitig_sequence(
        &mut self,
        oracle: &dyn KmerOracle,
        km: &Kmer,
        read: &[u8],
        pos: usize,
        seq: Option<&[u8]>,
        tips: &mut Vec<Kmer>,
    ) -> bool {
        let k = self.k();

        let (s, self_loop) = match seq {
            Some(s) => (s.to_vec(), false),
            None => {
                let (s, self_loop, _isolated) = self.find_unitig_sequence(oracle, km, tips);
                (s, self_loop)
            }
        };

        if self_loop {
            // A closed walk: either some of its k-mers are already indexed
            // (cover them), or the whole loop becomes one unitig
            let mut found_any = false;
            for (km_i, _) in KmerScanner::new(&s, k) {
                let cm = self.find(&km_i);
                if !cm.is_empty {
                    self.map_read(&cm);
                    found_any = true;
                }
            }

            if !found_any {
                let id = if s.len() == k { self.v_kmers.len() } else { self.v_unitigs.len() };
                self.add_unitig(&s, id);
                for (km_i, _) in KmerScanner::new(&s, k) {
                    let cm = self.find(&km_i);
                    self.map_read(&cm);
                }
            }

            return true;
        }

        let mut cm = self.find_unitig(km, read, pos);

        if cm.is_empty {
            let id = if s.len() == k { self.v_kmers.len() } else { self.v_unitigs.len() };
            self.add_unitig(&s, id);
            cm = self.find_unitig(km, read, pos);
        }

        self.map_read(&cm);

        !cm.is_empty
    }
}
