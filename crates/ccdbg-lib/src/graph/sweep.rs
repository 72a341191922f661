//! Cleanup passes over the whole graph
//!
//! `split_all_unitigs` excises coverage holes so that every surviving unitig
//! is uniformly saturated; `join_all_unitigs` concatenates unitig ends whose
//! extension is unique in both directions; `check_fp_tips` re-attaches
//! suspected false-positive tips that turned out to be real; and
//! `remove_unitigs` drops isolated stubs and clips one-sided tips.
//!
//! All passes compact the containers by swapping condemned slots against the
//! live tail and truncating once at the end, so ids referenced from minimizer
//! bins stay valid throughout.

use super::UnitigGraph;
use crate::compressed_coverage::CompressedCoverage;
use crate::constants::DEFAULT_SEED;
use crate::kmer::Kmer;
use crate::kmer_hash_table::KmerHashTable;
use crate::unitig::UnitigMap;

impl UnitigGraph {
    /// Excise every coverage hole. Unitigs with sub-full coverage are split
    /// into their saturated runs (or deleted outright); afterwards every
    /// unitig has uniform full coverage. Returns `(split, deleted)` counts.
    pub fn split_all_unitigs(&mut self) -> (usize, usize) {
        let mut split = 0usize;
        let mut deleted = 0usize;

        for h in self.h_kmers.buckets() {
            if !self.h_kmers.value_at(h).is_full() {
                self.delete_unitig(false, true, h);
                deleted += 1;
            }
        }

        let mut v_kmers_sz = self.v_kmers.len();
        let mut i = 0usize;
        while i < v_kmers_sz {
            if !self.v_kmers[i].1.is_full() {
                v_kmers_sz -= 1;
                if i != v_kmers_sz {
                    self.swap_unitigs(true, i, v_kmers_sz);
                }
                self.delete_unitig(true, false, v_kmers_sz);
                deleted += 1;
            } else {
                i += 1;
            }
        }

        let mut v_unitigs_sz = self.v_unitigs.len();
        let mut nxt_pos_insert = self.v_unitigs.len();
        let mut pos = 0usize;
        while pos < v_unitigs_sz {
            if self.long_unitig(pos).ccov.is_full() {
                pos += 1;
                continue;
            }

            let sp = self.long_unitig(pos).ccov.splitting_vector();
            if self.split_unitig(&mut pos, &mut nxt_pos_insert, &mut v_unitigs_sz, &mut v_kmers_sz, &sp)
            {
                deleted += 1;
            } else {
                split += 1;
            }
        }

        if nxt_pos_insert < self.v_unitigs.len() {
            self.v_unitigs.truncate(nxt_pos_insert);
        }
        if v_kmers_sz < self.v_kmers.len() {
            self.v_kmers.truncate(v_kmers_sz);
        }

        (split, deleted)
    }

    /// Replace the long unitig at `*pos_v_unitigs` by the k-mer ranges in
    /// `sp`. The first long range reuses the slot; further ranges append at
    /// `*nxt_pos_insert`; length-k ranges go to the short/abundant
    /// containers. With no ranges the unitig is deleted and the slot swapped
    /// against the tail. Returns true when the unitig was deleted entirely.
    pub(crate) fn split_unitig(
        &mut self,
        pos_v_unitigs: &mut usize,
        nxt_pos_insert: &mut usize,
        v_unitigs_sz: &mut usize,
        v_kmers_sz: &mut usize,
        sp: &[(usize, usize)],
    ) -> bool {
        let k = self.k();
        let mut first_long_unitig = true;
        let mut deleted = true;

        if !sp.is_empty() {
            let (str_full, totalcoverage, denom) = {
                let unitig = self.long_unitig(*pos_v_unitigs);
                let (low_count, low_sum) = unitig.ccov.low_coverage_info();
                (
                    unitig.seq.to_seq(),
                    unitig.coveragesum.saturating_sub(low_sum),
                    (unitig.ccov.size() - low_count).max(1) as u64,
                )
            };

            for &(start, end) in sp {
                let len = end - start;
                let split_str = &str_full[start..start + len + k - 1];
                let cov_tmp = totalcoverage * len as u64 / denom;

                if split_str.len() == k {
                    if self.add_unitig(split_str, *v_kmers_sz) {
                        let rep = Kmer::from_sub_seq(split_str).expect("packed ACGT").rep();
                        self.h_kmers
                            .get_mut(&rep)
                            .expect("abundant unitig just inserted")
                            .set_full();
                    } else {
                        self.v_kmers[*v_kmers_sz].1.set_full();
                        *v_kmers_sz += 1;
                    }
                } else if first_long_unitig {
                    // Reuse the parent slot for the first long fragment
                    self.delete_unitig(false, false, *pos_v_unitigs);
                    self.add_unitig(split_str, *pos_v_unitigs);

                    let unitig = self.long_unitig_mut(*pos_v_unitigs);
                    unitig.initialize_coverage(true);
                    unitig.coveragesum = cov_tmp;

                    first_long_unitig = false;
                } else {
                    self.add_unitig(split_str, *nxt_pos_insert);

                    let unitig = self.long_unitig_mut(*nxt_pos_insert);
                    unitig.initialize_coverage(true);
                    unitig.coveragesum = cov_tmp;

                    *nxt_pos_insert += 1;
                }
            }

            deleted = false;
        }

        if first_long_unitig {
            // No long fragment reused the slot: retire it
            *nxt_pos_insert -= 1;

            if *pos_v_unitigs != *nxt_pos_insert {
                self.swap_unitigs(false, *pos_v_unitigs, *nxt_pos_insert);

                // A fragment swapped in from past the original range must
                // not be split again
                if *nxt_pos_insert >= *v_unitigs_sz {
                    *pos_v_unitigs += 1;
                } else {
                    *v_unitigs_sz -= 1;
                }
            } else {
                *v_unitigs_sz -= 1;
            }

            self.delete_unitig(false, false, *nxt_pos_insert);
        } else {
            *pos_v_unitigs += 1;
        }

        deleted
    }

    /// Candidate pairing for a join at end `a` of the unitig mapped by
    /// `cm_a`: exactly one graph neighbor `b` ahead of `a`, itself with a
    /// unique neighbor looking back, on a different unitig. Returns the
    /// partner end k-mer.
    fn check_join(&self, a: &Kmer, cm_a: &UnitigMap) -> Option<Kmer> {
        let k = self.k();

        let mut fw_count = 0usize;
        let mut fw_cand = Kmer::empty_key();
        let mut cm_cand = UnitigMap::empty(0);

        for i in 0..4u8 {
            let fw = a.forward_base(i);
            let cm_tmp = self.find_extremities(&fw, true);
            if !cm_tmp.is_empty {
                fw_count += 1;
                if fw_count > 1 {
                    break;
                }
                fw_cand = fw;
                cm_cand = cm_tmp;
            }
        }

        if fw_count != 1 {
            return None;
        }

        let cand_head = self.mapped_head_kmer(&cm_cand);
        let ac_head = self.mapped_head_kmer(cm_a);
        if cand_head == ac_head {
            // Hairpin, loop or mobius loop: never joined with itself
            return None;
        }

        let fw_cpy = fw_cand.twin();
        let mut bw_count = 0usize;

        for j in 0..4u8 {
            let bw = fw_cpy.forward_base(j);
            if !self.find_extremities(&bw, true).is_empty {
                bw_count += 1;
                if bw_count > 1 {
                    break;
                }
            }
        }

        if bw_count != 1 {
            return None;
        }

        if cand_head == fw_cand {
            return Some(fw_cand);
        }

        let cand_last = if cm_cand.is_short || cm_cand.is_abundant {
            cand_head
        } else {
            self.long_unitig(cm_cand.pos_unitig).tail_kmer(k)
        };
        if cand_last.twin() == fw_cand {
            return Some(fw_cand);
        }

        // The candidate resolved to the middle of a unitig on neither
        // orientation; there is no end to join onto
        None
    }

    /// Join every unitig pair whose facing ends extend uniquely into each
    /// other. With `v_joins`, only the listed end k-mers are considered
    /// (the list is drained). Returns the number of joins performed.
    pub fn join_all_unitigs(&mut self, v_joins: Option<&mut Vec<Kmer>>) -> usize {
        let k = self.k();
        let mut joined = 0usize;
        let mut v_unitigs_size = self.v_unitigs.len();
        let mut v_kmers_size = self.v_kmers.len();

        // Map "potential right-extension k-mer of end a" -> a
        let mut joins: KmerHashTable<Kmer> = KmerHashTable::new(DEFAULT_SEED.wrapping_add(3));

        match v_joins {
            None => {
                for h in self.h_kmers.buckets() {
                    let tail = *self.h_kmers.key_at(h);
                    let head_twin = tail.twin();
                    let cm = UnitigMap::new(h, 0, 0, 1, k, false, true, true);

                    if joins.find(&tail).is_none() {
                        if let Some(fw) = self.check_join(&tail, &cm) {
                            joins.insert(fw.twin(), tail);
                        }
                    }
                    if joins.find(&head_twin).is_none() {
                        if let Some(bw) = self.check_join(&head_twin, &cm) {
                            joins.insert(bw.twin(), head_twin);
                        }
                    }
                }

                for i in 0..v_kmers_size {
                    let tail = self.v_kmers[i].0;
                    let head_twin = tail.twin();
                    let cm = UnitigMap::new(i, 0, 0, 1, k, true, false, true);

                    if joins.find(&tail).is_none() {
                        if let Some(fw) = self.check_join(&tail, &cm) {
                            joins.insert(fw.twin(), tail);
                        }
                    }
                    if joins.find(&head_twin).is_none() {
                        if let Some(bw) = self.check_join(&head_twin, &cm) {
                            joins.insert(bw.twin(), head_twin);
                        }
                    }
                }

                for i in 0..v_unitigs_size {
                    let (head_twin, tail, size) = {
                        let unitig = self.long_unitig(i);
                        (unitig.head_kmer(k).twin(), unitig.tail_kmer(k), unitig.seq.len())
                    };
                    let cm = UnitigMap::new(i, 0, 0, 1, size, false, false, true);

                    if joins.find(&tail).is_none() {
                        if let Some(fw) = self.check_join(&tail, &cm) {
                            joins.insert(fw.twin(), tail);
                        }
                    }
                    if joins.find(&head_twin).is_none() {
                        if let Some(bw) = self.check_join(&head_twin, &cm) {
                            joins.insert(bw.twin(), head_twin);
                        }
                    }
                }
            }
            Some(list) => {
                for mut km in list.drain(..) {
                    let cm = self.find_extremities(&km, true);
                    if cm.is_empty {
                        continue;
                    }

                    if cm.is_long() {
                        if (cm.dist == 0 && cm.strand) || (cm.dist != 0 && !cm.strand) {
                            km = km.twin();
                        }
                        if let Some(fw) = self.check_join(&km, &cm) {
                            joins.insert(fw.twin(), km);
                        }
                    } else {
                        if let Some(fw) = self.check_join(&km, &cm) {
                            joins.insert(fw.twin(), km);
                        }

                        let km_twin = km.twin();
                        if let Some(fw) = self.check_join(&km_twin, &cm) {
                            joins.insert(fw.twin(), km_twin);
                        }
                    }
                }
            }
        }

        let join_pairs: Vec<(Kmer, Kmer)> =
            joins.iter().map(|(_, key, val)| (*key, *val)).collect();

        for (key, head) in join_pairs {
            let tail = key.twin();

            let mut cm_head = self.find_extremities(&head, true);
            let mut cm_tail = self.find_extremities(&tail, true);

            if cm_head.is_empty || cm_tail.is_empty {
                continue;
            }

            let cm_head_head = self.mapped_head_kmer(&cm_head);
            let cm_tail_head = self.mapped_head_kmer(&cm_tail);

            if cm_head_head == cm_tail_head {
                continue;
            }

            // Both k-mers must still be end k-mers, in a known orientation
            let len_k_head = cm_head.is_short || cm_head.is_abundant;
            let head_dir = if len_k_head && head == cm_head_head {
                true
            } else if !len_k_head
                && head == self.long_unitig(cm_head.pos_unitig).tail_kmer(k)
            {
                true
            } else if head.twin() == cm_head_head {
                false
            } else {
                continue;
            };

            let len_k_tail = cm_tail.is_short || cm_tail.is_abundant;
            let tail_dir = if tail == cm_tail_head {
                true
            } else if len_k_tail {
                if tail.twin() == cm_tail_head {
                    false
                } else {
                    continue;
                }
            } else if tail.twin() == self.long_unitig(cm_tail.pos_unitig).tail_kmer(k) {
                false
            } else {
                continue;
            };

            let mut join_seq: Vec<u8> = if head_dir {
                if len_k_head {
                    cm_head_head.to_seq()
                } else {
                    self.long_unitig(cm_head.pos_unitig).seq.to_seq()
                }
            } else if len_k_head {
                cm_head_head.twin().to_seq()
            } else {
                self.long_unitig(cm_head.pos_unitig).seq.rev().to_seq()
            };

            let tail_seq: Vec<u8> = if tail_dir {
                if len_k_tail {
                    cm_tail_head.to_seq()
                } else {
                    self.long_unitig(cm_tail.pos_unitig).seq.to_seq()
                }
            } else if len_k_tail {
                cm_tail_head.twin().to_seq()
            } else {
                self.long_unitig(cm_tail.pos_unitig).seq.rev().to_seq()
            };

            assert_eq!(
                &join_seq[join_seq.len() - (k - 1)..],
                &tail_seq[..k - 1],
                "join ends do not overlap by k-1"
            );
            join_seq.extend_from_slice(&tail_seq[k - 1..]);

            let mut covsum = if len_k_head {
                let ccov = if cm_head.is_short {
                    &self.v_kmers[cm_head.pos_unitig].1
                } else {
                    self.h_kmers.value_at(cm_head.pos_unitig)
                };
                if ccov.is_full() { CompressedCoverage::cov_full() } else { ccov.cov_at(0) }
            } else {
                self.long_unitig(cm_head.pos_unitig).coveragesum
            };

            covsum += if len_k_tail {
                let ccov = if cm_tail.is_short {
                    &self.v_kmers[cm_tail.pos_unitig].1
                } else {
                    self.h_kmers.value_at(cm_tail.pos_unitig)
                };
                if ccov.is_full() { CompressedCoverage::cov_full() } else { ccov.cov_at(0) }
            } else {
                self.long_unitig(cm_tail.pos_unitig).coveragesum
            };

            // Retire the originals, container by container
            if cm_head.is_short {
                v_kmers_size -= 1;
                if cm_head.pos_unitig != v_kmers_size {
                    self.swap_unitigs(true, cm_head.pos_unitig, v_kmers_size);
                    if cm_tail.is_short && v_kmers_size == cm_tail.pos_unitig {
                        cm_tail.pos_unitig = cm_head.pos_unitig;
                    }
                }
                self.delete_unitig(true, false, v_kmers_size);
            } else if cm_head.is_abundant {
                self.delete_unitig(false, true, cm_head.pos_unitig);
            }

            if cm_tail.is_short {
                v_kmers_size -= 1;
                if cm_tail.pos_unitig != v_kmers_size {
                    self.swap_unitigs(true, cm_tail.pos_unitig, v_kmers_size);
                    if cm_head.is_short && v_kmers_size == cm_head.pos_unitig {
                        cm_head.pos_unitig = cm_tail.pos_unitig;
                    }
                }
                self.delete_unitig(true, false, v_kmers_size);
            } else if cm_tail.is_abundant {
                self.delete_unitig(false, true, cm_tail.pos_unitig);
            }

            let new_id = if len_k_head && len_k_tail {
                self.add_unitig(&join_seq, v_unitigs_size);
                v_unitigs_size += 1;
                v_unitigs_size - 1
            } else if len_k_head {
                self.delete_unitig(false, false, cm_tail.pos_unitig);
                self.add_unitig(&join_seq, cm_tail.pos_unitig);
                cm_tail.pos_unitig
            } else {
                if !len_k_tail {
                    v_unitigs_size -= 1;
                    if cm_tail.pos_unitig != v_unitigs_size {
                        self.swap_unitigs(false, cm_tail.pos_unitig, v_unitigs_size);
                        if v_unitigs_size == cm_head.pos_unitig {
                            cm_head.pos_unitig = cm_tail.pos_unitig;
                        }
                    }
                    self.delete_unitig(false, false, v_unitigs_size);
                }

                self.delete_unitig(false, false, cm_head.pos_unitig);
                self.add_unitig(&join_seq, cm_head.pos_unitig);
                cm_head.pos_unitig
            };

            let num_kmers = self.long_unitig(new_id).num_kmers(k) as u64;
            let unitig = self.long_unitig_mut(new_id);
            unitig.coveragesum = covsum;
            if covsum >= CompressedCoverage::cov_full() * num_kmers {
                unitig.ccov.set_full();
            }

            joined += 1;
        }

        if v_unitigs_size < self.v_unitigs.len() {
            self.v_unitigs.truncate(v_unitigs_size);
        }
        if v_kmers_size < self.v_kmers.len() {
            self.v_kmers.truncate(v_kmers_size);
        }

        joined
    }

    /// Revisit the suspected false-positive tips recorded by the walker:
    /// a tip that is nonetheless in the graph gets re-attached by splitting
    /// its neighbor at the attachment offset, so the attachment point
    /// becomes a unitig end. Returns the number of real tips found.
    pub fn check_fp_tips(&mut self, ignored_km_tips: &mut KmerHashTable<bool>) -> u64 {
        let k = self.k();
        let mut nb_real_short_tips = 0u64;

        let mut nxt_pos_insert = self.v_unitigs.len();
        let mut v_unitigs_sz = self.v_unitigs.len();
        let mut v_kmers_sz = self.v_kmers.len();

        for h in ignored_km_tips.buckets() {
            let km = *ignored_km_tips.key_at(h);

            let cm = self.find_extremities(&km, true);
            if cm.is_empty {
                continue;
            }
            nb_real_short_tips += 1;

            let mut not_found = true;

            for i in 0..4u8 {
                if !not_found {
                    break;
                }
                let mut cm_bw = self.find(&km.backward_base(i));
                if cm_bw.is_long() {
                    if cm_bw.strand {
                        cm_bw.dist += 1;
                    }
                    if cm_bw.dist != 0 && cm_bw.dist != cm_bw.size - k + 1 {
                        let sp = [(0, cm_bw.dist), (cm_bw.dist, cm_bw.size - k + 1)];
                        let mut pos = cm_bw.pos_unitig;
                        self.split_unitig(
                            &mut pos,
                            &mut nxt_pos_insert,
                            &mut v_unitigs_sz,
                            &mut v_kmers_sz,
                            &sp,
                        );
                    }
                    not_found = false;
                }
            }

            for i in 0..4u8 {
                if !not_found {
                    break;
                }
                let mut cm_fw = self.find(&km.forward_base(i));
                if cm_fw.is_long() {
                    if !cm_fw.strand {
                        cm_fw.dist += 1;
                    }
                    if cm_fw.dist != 0 && cm_fw.dist != cm_fw.size - k + 1 {
                        let sp = [(0, cm_fw.dist), (cm_fw.dist, cm_fw.size - k + 1)];
                        let mut pos = cm_fw.pos_unitig;
                        self.split_unitig(
                            &mut pos,
                            &mut nxt_pos_insert,
                            &mut v_unitigs_sz,
                            &mut v_kmers_sz,
                            &sp,
                        );
                    }
                    not_found = false;
                }
            }
        }

        if nxt_pos_insert < self.v_unitigs.len() {
            self.v_unitigs.truncate(nxt_pos_insert);
        }
        if v_kmers_sz < self.v_kmers.len() {
            self.v_kmers.truncate(v_kmers_sz);
        }

        nb_real_short_tips
    }

    /// Remove unitigs shorter than k k-mers whose total degree is at most
    /// 1 (`clip_tips`) or 0 (`rm_isolated` alone). With `clip_tips`, the
    /// single neighbor of each clipped tip is pushed into `out` so the
    /// caller can re-join there.
    pub fn remove_unitigs(&mut self, rm_isolated: bool, clip_tips: bool, out: &mut Vec<Kmer>) -> usize {
        if !rm_isolated && !clip_tips {
            return 0;
        }

        let rm_and_clip = rm_isolated && clip_tips;
        let k = self.k();
        let lim = if clip_tips { 1usize } else { 0 };

        let mut removed = 0usize;
        let mut v_unitigs_sz = self.v_unitigs.len();
        let mut v_kmers_sz = self.v_kmers.len();

        let mut j = 0usize;
        while j < v_unitigs_sz {
            let (head, tail, num_kmers) = {
                let unitig = self.long_unitig(j);
                (unitig.head_kmer(k), unitig.tail_kmer(k), unitig.num_kmers(k))
            };

            if num_kmers < k {
                let mut km = Kmer::empty_key();

                let mut nb_pred = 0usize;
                for i in 0..4u8 {
                    if nb_pred > lim {
                        break;
                    }
                    let b = head.backward_base(i);
                    if !self.find_extremities(&b, true).is_empty {
                        nb_pred += 1;
                        if clip_tips {
                            km = b;
                        }
                    }
                }

                if nb_pred <= lim {
                    let mut nb_succ = 0usize;
                    for i in 0..4u8 {
                        if nb_succ > lim {
                            break;
                        }
                        let f = tail.forward_base(i);
                        if !self.find_extremities(&f, true).is_empty {
                            nb_succ += 1;
                            if clip_tips {
                                km = f;
                            }
                        }
                    }

                    if (rm_and_clip && nb_pred + nb_succ <= lim)
                        || (!rm_and_clip && nb_pred + nb_succ == lim)
                    {
                        removed += 1;
                        v_unitigs_sz -= 1;

                        if j != v_unitigs_sz {
                            self.swap_unitigs(false, j, v_unitigs_sz);
                        }

                        if clip_tips && nb_pred + nb_succ == lim {
                            out.push(km);
                        }

                        // Re-examine slot j, which now holds the old tail
                        continue;
                    }
                }
            }

            j += 1;
        }

        let mut j = 0usize;
        while j < v_kmers_sz {
            let head = self.v_kmers[j].0;
            let mut km = Kmer::empty_key();

            let mut nb_pred = 0usize;
            for i in 0..4u8 {
                if nb_pred > lim {
                    break;
                }
                let b = head.backward_base(i);
                if !self.find_extremities(&b, true).is_empty {
                    nb_pred += 1;
                    if clip_tips {
                        km = b;
                    }
                }
            }

            if nb_pred <= lim {
                let mut nb_succ = 0usize;
                for i in 0..4u8 {
                    if nb_succ > lim {
                        break;
                    }
                    let f = head.forward_base(i);
                    if !self.find_extremities(&f, true).is_empty {
                        nb_succ += 1;
                        if clip_tips {
                            km = f;
                        }
                    }
                }

                if (rm_and_clip && nb_pred + nb_succ <= lim)
                    || (!rm_and_clip && nb_pred + nb_succ == lim)
                {
                    removed += 1;
                    v_kmers_sz -= 1;

                    if j != v_kmers_sz {
                        self.swap_unitigs(true, j, v_kmers_sz);
                    }

                    if clip_tips && nb_pred + nb_succ == lim {
                        out.push(km);
                    }

                    continue;
                }
            }

            j += 1;
        }

        for h in self.h_kmers.buckets() {
            let head = *self.h_kmers.key_at(h);
            let mut km = Kmer::empty_key();

            let mut nb_pred = 0usize;
            for i in 0..4u8 {
                if nb_pred > lim {
                    break;
                }
                let b = head.backward_base(i);
                if !self.find_extremities(&b, true).is_empty {
                    nb_pred += 1;
                    if clip_tips {
                        km = b;
                    }
                }
            }

            if nb_pred <= lim {
                let mut nb_succ = 0usize;
                for i in 0..4u8 {
                    if nb_succ > lim {
                        break;
                    }
                    let f = head.forward_base(i);
                    if !self.find_extremities(&f, true).is_empty {
                        nb_succ += 1;
                        if clip_tips {
                            km = f;
                        }
                    }
                }

                if (rm_and_clip && nb_pred + nb_succ <= lim)
                    || (!rm_and_clip && nb_pred + nb_succ == lim)
                {
                    removed += 1;
                    // Mark for the final sweep; degree checks of the
                    // remaining unitigs still see this one
                    *self.h_kmers.value_at_mut(h) = CompressedCoverage::default();

                    if clip_tips && nb_pred + nb_succ == lim {
                        out.push(km);
                    }
                }
            }
        }

        // Deferred deletions: degree counting above observed the full graph
        for j in v_unitigs_sz..self.v_unitigs.len() {
            self.delete_unitig(false, false, j);
        }
        self.v_unitigs.truncate(v_unitigs_sz);

        for j in v_kmers_sz..self.v_kmers.len() {
            self.delete_unitig(true, false, j);
        }
        self.v_kmers.truncate(v_kmers_sz);

        for h in self.h_kmers.buckets() {
            if self.h_kmers.value_at(h).size() == 0 {
                self.delete_unitig(false, true, h);
            }
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::KmerScanner;

    #[test]
    fn test_split_deletes_uncovered_short() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"ACGTC", 0);

        let (_, deleted) = graph.split_all_unitigs();
        assert_eq!(deleted, 1);
        assert_eq!(graph.unitig_count(), 0);
        assert!(graph.find(&Kmer::from_str("ACGTC").unwrap()).is_empty);
    }

    #[test]
    fn test_split_excises_coverage_hole() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"AAAAACCCCC", 0);

        // Saturate k-mer positions 0..2 and 4..6; leave 2..4 at one cover
        {
            let unitig = graph.long_unitig_mut(0);
            unitig.ccov.cover(0, 5);
            unitig.ccov.cover(0, 1);
            unitig.ccov.cover(4, 5);
            unitig.coveragesum = 10;
        }

        let (split, deleted) = graph.split_all_unitigs();
        assert_eq!(split, 1);
        assert_eq!(deleted, 0);
        assert_eq!(graph.n_long(), 2);

        // Survivors: AAAAAC (k-mers 0..2) and ACCCCC (k-mers 4..6)
        for s in ["AAAAA", "AAAAC", "ACCCC", "CCCCC"] {
            assert!(!graph.find(&Kmer::from_str(s).unwrap()).is_empty, "{} lost", s);
        }
        for s in ["AAACC", "AACCC"] {
            assert!(graph.find(&Kmer::from_str(s).unwrap()).is_empty, "{} kept", s);
        }

        // Idempotent: everything is full now
        let (split2, deleted2) = graph.split_all_unitigs();
        assert_eq!((split2, deleted2), (0, 0));
        assert_eq!(graph.n_long(), 2);
    }

    #[test]
    fn test_join_two_long_unitigs() {
        let mut graph = UnitigGraph::new(5, 3);
        graph.add_unitig(b"ACGGATT", 0);
        graph.add_unitig(b"GATTCCA", 1);

        let joined = graph.join_all_unitigs(None);
        assert_eq!(joined, 1);
        assert_eq!(graph.unitig_count(), 1);

        for (km, _) in KmerScanner::new(b"ACGGATTCCA", 5) {
            assert!(!graph.find(&km).is_empty, "{} lost after join", km);
        }
    }

    #[test]
    fn test_join_respects_branches() {
        let mut graph = UnitigGraph::new(5, 3);
        // GGATT extends into ATTCC and ATTGG: two successors, no join
        graph.add_unitig(b"ACGGATT", 0);
        graph.add_unitig(b"GATTCCA", 1);
        graph.add_unitig(b"GATTGGA", 2);

        let joined = graph.join_all_unitigs(None);
        assert_eq!(joined, 0);
        assert_eq!(graph.unitig_count(), 3);
    }

    #[test]
    fn test_remove_unitigs_clips_tip() {
        let mut graph = UnitigGraph::new(5, 3);
        // A chain of 6 k-mers (not removable) and a one-k-mer tip onto its head
        graph.add_unitig(b"ACGGATTCCA", 0);
        graph.add_unitig(b"TACGG", 0);

        let mut rejoin = Vec::new();
        let removed = graph.remove_unitigs(false, true, &mut rejoin);

        assert_eq!(removed, 1);
        assert!(graph.find(&Kmer::from_str("TACGG").unwrap()).is_empty);
        assert!(!graph.find(&Kmer::from_str("ACGGA").unwrap()).is_empty);
        assert_eq!(rejoin.len(), 1);
        // The neighbor is reported in the clipped unitig's stored orientation
        assert_eq!(rejoin[0].rep(), Kmer::from_str("ACGGA").unwrap().rep());
    }

    #[test]
    fn test_remove_isolated_only() {
        let mut graph = UnitigGraph::new(5, 3);
        // AAACC has no graph neighbor on either strand: degree 0
        graph.add_unitig(b"AAACC", 0);
        graph.add_unitig(b"ACGGATTCCA", 0); // 6 k-mers, kept

        let mut out = Vec::new();
        let removed = graph.remove_unitigs(true, false, &mut out);

        assert_eq!(removed, 1);
        assert!(out.is_empty());
        assert!(graph.find(&Kmer::from_str("AAACC").unwrap()).is_empty);
        assert!(!graph.find(&Kmer::from_str("GATTC").unwrap()).is_empty);
    }
}
