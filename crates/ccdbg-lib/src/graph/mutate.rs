//! Structural mutations: insert, delete and swap unitigs
//!
//! Every mutation walks the first occurrence of each distinct minimizer of
//! the affected sequence and keeps the bins in lockstep with the containers.
//! Inserting into a bin that already holds `max_abundance_lim` long-unitig
//! entries marks it overcrowded and re-routes the entry through the window's
//! next distinct minimizer; a short unitig whose bin already holds
//! `min_abundance_lim` entries is promoted to the abundant container, rolling
//! back the bin entries inserted so far.
//!
//! Deleted unitigs leave tombstoned slots so that ids referenced from other
//! bins stay stable; the cleanup passes compact the vectors by swapping the
//! tail into the hole (`swap_unitigs`) before truncating.

use super::{BinList, UnitigGraph};
use crate::compressed_coverage::CompressedCoverage;
use crate::constants::{MASK_UNITIG_ID, MASK_UNITIG_POS, MASK_UNITIG_TYPE, RESERVED_ID};
use crate::kmer::{Kmer, Minimizer};
use crate::minimizer::MinimizerSpace;
use crate::unitig::Unitig;

const MASK_ID_TYPE: u64 = MASK_UNITIG_ID | MASK_UNITIG_TYPE;

impl UnitigGraph {
    /// Insert a unitig under id `id_unitig` (container chosen by length and
    /// bin pressure). Returns true when the unitig went to the abundant
    /// container, in which case `id_unitig` was not consumed.
    pub fn add_unitig(&mut self, s: &[u8], id_unitig: usize) -> bool {
        let k = self.k();
        let g = self.g();
        let len = s.len();
        debug_assert!(len >= k);

        let mut pos_id_unitig = (id_unitig as u64) << 32;

        let mut is_short = false;
        let mut is_abundant = false;
        let mut is_forbidden = false;

        let mut km_rep = Kmer::empty_key();
        let owned: Vec<u8>;
        let c_str: &[u8] = if len == k {
            is_short = true;
            pos_id_unitig |= MASK_UNITIG_TYPE;
            km_rep = Kmer::from_sub_seq(s).expect("ACGT-only unitig").rep();
            owned = km_rep.to_seq();
            &owned
        } else {
            s
        };

        let space = MinimizerSpace::new(c_str, g, self.min_hasher());
        let mut last_pos_min: i64 = -1;

        'windows: for i in 0..=(len - k) {
            let win = space.window(i, k);
            if last_pos_min >= (i + win.min().pos) as i64 && !is_forbidden {
                continue;
            }
            is_forbidden = false;

            for tie in win.ties() {
                let mut mhr = tie;
                let abs_pos = i + tie.pos;

                let minz_rep = win.minimizer(mhr.pos);
                let (mut bucket, _) = self.hmap_min_unitigs.insert(minz_rep, BinList::new());

                pos_id_unitig = (pos_id_unitig & MASK_ID_TYPE) | abs_pos as u64;

                if !is_short {
                    // Re-route through next distinct minimizers while the
                    // bin is saturated or already flagged
                    loop {
                        let v = self.hmap_min_unitigs.value_at(bucket);
                        let v_sz = v.len();
                        let crowded = v_sz >= self.max_abundance_lim
                            || (v_sz > 0 && v[v_sz - 1] & MASK_ID_TYPE == MASK_ID_TYPE);
                        if !crowded {
                            break;
                        }

                        is_forbidden = true;
                        let Some(next) = win.next_distinct(&mhr) else { break };

                        {
                            let v = self.hmap_min_unitigs.value_at_mut(bucket);
                            let last = v.len() - 1;
                            if v[last] & MASK_ID_TYPE != MASK_ID_TYPE {
                                if v[last] & MASK_UNITIG_ID == MASK_UNITIG_ID {
                                    // Bin already carries the abundant
                                    // record: flag it overcrowded too
                                    v[last] |= MASK_UNITIG_TYPE;
                                } else {
                                    v.push(MASK_ID_TYPE);
                                }
                            }
                        }

                        mhr = next;
                        let minz_rep = win.minimizer(mhr.pos);
                        let (b, _) = self.hmap_min_unitigs.insert(minz_rep, BinList::new());
                        bucket = b;
                    }
                }

                let v = self.hmap_min_unitigs.value_at_mut(bucket);
                let v_sz = v.len();

                if v_sz == 0 {
                    v.push(pos_id_unitig);
                } else if is_short && v_sz >= self.min_abundance_lim {
                    // Minimizer too popular for the short container
                    is_short = false;
                    is_abundant = true;
                    break 'windows;
                } else if v[v_sz - 1] & MASK_UNITIG_ID == MASK_UNITIG_ID {
                    // Keep the bookkeeping record last
                    if v_sz == 1 || v[v_sz - 2] != pos_id_unitig {
                        v.insert(v_sz - 1, pos_id_unitig);
                    }
                } else if v[v_sz - 1] != pos_id_unitig {
                    v.push(pos_id_unitig);
                }

                last_pos_min = abs_pos as i64;
            }
        }

        if is_abundant {
            // Roll back the partial short insertion, then register the k-mer
            // as abundant: bump the reference count in every bin it touches
            // and move the payload to the direct k-mer table
            if id_unitig == self.v_kmers.len() {
                self.v_kmers.push((km_rep, CompressedCoverage::new(1)));
            } else {
                self.v_kmers[id_unitig] = (km_rep, CompressedCoverage::new(1));
            }

            self.delete_unitig(true, false, id_unitig);
            if id_unitig + 1 == self.v_kmers.len() {
                self.v_kmers.pop();
            }

            let mut last_pos_min: i64 = -1;
            for i in 0..=(len - k) {
                let win = space.window(i, k);
                if last_pos_min >= (i + win.min().pos) as i64 {
                    continue;
                }
                for tie in win.ties() {
                    let minz_rep = win.minimizer(tie.pos);
                    let (bucket, _) = self.hmap_min_unitigs.insert(minz_rep, BinList::new());
                    let v = self.hmap_min_unitigs.value_at_mut(bucket);
                    let v_sz = v.len();
                    if v_sz > 0 && v[v_sz - 1] & MASK_UNITIG_ID == MASK_UNITIG_ID {
                        v[v_sz - 1] += 1;
                    } else {
                        v.push(MASK_UNITIG_ID + 1);
                    }
                    last_pos_min = (i + tie.pos) as i64;
                }
            }

            self.h_kmers.insert(km_rep, CompressedCoverage::new(1));
        } else if is_short {
            if id_unitig == self.v_kmers.len() {
                self.v_kmers.push((km_rep, CompressedCoverage::new(1)));
            } else {
                self.v_kmers[id_unitig] = (km_rep, CompressedCoverage::new(1));
            }
        } else {
            let unitig = Box::new(Unitig::new(c_str, k).expect("ACGT-only unitig"));
            if id_unitig == self.v_unitigs.len() {
                self.v_unitigs.push(Some(unitig));
            } else {
                self.v_unitigs[id_unitig] = Some(unitig);
            }
        }

        is_abundant
    }

    /// Remove a unitig from its container and every bin that references it.
    /// The container slot is tombstoned, not reclaimed, so ids stay stable.
    pub fn delete_unitig(&mut self, is_short: bool, is_abundant: bool, id_unitig: usize) {
        let k = self.k();
        let g = self.g();

        if is_abundant {
            let km = *self.h_kmers.key_at(id_unitig);
            let s = km.to_seq();
            let space = MinimizerSpace::new(&s, g, self.min_hasher());
            let mut last_pos_min: i64 = -1;

            for i in 0..=(s.len() - k) {
                let win = space.window(i, k);
                if last_pos_min >= (i + win.min().pos) as i64 {
                    continue;
                }
                for tie in win.ties() {
                    let minz_rep = win.minimizer(tie.pos);
                    if let Some(bucket) = self.hmap_min_unitigs.find(&minz_rep) {
                        let mut erase = false;
                        {
                            let v = self.hmap_min_unitigs.value_at_mut(bucket);
                            let last = v.len() - 1;
                            v[last] -= 1;
                            // Count reached zero with no overcrowding flag
                            if v[last] & RESERVED_ID == 0 {
                                if last == 0 {
                                    erase = true;
                                } else {
                                    v.remove(last);
                                }
                            }
                        }
                        if erase {
                            self.hmap_min_unitigs.erase_bucket(bucket);
                        }
                    }
                    last_pos_min = (i + tie.pos) as i64;
                }
            }

            self.h_kmers.erase(&km);
            return;
        }

        let mut pos_id_unitig = (id_unitig as u64) << 32;

        let s: Vec<u8> = if is_short {
            pos_id_unitig |= MASK_UNITIG_TYPE;
            self.v_kmers[id_unitig].0.to_seq()
        } else {
            self.long_unitig(id_unitig).seq.to_seq()
        };

        let space = MinimizerSpace::new(&s, g, self.min_hasher());
        let mut is_forbidden = false;
        let mut last_pos_min: i64 = -1;

        for i in 0..=(s.len() - k) {
            let win = space.window(i, k);
            if last_pos_min >= (i + win.min().pos) as i64 && !is_forbidden {
                continue;
            }
            is_forbidden = false;

            for tie in win.ties() {
                let mut mhr = tie;
                let mut it = self.hmap_min_unitigs.find(&win.minimizer(mhr.pos));

                while let Some(bucket) = it.take() {
                    let mut erase = false;
                    let mut last_entry = 0u64;
                    let mut now_empty = true;
                    {
                        let v = self.hmap_min_unitigs.value_at_mut(bucket);
                        if let Some(p) =
                            v.iter().position(|&e| e & MASK_ID_TYPE == pos_id_unitig)
                        {
                            v.remove(p);
                        }
                        if v.is_empty() {
                            erase = true;
                        } else {
                            now_empty = false;
                            last_entry = v[v.len() - 1];
                        }
                    }

                    if erase {
                        self.hmap_min_unitigs.erase_bucket(bucket);
                    } else if !now_empty
                        && !is_short
                        && last_entry & MASK_ID_TYPE == MASK_ID_TYPE
                    {
                        // The entry may have been diverted past this
                        // overcrowded bin at insert time
                        is_forbidden = true;
                        if let Some(next) = win.next_distinct(&mhr) {
                            mhr = next;
                            it = self.hmap_min_unitigs.find(&win.minimizer(mhr.pos));
                        }
                    }
                }

                last_pos_min = (i + tie.pos) as i64;
            }
        }

        if is_short {
            self.v_kmers[id_unitig] = (Kmer::deleted_key(), CompressedCoverage::default());
        } else {
            self.v_unitigs[id_unitig] = None;
        }
    }

    /// Swap two container slots and rewrite every bin entry pointing at
    /// either id. Bins shared by both unitigs are rewritten exactly once.
    pub fn swap_unitigs(&mut self, is_short: bool, id_a: usize, id_b: usize) {
        let mut shift_a = (id_a as u64) << 32;
        let mut shift_b = (id_b as u64) << 32;

        let str_a: Vec<u8>;
        if is_short {
            self.v_kmers.swap(id_a, id_b);
            shift_a |= MASK_UNITIG_TYPE;
            shift_b |= MASK_UNITIG_TYPE;
            str_a = self.v_kmers[id_a].0.to_seq();
        } else {
            self.v_unitigs.swap(id_a, id_b);
            str_a = self.long_unitig(id_a).seq.to_seq();
        }

        // Slot a now holds the old b: its minimizers see both ids swapped
        let mut v_min_a = self.collect_bin_minimizers(&str_a, is_short);
        v_min_a.sort_unstable();

        let mut prev: Option<Minimizer> = None;
        for &minz in &v_min_a {
            if prev == Some(minz) {
                continue;
            }
            prev = Some(minz);
            if let Some(bucket) = self.hmap_min_unitigs.find(&minz) {
                for entry in self.hmap_min_unitigs.value_at_mut(bucket).iter_mut() {
                    if *entry & MASK_ID_TYPE == shift_b {
                        *entry = shift_a | (*entry & MASK_UNITIG_POS);
                    } else if *entry & MASK_ID_TYPE == shift_a {
                        *entry = shift_b | (*entry & MASK_UNITIG_POS);
                    }
                }
            }
        }

        // Slot b holds the old a: rewrite only the bins not already visited
        let str_b: Vec<u8> = if is_short {
            self.v_kmers[id_b].0.to_seq()
        } else {
            self.long_unitig(id_b).seq.to_seq()
        };

        let mut v_min_b = self.collect_bin_minimizers(&str_b, is_short);
        v_min_b.sort_unstable();
        v_min_b.retain(|m| v_min_a.binary_search(m).is_err());

        let mut prev: Option<Minimizer> = None;
        for &minz in &v_min_b {
            if prev == Some(minz) {
                continue;
            }
            prev = Some(minz);
            if let Some(bucket) = self.hmap_min_unitigs.find(&minz) {
                for entry in self.hmap_min_unitigs.value_at_mut(bucket).iter_mut() {
                    if *entry & MASK_ID_TYPE == shift_a {
                        *entry = shift_b | (*entry & MASK_UNITIG_POS);
                    }
                }
            }
        }
    }

    /// Minimizers of `s` whose bins may reference the unitig, including the
    /// bins reached through overcrowding diversions
    fn collect_bin_minimizers(&self, s: &[u8], is_short: bool) -> Vec<Minimizer> {
        let k = self.k();
        let space = MinimizerSpace::new(s, self.g(), self.min_hasher());

        let mut out = Vec::new();
        let mut is_forbidden = false;
        let mut last_pos_min: i64 = -1;

        for i in 0..=(s.len() - k) {
            let win = space.window(i, k);
            if last_pos_min >= (i + win.min().pos) as i64 && !is_forbidden {
                continue;
            }
            is_forbidden = false;

            for tie in win.ties() {
                let mut mhr = tie;
                let mut minz_rep = win.minimizer(mhr.pos);

                if is_short {
                    out.push(minz_rep);
                } else if let Some(mut bucket) = self.hmap_min_unitigs.find(&minz_rep) {
                    out.push(minz_rep);

                    loop {
                        let v = self.hmap_min_unitigs.value_at(bucket);
                        if v[v.len() - 1] & MASK_ID_TYPE != MASK_ID_TYPE {
                            break;
                        }
                        is_forbidden = true;
                        let Some(next) = win.next_distinct(&mhr) else { break };

                        minz_rep = win.minimizer(next.pos);
                        match self.hmap_min_unitigs.find(&minz_rep) {
                            Some(b) => {
                                mhr = next;
                                bucket = b;
                                out.push(minz_rep);
                            }
                            None => break,
                        }
                    }
                }

                last_pos_min = (i + tie.pos) as i64;
            }
        }

        out
    }
}
