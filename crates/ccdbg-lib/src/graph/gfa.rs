//! GFA 1.0 export
//!
//! One `S` line per unitig with length and coverage-sum tags, one `L` line
//! per directed edge discovered by probing all eight possible extensions of
//! each unitig end against the graph. The id space is contiguous: long
//! unitigs first, then short, then abundant.

use super::UnitigGraph;
use crate::compressed_coverage::CompressedCoverage;
use crate::constants::DEFAULT_SEED;
use crate::kmer::Kmer;
use crate::kmer_hash_table::KmerHashTable;
use crate::unitig::UnitigMap;
use std::io::{self, Write};

impl UnitigGraph {
    /// Write the graph as GFA 1.0
    pub fn write_gfa<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let k = self.k();
        let v_unitigs_sz = self.v_unitigs.len();
        let v_kmers_sz = self.v_kmers.len();

        writeln!(out, "H\tVN:Z:1.0")?;

        for label in 1..=v_unitigs_sz {
            let unitig = self.long_unitig(label - 1);
            writeln!(
                out,
                "S\t{}\t{}\tLN:i:{}\tXC:i:{}",
                label,
                unitig.seq.to_string(),
                unitig.seq.len(),
                unitig.coveragesum
            )?;
        }

        for label in 1..=v_kmers_sz {
            let (km, ccov) = &self.v_kmers[label - 1];
            let cov = if ccov.is_full() { CompressedCoverage::cov_full() } else { ccov.cov_at(0) };
            writeln!(out, "S\t{}\t{}\tLN:i:{}\tXC:i:{}", label + v_unitigs_sz, km, k, cov)?;
        }

        // Abundant unitigs get their labels in bucket order
        let mut idmap: KmerHashTable<u64> = KmerHashTable::new(DEFAULT_SEED.wrapping_add(4));
        let mut id = (v_unitigs_sz + v_kmers_sz) as u64;

        for h in self.h_kmers.buckets() {
            let km = *self.h_kmers.key_at(h);
            let ccov = self.h_kmers.value_at(h);
            let cov = if ccov.is_full() { CompressedCoverage::cov_full() } else { ccov.cov_at(0) };

            id += 1;
            idmap.insert(km, id);
            writeln!(out, "S\t{}\t{}\tLN:i:{}\tXC:i:{}", id, km, k, cov)?;
        }

        let label_of = |cand: &UnitigMap, b: &Kmer| -> u64 {
            if cand.is_abundant {
                *idmap.get(&b.rep()).expect("abundant neighbor labeled")
            } else {
                (cand.pos_unitig + 1 + if cand.is_short { v_unitigs_sz } else { 0 }) as u64
            }
        };

        let write_edges = |out: &mut W, label_a: u64, head: Kmer, tail: Kmer| -> io::Result<()> {
            for i in 0..4u8 {
                let b = head.backward_base(i);
                let cand = self.find_extremities(&b, true);
                if !cand.is_empty {
                    writeln!(
                        out,
                        "L\t{}\t-\t{}\t{}\t{}M",
                        label_a,
                        label_of(&cand, &b),
                        if cand.strand { '+' } else { '-' },
                        k - 1
                    )?;
                }
            }
            for i in 0..4u8 {
                let b = tail.forward_base(i);
                let cand = self.find_extremities(&b, true);
                if !cand.is_empty {
                    writeln!(
                        out,
                        "L\t{}\t+\t{}\t{}\t{}M",
                        label_a,
                        label_of(&cand, &b),
                        if cand.strand { '+' } else { '-' },
                        k - 1
                    )?;
                }
            }
            Ok(())
        };

        for label in 1..=v_unitigs_sz {
            let unitig = self.long_unitig(label - 1);
            write_edges(out, label as u64, unitig.head_kmer(k), unitig.tail_kmer(k))?;
        }

        for label in 1..=v_kmers_sz {
            let km = self.v_kmers[label - 1].0;
            write_edges(out, (label + v_unitigs_sz) as u64, km, km)?;
        }

        for h in self.h_kmers.buckets() {
            let km = *self.h_kmers.key_at(h);
            let label = *idmap.get(&km).expect("abundant unitig labeled");
            write_edges(out, label, km, km)?;
        }

        Ok(())
    }
}
