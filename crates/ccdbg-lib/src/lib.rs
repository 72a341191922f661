// ccdbg: colored compacted de Bruijn graphs
//
// Builds a compacted de Bruijn graph over the canonical k-mers of one or
// more sequence inputs, indexes every k-mer to its host unitig through a
// minimizer table, and attaches to each unitig the set of inputs (colors)
// its k-mers occur in.

#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod cdbg;
pub mod colors;
pub mod compressed_coverage;
pub mod compressed_sequence;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod graph;
pub mod hasher;
pub mod kmer;
pub mod kmer_hash_table;
pub mod minimizer;
pub mod oracle;
pub mod parse;
pub mod unitig;

// Re-export the main entry points at the crate root
pub use cdbg::ColoredCdbg;
pub use colors::{ColorSet, ColorTable};
pub use config::{ConfigError, GraphConfig};
pub use graph::UnitigGraph;
pub use kmer::{Kmer, KmerScanner, Minimizer};
pub use oracle::{BlockedBloomFilter, ExactKmerSet, KmerOracle};
pub use unitig::{Unitig, UnitigMap};

/// Version information
pub fn version() -> (u8, u8, u8) {
    (0, 1, 0)
}
