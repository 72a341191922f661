//! The driver: build the graph, attach colors, persist
//!
//! `build` runs three passes over the inputs: size the oracle, fill it, then
//! walk every read and insert the unitig around each novel k-mer. Cleanup
//! (tip checks, optional coverage split, optional removal, joining) follows.
//! `map_colors` freezes the graph and runs the parallel color phases, and
//! `write` emits the GFA plus the colors side-file.
//!
//! A failed `build` marks the graph invalid; `map_colors`, `write` and
//! `check_colors` then short-circuit to `false`.

use crate::colors::ColorTable;
use crate::config::GraphConfig;
use crate::graph::UnitigGraph;
use crate::kmer::{Kmer, KmerScanner};
use crate::kmer_hash_table::KmerHashTable;
use crate::minimizer::MinimizerSpace;
use crate::oracle::{BlockedBloomFilter, KmerOracle};
use crate::parse::{count_valid_bases, parse_sequences, valid_fragments};

use ahash::AHashMap;
use anyhow::{Context, Result};
use roaring::RoaringBitmap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use tracing::{error, info};

const BLOOM_BITS_PER_KMER: usize = 14;
const BLOOM_SEED: u64 = 0x5EED_B100;

/// A colored compacted de Bruijn graph under construction or frozen
pub struct ColoredCdbg {
    config: GraphConfig,
    graph: UnitigGraph,
    colors: Option<ColorTable>,
    invalid: bool,
}

impl ColoredCdbg {
    /// Create an empty graph for `config` (validated at `build` time)
    pub fn new(config: GraphConfig) -> Self {
        // An out-of-range k or g is only diagnosed by `build`; the
        // placeholder graph never sees a k-mer before validation passes
        let (k, g) = if crate::constants::is_valid_k(config.k)
            && crate::constants::is_valid_g(config.g, config.k)
        {
            (config.k, config.g)
        } else {
            (31, 23)
        };

        let graph =
            UnitigGraph::with_limits(k, g, config.min_abundance_lim, config.max_abundance_lim);

        Self {
            config,
            graph,
            colors: None,
            invalid: false,
        }
    }

    /// The underlying graph
    pub fn graph(&self) -> &UnitigGraph {
        &self.graph
    }

    /// The color table, once `map_colors` succeeded
    pub fn colors(&self) -> Option<&ColorTable> {
        self.colors.as_ref()
    }

    /// True after a failed `build`
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Construct the graph from the configured inputs.
    /// Returns false (and marks the graph invalid) on any error.
    pub fn build(&mut self) -> bool {
        match self.build_inner() {
            Ok(()) => true,
            Err(e) => {
                error!("graph construction failed: {:#}", e);
                self.invalid = true;
                false
            }
        }
    }

    fn build_inner(&mut self) -> Result<()> {
        self.config.validate()?;
        if self.config.verbose {
            self.config.print();
        }

        let k = self.config.k;
        let files = self.config.filename_seq_in.clone();

        // Pass 1: size and fill the membership oracle
        let total_bases = count_valid_bases(&files, k)?;
        info!("{} valid bases across {} input file(s)", total_bases, files.len());

        let mut bloom =
            BlockedBloomFilter::new(total_bases as usize, BLOOM_BITS_PER_KMER, BLOOM_SEED);
        for path in &files {
            parse_sequences(path, |seq| {
                for frag in valid_fragments(seq, k) {
                    for (km, _) in KmerScanner::new(frag, k) {
                        bloom.insert(&km);
                    }
                }
                Ok(())
            })
            .with_context(|| format!("filling oracle from {}", path.display()))?;
        }

        // Pass 2: walk the reads, inserting a unitig around each novel k-mer
        let mut tips: Vec<Kmer> = Vec::new();
        for path in &files {
            parse_sequences(path, |seq| {
                for frag in valid_fragments(seq, k) {
                    self.scan_fragment(&bloom, frag, &mut tips);
                }
                Ok(())
            })
            .with_context(|| format!("building unitigs from {}", path.display()))?;
        }

        info!(
            "constructed {} unitigs ({} long, {} short, {} abundant)",
            self.graph.unitig_count(),
            self.graph.n_long(),
            self.graph.n_short(),
            self.graph.n_abundant()
        );

        // Suspected false-positive tips that turned out real get re-attached
        let mut ignored_km_tips: KmerHashTable<bool> =
            KmerHashTable::new(crate::constants::DEFAULT_SEED.wrapping_add(5));
        for km in tips.drain(..) {
            ignored_km_tips.insert(km, true);
        }
        let nb_real_tips = self.graph.check_fp_tips(&mut ignored_km_tips);
        if nb_real_tips > 0 {
            info!("re-attached {} suspected tips", nb_real_tips);
        }

        if self.config.min_count >= 2 {
            let (split, deleted) = self.graph.split_all_unitigs();
            info!("coverage split: {} split, {} deleted", split, deleted);
        }

        let mut v_joins: Vec<Kmer> = Vec::new();
        let removed = if self.config.clip_tips || self.config.rm_isolated {
            self.graph.remove_unitigs(
                self.config.rm_isolated,
                self.config.clip_tips,
                &mut v_joins,
            )
        } else {
            0
        };
        if removed > 0 {
            info!("removed {} short unitigs", removed);
        }

        let joined = if v_joins.is_empty() && removed == 0 {
            self.graph.join_all_unitigs(None)
        } else {
            self.graph.join_all_unitigs(Some(&mut v_joins))
        };
        if joined > 0 {
            info!("joined {} unitig pairs", joined);
        }

        info!(
            "final graph: {} unitigs ({} long, {} short, {} abundant)",
            self.graph.unitig_count(),
            self.graph.n_long(),
            self.graph.n_short(),
            self.graph.n_abundant()
        );

        Ok(())
    }

    fn scan_fragment(&mut self, oracle: &impl KmerOracle, frag: &[u8], tips: &mut Vec<Kmer>) {
        let space = MinimizerSpace::new(frag, self.graph.g(), self.graph.min_hasher());
        let kmers: Vec<Kmer> = KmerScanner::new(frag, self.graph.k()).map(|(km, _)| km).collect();

        let mut pos = 0usize;
        while pos < kmers.len() {
            let km = kmers[pos];
            if !oracle.contains(&km) {
                pos += 1;
                continue;
            }

            let um = self.graph.find_unitig_in(&km, frag, pos, &space);
            if um.is_empty {
                self.graph.add_unitig_sequence(oracle, &km, frag, pos, None, tips);
                // Coverage was recorded by the insertion; only advance here
                let mapped = self.graph.find_unitig_in(&km, frag, pos, &space);
                pos += mapped.len.max(1);
            } else {
                self.graph.map_read(&um);
                pos += um.len;
            }
        }
    }

    /// Assign and populate the color sets (or load them from the configured
    /// colors file). No-op returning false on an invalid graph.
    pub fn map_colors(&mut self) -> bool {
        if self.invalid {
            return false;
        }

        match self.map_colors_inner() {
            Ok(()) => true,
            Err(e) => {
                error!("color mapping failed: {:#}", e);
                false
            }
        }
    }

    fn map_colors_inner(&mut self) -> Result<()> {
        if let Some(path) = &self.config.filename_colors_in {
            let file = File::open(path)
                .with_context(|| format!("opening colors file {}", path.display()))?;
            let mut reader = BufReader::new(file);
            self.colors = Some(ColorTable::read_from(&mut reader, &self.graph)?);
            info!("loaded colors from {}", path.display());
            return Ok(());
        }

        let mut table =
            ColorTable::new(&self.graph, self.config.max_nb_hash, self.config.nb_threads);

        table.init_color_sets(&self.graph, self.config.nb_threads);
        info!(
            "assigned {} color slots ({} through overflow)",
            self.graph.unitig_count(),
            table.nb_overflowing()
        );

        table.build_color_sets(
            &self.graph,
            &self.config.filename_seq_in,
            self.config.nb_threads,
        )?;
        table.optimize();

        self.colors = Some(table);
        Ok(())
    }

    /// Write `<prefix>.gfa` and `<prefix>.bfg_colors`.
    /// No-op returning false on an invalid graph.
    pub fn write(&self, prefix: &str) -> bool {
        if self.invalid {
            return false;
        }

        match self.write_inner(prefix) {
            Ok(()) => true,
            Err(e) => {
                error!("writing graph failed: {:#}", e);
                false
            }
        }
    }

    fn write_inner(&self, prefix: &str) -> Result<()> {
        let gfa_path = format!("{}.gfa", prefix);
        let file = File::create(&gfa_path).with_context(|| format!("creating {}", gfa_path))?;
        let mut writer = BufWriter::new(file);
        self.graph.write_gfa(&mut writer)?;
        info!("wrote {}", gfa_path);

        if let Some(colors) = &self.colors {
            let colors_path = format!("{}.bfg_colors", prefix);
            let file =
                File::create(&colors_path).with_context(|| format!("creating {}", colors_path))?;
            let mut writer = BufWriter::new(file);
            colors.write_to(&mut writer)?;
            info!("wrote {}", colors_path);
        }

        Ok(())
    }

    /// Verify the color assignment against an independent k-mer -> colors
    /// table rebuilt from the inputs. Returns false on an invalid graph, a
    /// missing color table, or any mismatch.
    pub fn check_colors(&self) -> bool {
        if self.invalid {
            return false;
        }
        let Some(colors) = &self.colors else {
            return false;
        };

        match self.check_colors_inner(colors) {
            Ok(ok) => ok,
            Err(e) => {
                error!("color check failed to run: {:#}", e);
                false
            }
        }
    }

    fn check_colors_inner(&self, colors: &ColorTable) -> Result<bool> {
        let k = self.config.k;

        // Reference oracle: canonical k-mer -> set of file ids
        let mut reference: AHashMap<Kmer, RoaringBitmap> = AHashMap::new();
        for (color, path) in self.config.filename_seq_in.iter().enumerate() {
            parse_sequences(path, |seq| {
                for frag in valid_fragments(seq, k) {
                    for (km, _) in KmerScanner::new(frag, k) {
                        reference.entry(km.rep()).or_default().insert(color as u32);
                    }
                }
                Ok(())
            })?;
        }

        // Expected colors per slot: union over the reference sets of the
        // k-mers mapping there
        let mut expected: AHashMap<usize, RoaringBitmap> = AHashMap::new();
        for (km, ref_set) in &reference {
            let um = self.graph.find(km);
            if um.is_empty {
                error!("k-mer {} missing from the graph", km);
                return Ok(false);
            }
            *expected.entry(colors.slot_of(&self.graph, &um)).or_default() |= ref_set;
        }

        for (km, _) in &reference {
            let um = self.graph.find(km);
            let actual: RoaringBitmap = colors.color_set(&self.graph, &um).iter().collect();
            let want = &expected[&colors.slot_of(&self.graph, &um)];

            if &actual != want {
                error!(
                    "color mismatch for unitig of {}: stored {:?}, expected {:?}",
                    km,
                    actual.iter().collect::<Vec<_>>(),
                    want.iter().collect::<Vec<_>>()
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Drop the graph and colors, returning to a fresh state
    pub fn clear(&mut self) {
        self.graph.clear();
        self.colors = None;
        self.invalid = false;
    }
}
