//! The color-set table: one slot per unitig, assigned and populated in
//! parallel once the graph is frozen
//!
//! Slot assignment hashes each unitig's head k-mer with up to `max_nb_hash`
//! seeds; a unitig whose seeded probes all collide falls back to a linear
//! scan from a shared cursor and is recorded in the overflow map. The
//! accessor byte of a unitig says which seed found its slot (1-based), or 0
//! for the overflow path.
//!
//! Concurrency discipline: `nb_threads * 256` striped atomic flags guard the
//! slots (one flag held across each read-decide-write, no nesting), one
//! mutex guards the overflow cursor, one mutex guards the shared input
//! scanner. Setting a color bit is an idempotent OR, so any interleaving of
//! the build workers yields the same table.

use super::ColorSet;
use crate::constants::{COLOR_SETS_OVERALLOCATION, LOCKS_PER_THREAD};
use crate::graph::UnitigGraph;
use crate::hasher::DeterministicHasher;
use crate::kmer::{Kmer, KmerScanner};
use crate::minimizer::MinimizerSpace;
use crate::parse::{parse_sequences, valid_fragments};
use crate::unitig::UnitigMap;

use ahash::AHashMap;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;

const COLORS_MAGIC: &[u8; 8] = b"CCDBGCLR";
const COLORS_VERSION: u32 = 1;

/// Work-unit and record-slice ceiling for the build workers
const CHUNK_SIZE: usize = 1000;

/// Seed material for the slot hash family
const SLOT_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Color-set storage for a frozen graph
pub struct ColorTable {
    nb_color_sets: usize,
    max_nb_hash: usize,
    seed_values: Vec<u64>,
    hashers: Vec<DeterministicHasher>,

    sets: Vec<UnsafeCell<ColorSet>>,
    occupied: Vec<AtomicBool>,
    locks: Vec<AtomicBool>,

    /// Slow path for unitigs whose seeded probes all collided: a shared
    /// scan cursor plus the head-k-mer -> slot map, behind one mutex
    overflow: Mutex<OverflowMap>,

    /// Accessor byte per unitig, indexed by frozen global id
    /// (long ids, then short, then abundant in bucket order)
    accessors: Vec<AtomicU8>,
    abundant_buckets: Vec<usize>,
}

// Slots are only touched while holding their stripe flag (or through &mut);
// everything else behind atomics or mutexes.
unsafe impl Sync for ColorTable {}

impl ColorTable {
    /// Allocate an empty table sized for the frozen `graph`
    pub fn new(graph: &UnitigGraph, max_nb_hash: usize, nb_threads: usize) -> Self {
        let nb_unitigs = graph.unitig_count();
        let nb_color_sets =
            (((nb_unitigs as f64) * COLOR_SETS_OVERALLOCATION) as usize).max(1);
        let nb_locks = nb_threads.max(1) * LOCKS_PER_THREAD;

        let seed_values: Vec<u64> = (0..max_nb_hash)
            .map(|i| (i as u64 + 1).wrapping_mul(SLOT_SEED_STRIDE))
            .collect();
        let hashers = seed_values.iter().map(|&s| DeterministicHasher::new(s)).collect();

        Self {
            nb_color_sets,
            max_nb_hash,
            seed_values,
            hashers,
            sets: (0..nb_color_sets).map(|_| UnsafeCell::new(ColorSet::new())).collect(),
            occupied: (0..nb_color_sets).map(|_| AtomicBool::new(false)).collect(),
            locks: (0..nb_locks).map(|_| AtomicBool::new(false)).collect(),
            overflow: Mutex::new(OverflowMap::default()),
            accessors: (0..nb_unitigs).map(|_| AtomicU8::new(0)).collect(),
            abundant_buckets: graph.abundant_buckets(),
        }
    }

    /// Number of slots
    pub fn nb_color_sets(&self) -> usize {
        self.nb_color_sets
    }

    /// Number of unitigs routed through the overflow map
    pub fn nb_overflowing(&self) -> usize {
        self.overflow.lock().expect("overflow mutex").slots.len()
    }

    #[inline]
    fn acquire(&self, slot: usize) -> usize {
        let l = slot % self.locks.len();
        while self.locks[l].swap(true, Ordering::Acquire) {
            std::hint::spin_loop();
        }
        l
    }

    #[inline]
    fn release(&self, lock: usize) {
        self.locks[lock].store(false, Ordering::Release);
    }

    fn abundant_rank(&self, bucket: usize) -> usize {
        self.abundant_buckets
            .binary_search(&bucket)
            .expect("abundant bucket known at freeze time")
    }

    /// Frozen global id of the unitig a mapping points at
    fn global_id(&self, graph: &UnitigGraph, um: &UnitigMap) -> usize {
        if um.is_abundant {
            graph.n_long() + graph.n_short() + self.abundant_rank(um.pos_unitig)
        } else if um.is_short {
            graph.n_long() + um.pos_unitig
        } else {
            um.pos_unitig
        }
    }

    fn head_kmer_of_global(&self, graph: &UnitigGraph, gid: usize) -> Kmer {
        let n_long = graph.n_long();
        let n_short = graph.n_short();
        if gid < n_long {
            graph.long_unitig(gid).head_kmer(graph.k())
        } else if gid < n_long + n_short {
            *graph.short_kmer(gid - n_long)
        } else {
            *graph.abundant_kmer(self.abundant_buckets[gid - n_long - n_short])
        }
    }

    /// Resolve the slot of a mapped unitig through its accessor byte (seeded
    /// hash of the head k-mer) or the overflow map
    pub fn slot_of(&self, graph: &UnitigGraph, um: &UnitigMap) -> usize {
        let gid = self.global_id(graph, um);
        let head = graph.mapped_head_kmer(um);
        let b = self.accessors[gid].load(Ordering::Relaxed);

        if b > 0 {
            (self.hashers[b as usize - 1].hash_u128(head.bits()) as usize) % self.nb_color_sets
        } else {
            *self
                .overflow
                .lock()
                .expect("overflow mutex")
                .slots
                .get(&head.bits())
                .expect("unitig head registered in overflow")
        }
    }

    /// The color set of a mapped unitig.
    ///
    /// Only meaningful once the build workers have finished; afterwards the
    /// table is read-only.
    pub fn color_set(&self, graph: &UnitigGraph, um: &UnitigMap) -> &ColorSet {
        let slot = self.slot_of(graph, um);
        unsafe { &*self.sets[slot].get() }
    }

    /// Assign one slot to every unitig, in parallel chunks of 1000.
    ///
    /// Each worker probes the seeded slots under the stripe flag and falls
    /// back to the shared overflow cursor when all probes collide. A free
    /// slot always exists while `nb_color_sets > |unitigs|`.
    pub fn init_color_sets(&self, graph: &UnitigGraph, nb_threads: usize) {
        let nb_unitigs = self.accessors.len();
        let cursor = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..nb_threads.max(1) {
                scope.spawn(|| loop {
                    let begin = cursor.fetch_add(CHUNK_SIZE, Ordering::Relaxed);
                    if begin >= nb_unitigs {
                        break;
                    }
                    let end = (begin + CHUNK_SIZE).min(nb_unitigs);

                    for gid in begin..end {
                        self.assign_slot(graph, gid);
                    }
                });
            }
        });
    }

    fn assign_slot(&self, graph: &UnitigGraph, gid: usize) {
        let head = self.head_kmer_of_global(graph, gid);

        for i in 0..self.max_nb_hash {
            let slot = (self.hashers[i].hash_u128(head.bits()) as usize) % self.nb_color_sets;

            let lock = self.acquire(slot);
            let free = !self.occupied[slot].load(Ordering::Relaxed);
            if free {
                self.occupied[slot].store(true, Ordering::Relaxed);
            }
            self.release(lock);

            if free {
                self.accessors[gid].store(i as u8 + 1, Ordering::Relaxed);
                return;
            }
        }

        // Every seeded probe collided: take the next free slot sequentially.
        // The whole slow path runs under the one overflow mutex.
        let mut overflow = self.overflow.lock().expect("overflow mutex");
        let slot = loop {
            overflow.last_empty_pos = (overflow.last_empty_pos + 1) % self.nb_color_sets;
            let pos = overflow.last_empty_pos;

            let lock = self.acquire(pos);
            let free = !self.occupied[pos].load(Ordering::Relaxed);
            if free {
                self.occupied[pos].store(true, Ordering::Relaxed);
            }
            self.release(lock);

            if free {
                break pos;
            }
        };

        overflow.slots.insert(head.bits(), slot);
        self.accessors[gid].store(0, Ordering::Relaxed);
    }

    /// Re-read every input and set, for each k-mer found in the graph, the
    /// color bit of its unitig. Workers pull chunks of at most 1000
    /// `(substring, color)` pairs from a shared scanner; long records are
    /// sliced with a k-1 overlap so every k-mer survives slicing intact.
    pub fn build_color_sets(
        &self,
        graph: &UnitigGraph,
        files: &[PathBuf],
        nb_threads: usize,
    ) -> Result<()> {
        let k = graph.k();
        let scanner = Mutex::new(ChunkScanner::new(files, k));
        let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for _ in 0..nb_threads.max(1) {
                scope.spawn(|| loop {
                    let chunk = {
                        let mut scanner = scanner.lock().expect("scanner mutex");
                        match scanner.next_chunk() {
                            Ok(Some(chunk)) => chunk,
                            Ok(None) => break,
                            Err(e) => {
                                let mut slot = first_error.lock().expect("error mutex");
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                                break;
                            }
                        }
                    };

                    for (slice, color) in &chunk {
                        self.color_slice(graph, slice, *color);
                    }
                });
            }
        });

        match first_error.into_inner().expect("error mutex") {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn color_slice(&self, graph: &UnitigGraph, slice: &[u8], color: u32) {
        let k = graph.k();
        let space = MinimizerSpace::new(slice, graph.g(), graph.min_hasher());
        let kmers: Vec<Kmer> = KmerScanner::new(slice, k).map(|(km, _)| km).collect();

        let mut pos = 0usize;
        while pos < kmers.len() {
            let um = graph.find_unitig_in(&kmers[pos], slice, pos, &space);
            if um.is_empty {
                pos += 1;
                continue;
            }

            let slot = self.slot_of(graph, &um);
            let lock = self.acquire(slot);
            unsafe { &mut *self.sets[slot].get() }.insert(color);
            self.release(lock);

            pos += um.len;
        }
    }

    /// Re-pick every set's representation for its final density
    pub fn optimize(&mut self) {
        self.sets.par_iter_mut().for_each(|set| set.get_mut().optimize());
    }

    /// Serialize the table (little-endian, magic + version header)
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(COLORS_MAGIC)?;
        w.write_all(&COLORS_VERSION.to_le_bytes())?;
        w.write_all(&(self.nb_color_sets as u64).to_le_bytes())?;
        w.write_all(&(self.max_nb_hash as u64).to_le_bytes())?;

        for &seed in &self.seed_values {
            w.write_all(&seed.to_le_bytes())?;
        }

        w.write_all(&(self.accessors.len() as u64).to_le_bytes())?;
        for a in &self.accessors {
            w.write_all(&[a.load(Ordering::Relaxed)])?;
        }

        let overflow = self.overflow.lock().expect("overflow mutex");
        w.write_all(&(overflow.slots.len() as u64).to_le_bytes())?;
        let mut entries: Vec<(u128, usize)> =
            overflow.slots.iter().map(|(&k, &v)| (k, v)).collect();
        entries.sort_unstable();
        for (bits, slot) in entries {
            w.write_all(&bits.to_le_bytes())?;
            w.write_all(&(slot as u64).to_le_bytes())?;
        }
        drop(overflow);

        for (set, occ) in self.sets.iter().zip(&self.occupied) {
            w.write_all(&[occ.load(Ordering::Relaxed) as u8])?;
            unsafe { &*set.get() }.write_to(w)?;
        }

        Ok(())
    }

    /// Inverse of [`write_to`](Self::write_to); the graph supplies the
    /// frozen abundant-bucket order
    pub fn read_from<R: Read>(r: &mut R, graph: &UnitigGraph) -> io::Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != COLORS_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad colors file magic"));
        }

        let mut b4 = [0u8; 4];
        r.read_exact(&mut b4)?;
        let version = u32::from_le_bytes(b4);
        if version != COLORS_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported colors file version {}", version),
            ));
        }

        let mut b8 = [0u8; 8];
        r.read_exact(&mut b8)?;
        let nb_color_sets = u64::from_le_bytes(b8) as usize;
        r.read_exact(&mut b8)?;
        let max_nb_hash = u64::from_le_bytes(b8) as usize;

        let mut seed_values = Vec::with_capacity(max_nb_hash);
        for _ in 0..max_nb_hash {
            r.read_exact(&mut b8)?;
            seed_values.push(u64::from_le_bytes(b8));
        }
        let hashers: Vec<DeterministicHasher> =
            seed_values.iter().map(|&s| DeterministicHasher::new(s)).collect();

        r.read_exact(&mut b8)?;
        let nb_accessors = u64::from_le_bytes(b8) as usize;
        let mut accessors = Vec::with_capacity(nb_accessors);
        let mut b1 = [0u8; 1];
        for _ in 0..nb_accessors {
            r.read_exact(&mut b1)?;
            accessors.push(AtomicU8::new(b1[0]));
        }

        r.read_exact(&mut b8)?;
        let nb_overflow = u64::from_le_bytes(b8) as usize;
        let mut slots = AHashMap::with_capacity(nb_overflow);
        let mut b16 = [0u8; 16];
        for _ in 0..nb_overflow {
            r.read_exact(&mut b16)?;
            let bits = u128::from_le_bytes(b16);
            r.read_exact(&mut b8)?;
            slots.insert(bits, u64::from_le_bytes(b8) as usize);
        }
        let overflow = OverflowMap { last_empty_pos: 0, slots };

        let mut sets = Vec::with_capacity(nb_color_sets);
        let mut occupied = Vec::with_capacity(nb_color_sets);
        for _ in 0..nb_color_sets {
            r.read_exact(&mut b1)?;
            occupied.push(AtomicBool::new(b1[0] != 0));
            sets.push(UnsafeCell::new(ColorSet::read_from(r)?));
        }

        Ok(Self {
            nb_color_sets,
            max_nb_hash,
            seed_values,
            hashers,
            sets,
            occupied,
            locks: (0..LOCKS_PER_THREAD).map(|_| AtomicBool::new(false)).collect(),
            overflow: Mutex::new(overflow),
            accessors,
            abundant_buckets: graph.abundant_buckets(),
        })
    }
}

/// Overflow state: the scan cursor and the slots taken through it
#[derive(Default)]
struct OverflowMap {
    last_empty_pos: usize,
    slots: AHashMap<u128, usize>,
}

/// Shared input scanner: files -> records -> ACGT fragments -> slices of at
/// most [`CHUNK_SIZE`] bases (overlapping by k-1), tagged with their color
struct ChunkScanner {
    files: Vec<PathBuf>,
    next_file: usize,
    k: usize,
    pending: VecDeque<(Vec<u8>, u32)>,
}

impl ChunkScanner {
    fn new(files: &[PathBuf], k: usize) -> Self {
        Self {
            files: files.to_vec(),
            next_file: 0,
            k,
            pending: VecDeque::new(),
        }
    }

    fn refill(&mut self) -> Result<bool> {
        while self.pending.is_empty() {
            if self.next_file >= self.files.len() {
                return Ok(false);
            }

            let color = self.next_file as u32;
            let path = &self.files[self.next_file];
            self.next_file += 1;

            let k = self.k;
            let pending = &mut self.pending;
            parse_sequences(path, |seq| {
                for frag in valid_fragments(seq, k) {
                    for slice in slice_with_overlap(frag, k) {
                        pending.push_back((slice.to_vec(), color));
                    }
                }
                Ok(())
            })
            .with_context(|| format!("re-reading {} for color mapping", path.display()))?;
        }

        Ok(true)
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<(Vec<u8>, u32)>>> {
        if !self.refill()? {
            return Ok(None);
        }

        let take = self.pending.len().min(CHUNK_SIZE);
        Ok(Some(self.pending.drain(..take).collect()))
    }
}

/// Cut `frag` into windows of at most [`CHUNK_SIZE`] bases overlapping by
/// k-1, so that every k-mer of `frag` appears intact in some window
fn slice_with_overlap(frag: &[u8], k: usize) -> Vec<&[u8]> {
    if frag.len() <= CHUNK_SIZE {
        return vec![frag];
    }

    let stride = CHUNK_SIZE - (k - 1);
    let mut slices = Vec::new();
    let mut start = 0usize;

    while start + k <= frag.len() {
        let end = (start + CHUNK_SIZE).min(frag.len());
        slices.push(&frag[start..end]);
        if end == frag.len() {
            break;
        }
        start += stride;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::KmerScanner;
    use crate::oracle::ExactKmerSet;

    fn build_graph(seqs: &[&[u8]]) -> UnitigGraph {
        let mut graph = UnitigGraph::new(5, 3);
        let mut oracle = ExactKmerSet::new();
        for seq in seqs {
            for (km, _) in KmerScanner::new(seq, 5) {
                oracle.insert(&km);
            }
        }
        let mut tips = Vec::new();
        for seq in seqs {
            for (km, pos) in KmerScanner::new(seq, 5) {
                if graph.find(&km).is_empty {
                    graph.add_unitig_sequence(&oracle, &km, seq, pos, None, &mut tips);
                }
            }
        }
        graph
    }

    #[test]
    fn test_slice_with_overlap_covers_every_kmer() {
        let frag: Vec<u8> = (0..2500).map(|i| b"ACGT"[i % 4]).collect();
        let k = 5;
        let slices = slice_with_overlap(&frag, k);
        assert!(slices.len() > 1);
        for s in &slices {
            assert!(s.len() <= CHUNK_SIZE);
        }

        // Each consecutive pair overlaps by exactly k-1 bases
        let stride = CHUNK_SIZE - (k - 1);
        let mut covered = 0usize;
        for (i, s) in slices.iter().enumerate() {
            let start = i * stride;
            assert_eq!(&frag[start..start + s.len()], &s[..]);
            covered = covered.max(start + s.len());
        }
        assert_eq!(covered, frag.len());
    }

    #[test]
    fn test_every_unitig_gets_exactly_one_slot() {
        let graph = build_graph(&[b"AAAAACCCCC", b"AAAAAGTGTG"]);
        let table = ColorTable::new(&graph, 4, 2);
        table.init_color_sets(&graph, 2);

        let mut slots = Vec::new();
        for seq in [b"AAAAACCCCC".as_slice(), b"AAAAAGTGTG"] {
            for (km, _) in KmerScanner::new(seq, 5) {
                let um = graph.find(&km);
                assert!(!um.is_empty);
                slots.push(table.slot_of(&graph, &um));
            }
        }

        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), graph.unitig_count());
    }

    #[test]
    fn test_build_color_sets_from_files() -> Result<()> {
        use std::io::Write as _;

        let graph = build_graph(&[b"AAAAACCCCC", b"AAAAAGTGTG"]);
        let table = ColorTable::new(&graph, 4, 2);
        table.init_color_sets(&graph, 2);

        let mut f0 = tempfile::NamedTempFile::new()?;
        writeln!(f0, ">r0\nAAAAACCCCC")?;
        f0.flush()?;
        let mut f1 = tempfile::NamedTempFile::new()?;
        writeln!(f1, ">r1\nAAAAAGTGTG")?;
        f1.flush()?;

        let files = vec![f0.path().to_path_buf(), f1.path().to_path_buf()];
        table.build_color_sets(&graph, &files, 2)?;

        // Branch k-mer carries both colors; tails carry one each
        let um = graph.find(&Kmer::from_str("AAAAA").unwrap());
        let cs = table.color_set(&graph, &um);
        assert!(cs.contains(0) && cs.contains(1));

        let um = graph.find(&Kmer::from_str("CCCCC").unwrap());
        let cs = table.color_set(&graph, &um);
        assert!(cs.contains(0) && !cs.contains(1));

        let um = graph.find(&Kmer::from_str("GTGTG").unwrap());
        let cs = table.color_set(&graph, &um);
        assert!(cs.contains(1) && !cs.contains(0));

        Ok(())
    }

    #[test]
    fn test_tight_table_still_assigns_all() {
        // Barely more slots than unitigs: collisions resolve through the
        // seeded probes or the overflow cursor, never losing a unitig
        let graph = build_graph(&[b"AAAAACCCCC", b"AAAAAGTGTG"]);
        let mut table = ColorTable::new(&graph, 4, 1);
        table.nb_color_sets = graph.unitig_count() + 1;
        table.sets = (0..table.nb_color_sets).map(|_| UnsafeCell::new(ColorSet::new())).collect();
        table.occupied = (0..table.nb_color_sets).map(|_| AtomicBool::new(false)).collect();

        table.init_color_sets(&graph, 1);

        let mut slots = Vec::new();
        for seq in [b"AAAAACCCCC".as_slice(), b"AAAAAGTGTG"] {
            for (km, _) in KmerScanner::new(seq, 5) {
                let um = graph.find(&km);
                slots.push(table.slot_of(&graph, &um));
            }
        }
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), graph.unitig_count());
    }

    #[test]
    fn test_table_serialization_roundtrip() -> Result<()> {
        use std::io::Write as _;

        let graph = build_graph(&[b"AAAAACCCCC"]);
        let mut table = ColorTable::new(&graph, 4, 1);
        table.init_color_sets(&graph, 1);

        let mut f0 = tempfile::NamedTempFile::new()?;
        writeln!(f0, ">r0\nAAAAACCCCC")?;
        f0.flush()?;
        table.build_color_sets(&graph, &[f0.path().to_path_buf()], 1)?;
        table.optimize();

        let mut buf = Vec::new();
        table.write_to(&mut buf)?;
        let back = ColorTable::read_from(&mut &buf[..], &graph)?;

        assert_eq!(back.nb_color_sets(), table.nb_color_sets());
        for (km, _) in KmerScanner::new(b"AAAAACCCCC", 5) {
            let um = graph.find(&km);
            assert_eq!(back.slot_of(&graph, &um), table.slot_of(&graph, &um));
            assert!(back.color_set(&graph, &um).contains(0));
        }

        Ok(())
    }
}
