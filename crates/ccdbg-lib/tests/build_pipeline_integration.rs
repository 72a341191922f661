//! End-to-end pipeline tests: build -> colors -> write
//!
//! Small k=5 / g=3 fixtures exercising unitig compaction at branches,
//! self-loops, coverage-driven splitting, tip clipping and the color
//! round-trip, plus the GFA export.

use ccdbg_lib::kmer::{Kmer, KmerScanner};
use ccdbg_lib::{ColoredCdbg, GraphConfig};
use std::io::Write as _;
use tempfile::NamedTempFile;

fn fasta(records: &[&str]) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    for (i, seq) in records.iter().enumerate() {
        writeln!(f, ">r{}", i).unwrap();
        writeln!(f, "{}", seq).unwrap();
    }
    f.flush().unwrap();
    f
}

fn config_for(files: &[&NamedTempFile]) -> GraphConfig {
    GraphConfig {
        k: 5,
        g: 3,
        filename_seq_in: files.iter().map(|f| f.path().to_path_buf()).collect(),
        ..GraphConfig::default()
    }
}

fn built(files: &[&NamedTempFile], tweak: impl FnOnce(&mut GraphConfig)) -> ColoredCdbg {
    let mut config = config_for(files);
    tweak(&mut config);
    let mut cdbg = ColoredCdbg::new(config);
    assert!(cdbg.build(), "build failed");
    cdbg
}

/// Every k-mer of `seq` resolves to exactly one (unitig, offset, strand)
/// whose stored sequence really carries the k-mer at that offset.
fn assert_all_kmers_mapped(cdbg: &ColoredCdbg, seq: &[u8]) {
    for (km, pos) in KmerScanner::new(seq, 5) {
        let um = cdbg.graph().find(&km);
        assert!(!um.is_empty, "k-mer {} (read offset {}) not found", km, pos);
        assert_eq!(um.len, 1);

        let mapped = cdbg.graph().mapped_sequence(&um);
        let at = if um.strand { um.dist } else { um.size - 5 - um.dist };
        assert_eq!(
            &mapped[at..at + 5],
            &km.to_seq()[..],
            "k-mer {} not at reported offset",
            km
        );
    }
}

#[test]
fn test_single_input_one_unitig() {
    let f = fasta(&["AAAAACCCCC"]);
    let mut cdbg = built(&[&f], |_| {});

    let graph = cdbg.graph();
    assert_eq!(graph.unitig_count(), 1);
    assert_eq!(graph.n_long(), 1);

    let unitig = graph.long_unitig(0);
    assert_eq!(unitig.seq.to_string(), "AAAAACCCCC");
    assert_eq!(unitig.num_kmers(5), 6);
    for i in 0..6 {
        assert_eq!(unitig.ccov.cov_at(i), 1, "k-mer {} coverage", i);
    }
    assert_eq!(unitig.coveragesum, 6);

    assert_all_kmers_mapped(&cdbg, b"AAAAACCCCC");

    assert!(cdbg.map_colors());
    let colors = cdbg.colors().unwrap();
    for (km, _) in KmerScanner::new(b"AAAAACCCCC", 5) {
        let um = cdbg.graph().find(&km);
        let cs = colors.color_set(cdbg.graph(), &um);
        assert!(cs.contains(0));
        assert_eq!(cs.len(), 1);
    }

    assert!(cdbg.check_colors());
}

#[test]
fn test_two_inputs_split_at_branch() {
    // AAAAA extends into AAAAC and AAAAG: the branch k-mer becomes its own
    // one-k-mer unitig carrying both colors, the tails split off it
    let f0 = fasta(&["AAAAACCCCC"]);
    let f1 = fasta(&["AAAAAGTGTG"]);
    let mut cdbg = built(&[&f0, &f1], |_| {});

    assert_eq!(cdbg.graph().unitig_count(), 3);
    assert_all_kmers_mapped(&cdbg, b"AAAAACCCCC");
    assert_all_kmers_mapped(&cdbg, b"AAAAAGTGTG");

    // The branch is a single-k-mer unitig
    let branch = cdbg.graph().find(&Kmer::from_str("AAAAA").unwrap());
    assert!(branch.is_short);
    assert_eq!(branch.size, 5);

    assert!(cdbg.map_colors());
    assert!(cdbg.check_colors());

    let graph = cdbg.graph();
    let colors = cdbg.colors().unwrap();

    let cs = colors.color_set(graph, &branch);
    assert!(cs.contains(0) && cs.contains(1), "branch carries both colors");

    let um = graph.find(&Kmer::from_str("AAAAC").unwrap());
    let cs = colors.color_set(graph, &um);
    assert!(cs.contains(0) && !cs.contains(1));

    let um = graph.find(&Kmer::from_str("GTGTG").unwrap());
    let cs = colors.color_set(graph, &um);
    assert!(cs.contains(1) && !cs.contains(0));
}

#[test]
fn test_reverse_complement_sharing_across_inputs() {
    // GGGGG is the twin of CCCCC, so the two tails of this branch share a
    // canonical k-mer and cannot both own it: the graph must still map
    // every k-mer of both inputs exactly once, and the unitig holding
    // CCCCC/GGGGG must carry both colors
    let f0 = fasta(&["AAAAACCCCC"]);
    let f1 = fasta(&["AAAAAGGGGG"]);
    let mut cdbg = built(&[&f0, &f1], |_| {});

    assert_all_kmers_mapped(&cdbg, b"AAAAACCCCC");
    assert_all_kmers_mapped(&cdbg, b"AAAAAGGGGG");

    // The branch split still happened
    let branch = cdbg.graph().find(&Kmer::from_str("AAAAA").unwrap());
    assert!(branch.is_short);

    assert!(cdbg.map_colors());
    assert!(cdbg.check_colors());

    let graph = cdbg.graph();
    let colors = cdbg.colors().unwrap();

    let shared = graph.find(&Kmer::from_str("CCCCC").unwrap());
    assert!(!shared.is_empty);
    let cs = colors.color_set(graph, &shared);
    assert!(cs.contains(0) && cs.contains(1), "shared canonical k-mer sees both inputs");

    let um = graph.find(&Kmer::from_str("AAAAC").unwrap());
    let cs = colors.color_set(graph, &um);
    assert!(cs.contains(0) && !cs.contains(1));
}

#[test]
fn test_self_loop_single_unitig() {
    let f = fasta(&["ACGTACGTACGT"]);
    let cdbg = built(&[&f], |_| {});

    assert_eq!(cdbg.graph().unitig_count(), 1);

    // Every k-mer of the 4-periodic cycle maps into the one unitig
    for (km, _) in KmerScanner::new(b"ACGTACGTACGT", 5) {
        let um = cdbg.graph().find(&km);
        assert!(!um.is_empty, "loop k-mer {} unmapped", km);
        assert_eq!(um.pos_unitig, 0);
    }
}

#[test]
fn test_coverage_split_removes_single_observation() {
    let f = fasta(&["AAAAACCCCC"]);
    let cdbg = built(&[&f], |c| c.min_count = 2);

    // One observation never reaches the coverage ceiling: everything goes
    assert_eq!(cdbg.graph().unitig_count(), 0);
    for (km, _) in KmerScanner::new(b"AAAAACCCCC", 5) {
        assert!(cdbg.graph().find(&km).is_empty);
    }
}

#[test]
fn test_coverage_split_keeps_repeated_observation() {
    let f = fasta(&["AAAAACCCCC", "AAAAACCCCC"]);
    let cdbg = built(&[&f], |c| c.min_count = 2);

    assert_eq!(cdbg.graph().unitig_count(), 1);
    assert_all_kmers_mapped(&cdbg, b"AAAAACCCCC");
}

#[test]
fn test_tip_clipping() {
    // A chain with a one-k-mer side tip AAAAT hanging off the AAAA run
    let f0 = fasta(&["AAAAACCCCCGTGTG"]);
    let f1 = fasta(&["AAAAT"]);
    let cdbg = built(&[&f0, &f1], |c| c.clip_tips = true);

    // The tip is gone, the chain's k-mers all survive
    assert!(cdbg.graph().find(&Kmer::from_str("AAAAT").unwrap()).is_empty);
    for (km, _) in KmerScanner::new(b"AAAAACCCCCGTGTG", 5) {
        assert!(!cdbg.graph().find(&km).is_empty, "chain k-mer {} lost", km);
    }
}

#[test]
fn test_input_shorter_than_k() {
    let f = fasta(&["ACG"]);
    let cdbg = built(&[&f], |_| {});
    assert_eq!(cdbg.graph().unitig_count(), 0);
}

#[test]
fn test_input_of_length_exactly_k() {
    let f = fasta(&["ACGTC"]);
    let mut cdbg = built(&[&f], |_| {});

    assert_eq!(cdbg.graph().unitig_count(), 1);
    assert_eq!(cdbg.graph().n_short(), 1);

    let um = cdbg.graph().find(&Kmer::from_str("ACGTC").unwrap());
    assert!(um.is_short);

    assert!(cdbg.map_colors());
    assert!(cdbg.check_colors());
}

#[test]
fn test_smallest_minimizer_gap() {
    // g = k - 1: each window holds exactly two g-mer positions
    let f = fasta(&["ACGGATTTACGCA"]);
    let mut cdbg = built(&[&f], |c| c.g = 4);

    assert_all_kmers_mapped(&cdbg, b"ACGGATTTACGCA");
    assert!(cdbg.map_colors());
    assert!(cdbg.check_colors());
}

#[test]
fn test_large_k() {
    // k = 63 (MAX_K) over a read with a single unitig
    let seq = "ACGGATTTACGCATGCAAGTCCGATTGCAATCGGATTACCAGTTGACCGTAAGGTCTTACGCATCAGT";
    let f = fasta(&[seq]);

    let mut config = GraphConfig {
        k: 63,
        g: 31,
        filename_seq_in: vec![f.path().to_path_buf()],
        ..GraphConfig::default()
    };
    config.validate().unwrap();

    let mut cdbg = ColoredCdbg::new(config);
    assert!(cdbg.build());

    for (km, _) in KmerScanner::new(seq.as_bytes(), 63) {
        assert!(!cdbg.graph().find(&km).is_empty);
    }

    assert!(cdbg.map_colors());
    assert!(cdbg.check_colors());
}

#[test]
fn test_gfa_roundtrip_multiset_of_sequences() {
    let f0 = fasta(&["AAAAACCCCC"]);
    let f1 = fasta(&["AAAAAGTGTG"]);
    let mut cdbg = built(&[&f0, &f1], |_| {});
    assert!(cdbg.map_colors());

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("graph");
    let prefix = prefix.to_str().unwrap();
    assert!(cdbg.write(prefix));

    // Re-parse the S-lines and compare canonical sequence multisets
    let gfa = std::fs::read_to_string(format!("{}.gfa", prefix)).unwrap();
    let mut from_gfa: Vec<String> = gfa
        .lines()
        .filter(|l| l.starts_with("S\t"))
        .map(|l| {
            let seq = l.split('\t').nth(2).unwrap().as_bytes();
            canonical_string(seq)
        })
        .collect();
    from_gfa.sort();

    let graph = cdbg.graph();
    let mut from_graph: Vec<String> = Vec::new();
    for id in 0..graph.n_long() {
        from_graph.push(canonical_string(&graph.long_unitig(id).seq.to_seq()));
    }
    for id in 0..graph.n_short() {
        from_graph.push(canonical_string(&graph.short_kmer(id).to_seq()));
    }
    for bucket in graph.abundant_buckets() {
        from_graph.push(canonical_string(&graph.abundant_kmer(bucket).to_seq()));
    }
    from_graph.sort();

    assert_eq!(from_gfa, from_graph);

    // The colors side-file exists alongside
    assert!(std::fs::metadata(format!("{}.bfg_colors", prefix)).is_ok());
}

/// The lexicographically smaller of a sequence and its reverse complement
fn canonical_string(seq: &[u8]) -> String {
    let fwd = String::from_utf8(seq.to_vec()).unwrap();
    let rc: String = seq
        .iter()
        .rev()
        .map(|&b| match b {
            b'A' => 'T',
            b'C' => 'G',
            b'G' => 'C',
            _ => 'A',
        })
        .collect();
    fwd.min(rc)
}

#[test]
fn test_colors_file_reload() {
    let f0 = fasta(&["AAAAACCCCC"]);
    let f1 = fasta(&["AAAAAGTGTG"]);
    let mut cdbg = built(&[&f0, &f1], |_| {});
    assert!(cdbg.map_colors());

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("graph");
    let prefix = prefix.to_str().unwrap();
    assert!(cdbg.write(prefix));

    // A second build that loads the colors file instead of re-mapping
    let colors_path = format!("{}.bfg_colors", prefix);
    let mut config = config_for(&[&f0, &f1]);
    config.filename_colors_in = Some(colors_path.into());

    let mut reloaded = ColoredCdbg::new(config);
    assert!(reloaded.build());
    assert!(reloaded.map_colors());
    assert!(reloaded.check_colors());
}

#[test]
fn test_multithreaded_colors_match_reference() {
    let f0 = fasta(&["AAAAACCCCC", "ACGGATTTACGCA"]);
    let f1 = fasta(&["AAAAAGTGTG", "ACGGATTTACGCA"]);
    let mut cdbg = built(&[&f0, &f1], |c| c.nb_threads = 4);

    assert!(cdbg.map_colors());
    assert!(cdbg.check_colors());

    // The record shared by both files carries both colors everywhere
    let graph = cdbg.graph();
    let colors = cdbg.colors().unwrap();
    for (km, _) in KmerScanner::new(b"ACGGATTTACGCA", 5) {
        let um = graph.find(&km);
        let cs = colors.color_set(graph, &um);
        assert!(cs.contains(0) && cs.contains(1));
    }
}
