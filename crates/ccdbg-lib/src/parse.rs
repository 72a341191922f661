//! FASTA/FASTQ input parsing
//!
//! Reads DNA sequences through needletail (transparent gzip). Records are
//! split at ambiguous bases into ACGT-only fragments; fragments shorter than
//! k carry no k-mer and are dropped at the split.

use crate::encoding::is_dna_base;
use anyhow::{Context, Result};
use needletail::parse_fastx_file;
use std::path::Path;

/// Parse a FASTA/FASTQ file and call `callback` for each record's sequence
pub fn parse_sequences<P, F>(path: P, mut callback: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(&[u8]) -> Result<()>,
{
    let path = path.as_ref();

    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open sequence file: {}", path.display()))?;

    while let Some(record) = reader.next() {
        let record = record
            .with_context(|| format!("Failed to parse sequence record in {}", path.display()))?;
        callback(&record.seq())?;
    }

    Ok(())
}

/// Split a record into its maximal ACGT-only fragments of length >= `min_len`
pub fn valid_fragments(seq: &[u8], min_len: usize) -> Vec<&[u8]> {
    let mut fragments = Vec::new();
    let mut start = 0usize;

    for (i, &base) in seq.iter().enumerate() {
        if !is_dna_base(base) {
            if i - start >= min_len {
                fragments.push(&seq[start..i]);
            }
            start = i + 1;
        }
    }
    if seq.len() - start >= min_len {
        fragments.push(&seq[start..]);
    }

    fragments
}

/// Count the valid bases across all files (used to size the k-mer oracle)
pub fn count_valid_bases<P: AsRef<Path>>(paths: &[P], min_len: usize) -> Result<u64> {
    let mut total = 0u64;
    for path in paths {
        parse_sequences(path, |seq| {
            for frag in valid_fragments(seq, min_len) {
                total += frag.len() as u64;
            }
            Ok(())
        })?;
    }
    Ok(total)
}
