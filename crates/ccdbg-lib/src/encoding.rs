//! DNA nucleotide encoding
//!
//! 2-bit encoding with A=00, C=01, G=10, T=11, so the integer order of two
//! equal-length packed words equals the lexicographic order of the strings.
//! The canonical-form tie-break everywhere in the graph relies on this.

use thiserror::Error;

/// Error type for encoding operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The input byte is not a valid DNA base (A/C/G/T)
    #[error("Invalid DNA base: {0:?}")]
    InvalidBase(u8),
    /// The input string length does not match the expected k-mer length
    #[error("K-mer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected k-mer length
        expected: usize,
        /// Actual string length
        actual: usize,
    },
}

/// Encode a single DNA nucleotide to 2 bits
#[inline]
pub const fn encode_base(base: u8) -> Result<u8, EncodingError> {
    match base {
        b'A' | b'a' => Ok(0b00),
        b'C' | b'c' => Ok(0b01),
        b'G' | b'g' => Ok(0b10),
        b'T' | b't' => Ok(0b11),
        _ => Err(EncodingError::InvalidBase(base)),
    }
}

/// Decode a 2-bit value to a DNA nucleotide (uppercase)
#[inline]
pub const fn decode_base(bits: u8) -> u8 {
    match bits & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b10 => b'G',
        _ => b'T',
    }
}

/// Get the complement of an encoded base
#[inline]
pub const fn complement_base(bits: u8) -> u8 {
    // A(00) <-> T(11), C(01) <-> G(10): complement is bitwise NOT
    !bits & 0b11
}

/// Check whether a byte is a valid DNA base
#[inline]
pub const fn is_dna_base(base: u8) -> bool {
    matches!(base, b'A' | b'a' | b'C' | b'c' | b'G' | b'g' | b'T' | b't')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_base() {
        assert_eq!(encode_base(b'A').unwrap(), 0b00);
        assert_eq!(encode_base(b'a').unwrap(), 0b00);
        assert_eq!(encode_base(b'C').unwrap(), 0b01);
        assert_eq!(encode_base(b'G').unwrap(), 0b10);
        assert_eq!(encode_base(b'T').unwrap(), 0b11);
        assert_eq!(encode_base(b't').unwrap(), 0b11);

        assert!(encode_base(b'N').is_err());
        assert!(encode_base(b'X').is_err());
        assert!(encode_base(b'0').is_err());
    }

    #[test]
    fn test_encoding_is_alphabetical() {
        // Lexicographic comparisons of packed k-mers depend on this ordering
        assert!(encode_base(b'A').unwrap() < encode_base(b'C').unwrap());
        assert!(encode_base(b'C').unwrap() < encode_base(b'G').unwrap());
        assert!(encode_base(b'G').unwrap() < encode_base(b'T').unwrap());
    }

    #[test]
    fn test_decode_base() {
        assert_eq!(decode_base(0b00), b'A');
        assert_eq!(decode_base(0b01), b'C');
        assert_eq!(decode_base(0b10), b'G');
        assert_eq!(decode_base(0b11), b'T');
    }

    #[test]
    fn test_complement_base() {
        assert_eq!(complement_base(0b00), 0b11); // A -> T
        assert_eq!(complement_base(0b11), 0b00); // T -> A
        assert_eq!(complement_base(0b01), 0b10); // C -> G
        assert_eq!(complement_base(0b10), 0b01); // G -> C
    }

    #[test]
    fn test_is_dna_base() {
        assert!(is_dna_base(b'A'));
        assert!(is_dna_base(b'g'));
        assert!(!is_dna_base(b'N'));
        assert!(!is_dna_base(b'-'));
    }
}
