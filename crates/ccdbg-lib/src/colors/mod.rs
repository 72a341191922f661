//! Color sets: which inputs contain a unitig's k-mers
//!
//! Every unitig owns one color set, a set of input-file indices. Sets start
//! as small sorted lists (most unitigs carry one or two colors) and
//! `optimize` migrates dense sets to compressed bitmaps after each build
//! pass.

mod table;

pub use table::ColorTable;

use roaring::RoaringBitmap;
use smallvec::SmallVec;
use std::io::{self, Read, Write};

const SORTED_MAX: usize = 32;

/// A set of color (input file) indices
#[derive(Clone, Debug, PartialEq)]
pub enum ColorSet {
    /// Sparse representation: sorted, deduplicated color list
    Sorted(SmallVec<[u32; 4]>),
    /// Dense representation
    Bitmap(RoaringBitmap),
}

impl Default for ColorSet {
    fn default() -> Self {
        ColorSet::Sorted(SmallVec::new())
    }
}

impl ColorSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a color. Idempotent.
    pub fn insert(&mut self, color: u32) {
        match self {
            ColorSet::Sorted(v) => {
                if let Err(at) = v.binary_search(&color) {
                    v.insert(at, color);
                }
            }
            ColorSet::Bitmap(b) => {
                b.insert(color);
            }
        }
    }

    /// Membership test
    pub fn contains(&self, color: u32) -> bool {
        match self {
            ColorSet::Sorted(v) => v.binary_search(&color).is_ok(),
            ColorSet::Bitmap(b) => b.contains(color),
        }
    }

    /// Number of colors in the set
    pub fn len(&self) -> u64 {
        match self {
            ColorSet::Sorted(v) => v.len() as u64,
            ColorSet::Bitmap(b) => b.len(),
        }
    }

    /// True when no color is set
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate colors in increasing order
    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            ColorSet::Sorted(v) => Box::new(v.iter().copied()),
            ColorSet::Bitmap(b) => Box::new(b.iter()),
        }
    }

    /// Pick the cheaper representation for the current density
    pub fn optimize(&mut self) {
        match self {
            ColorSet::Sorted(v) if v.len() > SORTED_MAX => {
                let bitmap: RoaringBitmap = v.iter().copied().collect();
                *self = ColorSet::Bitmap(bitmap);
            }
            ColorSet::Bitmap(b) if b.len() as usize <= SORTED_MAX => {
                let sorted: SmallVec<[u32; 4]> = b.iter().collect();
                *self = ColorSet::Sorted(sorted);
            }
            _ => {}
        }
    }

    /// Serialize as `tag, payload` (little-endian)
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            ColorSet::Sorted(v) => {
                w.write_all(&[0u8])?;
                w.write_all(&(v.len() as u64).to_le_bytes())?;
                for &c in v.iter() {
                    w.write_all(&c.to_le_bytes())?;
                }
            }
            ColorSet::Bitmap(b) => {
                w.write_all(&[1u8])?;
                let mut bytes = Vec::with_capacity(b.serialized_size());
                b.serialize_into(&mut bytes)?;
                w.write_all(&(bytes.len() as u64).to_le_bytes())?;
                w.write_all(&bytes)?;
            }
        }
        Ok(())
    }

    /// Inverse of [`write_to`](Self::write_to)
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)?;

        let mut len8 = [0u8; 8];
        r.read_exact(&mut len8)?;
        let len = u64::from_le_bytes(len8) as usize;

        match tag[0] {
            0 => {
                let mut v = SmallVec::with_capacity(len);
                let mut c4 = [0u8; 4];
                for _ in 0..len {
                    r.read_exact(&mut c4)?;
                    v.push(u32::from_le_bytes(c4));
                }
                Ok(ColorSet::Sorted(v))
            }
            1 => {
                let mut bytes = vec![0u8; len];
                r.read_exact(&mut bytes)?;
                let b = RoaringBitmap::deserialize_from(&bytes[..])
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(ColorSet::Bitmap(b))
            }
            t => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown color-set tag {}", t),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains() {
        let mut cs = ColorSet::new();
        assert!(cs.is_empty());

        cs.insert(3);
        cs.insert(0);
        cs.insert(3);

        assert_eq!(cs.len(), 2);
        assert!(cs.contains(0));
        assert!(cs.contains(3));
        assert!(!cs.contains(1));
        assert_eq!(cs.iter().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_optimize_switches_representation() {
        let mut cs = ColorSet::new();
        for c in 0..100 {
            cs.insert(c);
        }
        cs.optimize();
        assert!(matches!(cs, ColorSet::Bitmap(_)));
        assert_eq!(cs.len(), 100);
        assert!(cs.contains(42));

        // A bitmap that thinned out converts back
        let mut sparse = ColorSet::Bitmap([1u32, 7].into_iter().collect());
        sparse.optimize();
        assert!(matches!(sparse, ColorSet::Sorted(_)));
        assert!(sparse.contains(7));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sorted = ColorSet::new();
        sorted.insert(2);
        sorted.insert(9);

        let mut dense = ColorSet::new();
        for c in 0..200 {
            dense.insert(c * 3);
        }
        dense.optimize();

        for cs in [sorted, dense] {
            let mut buf = Vec::new();
            cs.write_to(&mut buf).unwrap();
            let back = ColorSet::read_from(&mut &buf[..]).unwrap();
            assert_eq!(back, cs);
        }
    }
}
