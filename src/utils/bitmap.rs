//! Bitmap data structure helper.

use std::fmt;

use crate::utils::TaglogError;

use fixedbitset::FixedBitSet;

/// Compact bitmap for index -> bool mapping, used to track per-server flags
/// (responded, locked, failed) inside a replica set.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap(FixedBitSet);

impl Bitmap {
    /// Creates a new bitmap of given size. If `ones` is true, all slots are
    /// marked true initially; otherwise, all slots are initially false.
    pub fn new(size: usize, ones: bool) -> Self {
        if size == 0 {
            panic!("invalid bitmap size {}", size);
        }
        let mut bitset = FixedBitSet::with_capacity(size);

        if ones {
            bitset.set_range(.., true);
        }

        Bitmap(bitset)
    }

    /// Sets bit at index to given flag.
    #[inline]
    pub fn set(&mut self, idx: usize, flag: bool) -> Result<(), TaglogError> {
        if idx >= self.0.len() {
            return Err(TaglogError::Msg(format!("index {} out of bound", idx)));
        }
        self.0.set(idx, flag);
        Ok(())
    }

    /// Gets the bit flag at index.
    #[inline]
    pub fn get(&self, idx: usize) -> Result<bool, TaglogError> {
        if idx >= self.0.len() {
            return Err(TaglogError::Msg(format!("index {} out of bound", idx)));
        }
        Ok(self.0[idx])
    }

    /// Returns the size of the bitmap.
    #[inline]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Returns the number of trues in the bitmap.
    #[inline]
    pub fn count(&self) -> usize {
        self.0.count_ones(..)
    }

    /// Allows `for (id, bit) in map.iter()`.
    #[inline]
    pub fn iter(&self) -> BitmapIter {
        BitmapIter { map: self, idx: 0 }
    }
}

/// Iterator over `Bitmap`, yielding `(idx, bit)` pairs.
#[derive(Debug, Clone)]
pub struct BitmapIter<'m> {
    map: &'m Bitmap,
    idx: usize,
}

impl Iterator for BitmapIter<'_> {
    type Item = (usize, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.idx;
        if idx < self.map.size() {
            self.idx += 1;
            Some((idx, self.map.get(idx).unwrap()))
        } else {
            None
        }
    }
}

// Implement `Debug` trait manually for better trace printing.
impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}; [", self.size())?;
        let mut first_idx = true;
        for i in self
            .iter()
            .filter_map(|(i, flag)| if flag { Some(i) } else { None })
        {
            if !first_idx {
                write!(f, ", {}", i)?;
            } else {
                write!(f, "{}", i)?;
                first_idx = false;
            }
        }
        write!(f, "]}}")
    }
}

#[cfg(test)]
mod bitmap_tests {
    use super::*;

    #[test]
    #[should_panic]
    fn empty_replica_set_rejected() {
        Bitmap::new(0, false);
    }

    #[test]
    fn mark_responded_servers() {
        // a five-server set with acknowledgments from servers 0 and 3
        let mut responded = Bitmap::new(5, false);
        assert!(responded.set(0, true).is_ok());
        assert!(responded.set(3, true).is_ok());
        assert_eq!(responded.get(0), Ok(true));
        assert_eq!(responded.get(1), Ok(false));
        assert_eq!(responded.get(3), Ok(true));
        // index 5 names no server of this set
        assert!(responded.set(5, true).is_err());
        assert!(responded.get(5).is_err());
    }

    #[test]
    fn duplicate_acks_do_not_inflate_quorum() {
        let mut responded = Bitmap::new(4, false);
        assert_eq!(responded.count(), 0);
        for server in [2, 0, 3] {
            responded.set(server, true).unwrap();
        }
        assert_eq!(responded.count(), 3);
        // a re-delivered acknowledgment leaves the tally unchanged
        responded.set(2, true).unwrap();
        assert_eq!(responded.count(), 3);
    }

    #[test]
    fn failure_flags_iteration() {
        // every server presumed failed until its first heartbeat clears it
        let mut failed = Bitmap::new(3, true);
        failed.set(1, false).unwrap();
        let heard_from: Vec<usize> = failed
            .iter()
            .filter_map(|(server, down)| if !down { Some(server) } else { None })
            .collect();
        assert_eq!(heard_from, vec![1]);
        assert_eq!(failed.count(), 2);
    }
}
