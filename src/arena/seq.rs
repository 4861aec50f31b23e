//! Fixed-capacity sequence of arena text references

use super::{TextRef, ZeroSafe};

/// Ordered, fixed-capacity list of [`TextRef`]s stored inline in a record.
///
/// All-zero is the empty sequence, so it can live in freshly mapped memory.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FixedSeq<const N: usize> {
    items: [TextRef; N],
    len: u32,
}

// SAFETY: an array of TextRef plus a u32 length; zero is the empty sequence.
unsafe impl<const N: usize> ZeroSafe for FixedSeq<N> {}

impl<const N: usize> Default for FixedSeq<N> {
    fn default() -> Self {
        Self {
            items: [TextRef::UNSET; N],
            len: 0,
        }
    }
}

impl<const N: usize> FixedSeq<N> {
    pub const CAPACITY: usize = N;

    /// Append a reference. Hands it back if the sequence is full.
    pub fn push(&mut self, item: TextRef) -> Result<(), TextRef> {
        let len = self.len();
        if len >= N {
            return Err(item);
        }
        self.items[len] = item;
        self.len += 1;
        Ok(())
    }

    /// Number of stored references, clamped to capacity.
    ///
    /// The length may have been written by an untrusted process; use
    /// [`FixedSeq::raw_len`] to detect an out-of-range value.
    pub fn len(&self) -> usize {
        (self.len as usize).min(N)
    }

    /// Length exactly as stored
    pub fn raw_len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    pub fn iter(&self) -> impl Iterator<Item = TextRef> + '_ {
        self.items[..self.len()].iter().copied()
    }
}
