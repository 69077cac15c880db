use std::mem;

use crate::MIN_ALIGN;

/// Index of a block descriptor inside the [`crate::directory::Directory`]
/// slab. Descriptors link to their neighbors through these indices, never
/// through pointers, so a stale index can at worst hit a vacant slot (which
/// panics) instead of freed memory.
pub(crate) type BlockIdx = usize;

/// A free block is only split when the remainder could pay for the
/// bookkeeping of one more descriptor and still hold a minimum payload.
/// Remainders below this threshold stay attached to the allocated block
/// as internal fragmentation.
pub(crate) const SPLIT_THRESHOLD: usize = mem::size_of::<Block>() + MIN_ALIGN;

/// Descriptor for one contiguous sub-range of the arena.
///
/// Unlike a classic header-in-band allocator, the descriptor does not live
/// inside the bytes it describes. The arena stays a plain byte range and the
/// directory keeps every descriptor out-of-band:
///
/// ```text
///  Directory (slab of descriptors)
///  +--------------+--------------+--------------+
///  | start:    0  | start:   64  | start:  256  |
///  | size:    64  | size:   192  | size:  3840  |
///  | free         | allocated    | free         |
///  +------|-------+------|-------+------|-------+
///         |              |              |
///  Arena  v              v              v
///  +--------------+--------------+----------------------------+
///  |   [0, 64)    |  [64, 256)   |        [256, 4096)         |
///  +--------------+--------------+----------------------------+
/// ```
///
/// Descriptors always partition the arena exactly: ranges are contiguous,
/// non-overlapping, and sum to the arena size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    /// Offset of the range within the arena.
    pub start: usize,
    /// Size of the range in bytes.
    pub size: usize,
    /// Flag to tell whether the block is free or not.
    pub is_free: bool,
    /// Index of the descriptor covering the range right before this one.
    pub prev: Option<BlockIdx>,
    /// Index of the descriptor covering the range right after this one.
    pub next: Option<BlockIdx>,
}

impl Block {
    /// Creates an unlinked free descriptor. The directory fills in the
    /// links on insertion.
    pub fn free(start: usize, size: usize) -> Self {
        Self {
            start,
            size,
            is_free: true,
            prev: None,
            next: None,
        }
    }

    /// Offset one past the end of the range.
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_threshold_admits_minimal_payload() {
        // A remainder at the threshold must cover one descriptor's worth of
        // overhead and still leave room for the smallest request.
        assert!(SPLIT_THRESHOLD >= mem::size_of::<Block>() + MIN_ALIGN);
    }

    #[test]
    fn end_is_exclusive() {
        let block = Block::free(64, 192);
        assert_eq!(block.end(), 256);
    }
}
