//! Arena lifecycle plus the allocation and deallocation engines.
//!
//! An [`Arena`] owns exactly two things: the page on loan from its provider
//! and the block directory partitioning that page. Every operation is one
//! linear scan of the directory followed by constant-time relinking, and a
//! failed operation never leaves a partial mutation behind.

use log::debug;

use crate::block::{Block, BlockIdx, SPLIT_THRESHOLD};
use crate::directory::Directory;
use crate::error::AllocError;
use crate::provider::{ArenaProvider, Page};
use crate::utils::is_aligned;
use crate::{ARENA_SIZE, MIN_ALIGN};

/// Names an allocated range by its offset within the arena.
///
/// Handles are plain offsets, not pointers: they can go stale (after the
/// block is freed, or after a [`Arena::reset`]) and they can be forged with
/// [`Handle::from_offset`]. The arena re-validates a handle against the
/// directory on every use, so a stale or foreign handle gets an error back
/// instead of scribbling over someone else's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    /// Builds a handle from a raw arena offset.
    pub fn from_offset(offset: usize) -> Self {
        Self(offset)
    }

    /// The raw offset this handle names.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// A fixed-size arena and its free-list bookkeeping.
///
/// The arena is explicit state passed by the caller, not a process-wide
/// singleton: each instance manages its own page and its own directory, and
/// two arenas never interact. The provider is injected so the same
/// bookkeeping runs over OS pages in production and heap pages in tests.
pub struct Arena<P: ArenaProvider> {
    provider: P,
    page: Option<Page>,
    directory: Directory,
}

impl<P: ArenaProvider> Arena<P> {
    /// Creates an arena in the uninitialized state. No memory is acquired
    /// until [`Arena::initialize`] runs.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            page: None,
            directory: Directory::new(),
        }
    }

    /// Acquires the arena page and seeds the directory with one free block
    /// spanning all of it.
    ///
    /// Fails with [`AllocError::AlreadyInitialized`] if the arena is live;
    /// discarding a live arena has to be asked for explicitly through
    /// [`Arena::reset`]. Fails with [`AllocError::Initialization`] if the
    /// provider cannot supply the page, in which case the arena is left
    /// exactly as it was.
    pub fn initialize(&mut self) -> Result<(), AllocError> {
        if self.page.is_some() {
            return Err(AllocError::AlreadyInitialized);
        }

        let page = self
            .provider
            .request_page(ARENA_SIZE)
            .map_err(AllocError::Initialization)?;

        self.directory.seed(Block::free(0, page.len()));
        self.page = Some(page);

        debug!("arena initialized, one free block of {ARENA_SIZE} bytes");
        Ok(())
    }

    /// Returns the page to the provider and drops every descriptor.
    ///
    /// Calling this on an uninitialized arena is a no-op success. If the
    /// provider refuses the release, the page handle is forfeited (it must
    /// not be treated as valid afterwards), the directory is cleared, and
    /// the error is reported; the arena is back in the uninitialized state
    /// either way, so the caller can start over with a fresh `initialize`.
    pub fn teardown(&mut self) -> Result<(), AllocError> {
        let Some(page) = self.page.take() else {
            debug!("teardown on an uninitialized arena, nothing to do");
            return Ok(());
        };

        self.directory.clear();
        self.provider
            .release_page(page)
            .map_err(AllocError::Teardown)?;

        debug!("arena page released back to the provider");
        Ok(())
    }

    /// Tears the arena down and initializes it again, discarding every live
    /// allocation. This is the explicit form of the "re-initialize resets
    /// everything" convenience; handles obtained before the reset are stale
    /// afterwards.
    pub fn reset(&mut self) -> Result<(), AllocError> {
        self.teardown()?;
        self.initialize()
    }

    /// Allocates `size` bytes out of the first free block large enough.
    ///
    /// `size` must be a positive multiple of [`MIN_ALIGN`]; requests are
    /// rejected, never rounded. When the chosen block is larger than the
    /// request and the excess could hold a descriptor plus a minimal
    /// payload, the block is split and the tail stays free. A smaller
    /// excess travels with the allocation as internal fragmentation, so the
    /// granted block can be bigger than asked for.
    pub fn allocate(&mut self, size: usize) -> Result<Handle, AllocError> {
        if size == 0 || !is_aligned(size, MIN_ALIGN) {
            return Err(AllocError::InvalidSize(size));
        }

        // First fit: lowest-addressed free block that can take the request.
        // An uninitialized arena has an empty directory and falls through
        // to NoFit here.
        let idx = self
            .directory
            .iter()
            .find(|(_, block)| block.is_free && block.size >= size)
            .map(|(idx, _)| idx)
            .ok_or(AllocError::NoFit(size))?;

        let remainder = self.directory.get(idx).size - size;
        if remainder >= SPLIT_THRESHOLD {
            let tail_start = self.directory.get(idx).start + size;
            self.directory
                .insert_after(idx, Block::free(tail_start, remainder));
            self.directory.get_mut(idx).size = size;
        }

        let block = self.directory.get_mut(idx);
        block.is_free = false;

        debug!("allocated {} bytes at offset {}", block.size, block.start);
        Ok(Handle(block.start))
    }

    /// Frees the block named by `handle` and coalesces it with free
    /// neighbors.
    ///
    /// The handle must be in bounds, must name the exact start of a block
    /// (interior offsets are rejected as [`AllocError::InvalidPointer`]),
    /// and that block must currently be allocated (else
    /// [`AllocError::DoubleFree`]). Validation failures leave the directory
    /// untouched.
    pub fn deallocate(&mut self, handle: Handle) -> Result<(), AllocError> {
        let offset = handle.offset();

        let arena_len = self.page.as_ref().map_or(0, Page::len);
        if offset >= arena_len {
            return Err(AllocError::InvalidPointer(offset));
        }

        let idx = self
            .directory
            .iter()
            .find(|(_, block)| block.start == offset)
            .map(|(idx, _)| idx)
            .ok_or(AllocError::InvalidPointer(offset))?;

        if self.directory.get(idx).is_free {
            return Err(AllocError::DoubleFree(offset));
        }

        self.directory.get_mut(idx).is_free = true;
        debug!(
            "deallocated {} bytes at offset {offset}",
            self.directory.get(idx).size
        );

        // Backward before forward: in a free / just-freed / free run the
        // predecessor absorbs the freed block first, then the survivor
        // absorbs the successor, leaving a single descriptor.
        let idx = self.coalesce_backward(idx);
        self.coalesce_forward(idx);

        Ok(())
    }

    /// Merges the block at `idx` into its predecessor if that one is free.
    /// Returns the index of the surviving descriptor.
    fn coalesce_backward(&mut self, idx: BlockIdx) -> BlockIdx {
        if let Some(prev) = self.directory.get(idx).prev {
            if self.directory.get(prev).is_free {
                let absorbed = self.directory.remove(idx);
                self.directory.get_mut(prev).size += absorbed.size;
                return prev;
            }
        }

        idx
    }

    /// Merges the successor of the block at `idx` into it if that
    /// successor is free.
    fn coalesce_forward(&mut self, idx: BlockIdx) {
        if let Some(next) = self.directory.get(idx).next {
            if self.directory.get(next).is_free {
                let absorbed = self.directory.remove(next);
                self.directory.get_mut(idx).size += absorbed.size;
            }
        }
    }

    /// Borrows the bytes of an allocated block.
    ///
    /// The slice covers the granted size, which can exceed the requested
    /// size when splitting was skipped. A handle that does not name a live
    /// allocation gets [`AllocError::InvalidPointer`].
    pub fn payload(&self, handle: Handle) -> Result<&[u8], AllocError> {
        let (start, size) = self.live_range(handle)?;
        let page = self
            .page
            .as_ref()
            .ok_or(AllocError::InvalidPointer(handle.offset()))?;

        Ok(&page.bytes()[start..start + size])
    }

    /// Mutably borrows the bytes of an allocated block.
    pub fn payload_mut(&mut self, handle: Handle) -> Result<&mut [u8], AllocError> {
        let (start, size) = self.live_range(handle)?;
        let page = self
            .page
            .as_mut()
            .ok_or(AllocError::InvalidPointer(handle.offset()))?;

        Ok(&mut page.bytes_mut()[start..start + size])
    }

    /// Whether the arena currently holds a page.
    pub fn is_initialized(&self) -> bool {
        self.page.is_some()
    }

    /// Total bytes sitting in free blocks. Not necessarily allocatable in
    /// one piece; see [`Arena::allocate`].
    pub fn free_bytes(&self) -> usize {
        self.directory
            .iter()
            .filter(|(_, block)| block.is_free)
            .map(|(_, block)| block.size)
            .sum()
    }

    /// Number of blocks (free and allocated) in the directory.
    pub fn block_count(&self) -> usize {
        self.directory.len()
    }

    fn live_range(&self, handle: Handle) -> Result<(usize, usize), AllocError> {
        let offset = handle.offset();

        let block = self
            .directory
            .iter()
            .map(|(_, block)| block)
            .find(|block| block.start == offset)
            .ok_or(AllocError::InvalidPointer(offset))?;

        if block.is_free {
            return Err(AllocError::InvalidPointer(offset));
        }

        Ok((block.start, block.size))
    }
}

impl<P: ArenaProvider> Drop for Arena<P> {
    fn drop(&mut self) {
        // Best effort: a release failure has nowhere to be reported from a
        // destructor. Callers that care about it use `teardown` directly.
        if let Some(page) = self.page.take() {
            let _ = self.provider.release_page(page);
        }
    }
}
