//! # pagealloc
//!
//! A restricted `malloc`/`free` pair scoped to one fixed-size arena: a
//! single 4 KiB page obtained from a pluggable provider, partitioned by a
//! directory of block descriptors, allocated first-fit with splitting and
//! reclaimed with bidirectional coalescing.
//!
//! ```text
//!  Arena (one 4096-byte page on loan from the provider)
//!  +-----------+-----------------+---------------------------------+
//!  | allocated |    allocated    |              free               |
//!  +-----------+-----------------+---------------------------------+
//!        ^             ^                          ^
//!        |             |                          |
//!  +-----------+-----------------+---------------------------------+
//!  |  Block    |     Block       |             Block               |  Directory
//!  +-----------+-----------------+---------------------------------+  (out-of-band,
//!                                                                      index-linked)
//! ```
//!
//! Descriptors live outside the arena in a slab owned by the directory and
//! reference each other by index, so the arena's bytes stay entirely the
//! caller's and no bookkeeping pointer can dangle into freed memory.
//! Handles are arena-relative offsets, validated against the directory on
//! every use.
//!
//! ## Crate structure
//!
//! ```text
//!   pagealloc
//!   ├── arena      - lifecycle, allocation and deallocation engines
//!   ├── block      - block descriptor record
//!   ├── directory  - slab-backed ordered descriptor list
//!   ├── error      - error taxonomy
//!   ├── provider   - page acquisition (OS pages, heap pages)
//!   └── utils      - alignment helper
//! ```
//!
//! ## Quick start
//!
//! ```
//! use pagealloc::{AllocError, Arena, HeapProvider};
//!
//! fn main() -> Result<(), AllocError> {
//!     let mut arena = Arena::new(HeapProvider);
//!     arena.initialize()?;
//!
//!     let handle = arena.allocate(32)?;
//!     arena.payload_mut(handle)?.fill(0x2A);
//!     assert_eq!(arena.payload(handle)?[0], 0x2A);
//!
//!     arena.deallocate(handle)?;
//!     arena.teardown()
//! }
//! ```
//!
//! ## Limitations
//!
//! - **One arena, fixed size**: no growth, no spill-over to further pages.
//! - **Single-threaded**: no internal locking; wrap the whole [`Arena`] in
//!   one exclusive lock if it must be shared.
//! - **Fixed 8-byte granularity**: requests must be positive multiples of
//!   [`MIN_ALIGN`] and are rejected, never rounded.

mod arena;
mod block;
mod directory;
mod error;
pub mod provider;
mod utils;

pub use arena::{Arena, Handle};
pub use error::AllocError;
pub use provider::{ArenaProvider, HeapProvider, OsProvider, Page, ProviderError};

/// Size of the arena in bytes: one page.
pub const ARENA_SIZE: usize = 4096;

/// Allocation granularity. Every request and every block size is a
/// multiple of this.
pub const MIN_ALIGN: usize = 8;
