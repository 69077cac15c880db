//! The arena provider layer.
//!
//! The allocator core has nothing to do with the concrete APIs each platform
//! offers for acquiring memory; it only needs something that hands back one
//! contiguous page and later reclaims it. This module is that boundary, and
//! the only place in the crate where `unsafe` appears. Everything above it
//! works with arena-relative offsets and bounds-checked slices.

use std::ptr::{self, NonNull};
use std::slice;

use thiserror::Error;

/// Failure reported by a provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The platform refused to map a page of the given length.
    #[error("could not map a page of {0} bytes")]
    MapFailed(usize),

    /// The platform refused to unmap the page on release.
    #[error("could not unmap the arena page")]
    UnmapFailed,
}

/// A page on loan from a provider: base pointer plus length, with
/// bounds-checked byte access.
///
/// A `Page` value is the witness of a live mapping. It has no destructor on
/// purpose: reclaiming the memory is the provider's job and can fail, so it
/// must go through [`ArenaProvider::release_page`] where the failure can be
/// reported. A `Page` that is simply dropped leaks its mapping.
pub struct Page {
    ptr: NonNull<u8>,
    len: usize,
}

impl Page {
    /// Builds a page from its raw parts.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes, and the
    /// caller must guarantee exclusive ownership of that range until the
    /// page is released.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Decomposes the page for release.
    pub fn into_raw(self) -> (NonNull<u8>, usize) {
        (self.ptr, self.len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the `from_raw` contract guarantees a live, exclusively
        // owned range of `len` bytes for the lifetime of the page.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: same as `bytes`, plus `&mut self` rules out aliasing.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Capability to acquire and reclaim the arena's backing page.
///
/// The allocator depends only on this trait, not on any specific OS
/// mechanism. A page must be handed back to the provider that produced it;
/// mixing pages between providers is as undefined as `munmap`ing a heap
/// pointer would be.
pub trait ArenaProvider {
    /// Requests one contiguous page of `len` bytes.
    fn request_page(&mut self, len: usize) -> Result<Page, ProviderError>;

    /// Returns a page previously obtained from this provider. On failure
    /// the page is forfeited; the caller must not touch the range again.
    fn release_page(&mut self, page: Page) -> Result<(), ProviderError>;
}

/// Provider backed by the operating system's anonymous page mappings:
/// `mmap`/`munmap` on unix, `VirtualAlloc`/`VirtualFree` on windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProvider;

/// Provider that serves pages from the process heap.
///
/// Useful for tests and for embedding an arena where syscalls are unwanted;
/// the allocator's bookkeeping never notices the difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapProvider;

impl ArenaProvider for HeapProvider {
    fn request_page(&mut self, len: usize) -> Result<Page, ProviderError> {
        let raw = Box::into_raw(vec![0u8; len].into_boxed_slice());

        // SAFETY: `Box::into_raw` never returns null, and the boxed slice
        // is exactly `len` writable bytes owned by us until released.
        unsafe {
            let ptr = NonNull::new_unchecked(raw.cast::<u8>());
            Ok(Page::from_raw(ptr, len))
        }
    }

    fn release_page(&mut self, page: Page) -> Result<(), ProviderError> {
        let (ptr, len) = page.into_raw();

        // SAFETY: the page came out of `request_page` above, so these are
        // the raw parts of a boxed slice of `len` bytes.
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                ptr.as_ptr(),
                len,
            )));
        }

        Ok(())
    }
}

#[cfg(unix)]
mod unix {
    use std::os::raw::{c_int, c_void};
    use std::ptr::NonNull;

    use libc::{mmap, munmap, off_t, size_t};

    use super::{ArenaProvider, OsProvider, Page, ProviderError};

    impl ArenaProvider for OsProvider {
        fn request_page(&mut self, len: usize) -> Result<Page, ProviderError> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET);

                if addr == libc::MAP_FAILED {
                    return Err(ProviderError::MapFailed(len));
                }

                // SAFETY: a successful mmap hands us `len` bytes of fresh,
                // exclusively mapped memory at a non-null address.
                Ok(Page::from_raw(NonNull::new_unchecked(addr).cast::<u8>(), len))
            }
        }

        fn release_page(&mut self, page: Page) -> Result<(), ProviderError> {
            let (ptr, len) = page.into_raw();

            // SAFETY: the page was produced by `request_page`, so this is a
            // mapping of exactly `len` bytes at this address.
            match unsafe { munmap(ptr.as_ptr().cast::<c_void>(), len as size_t) } {
                0 => Ok(()),
                _ => Err(ProviderError::UnmapFailed),
            }
        }
    }
}

#[cfg(windows)]
mod windows_pages {
    use std::os::raw::c_void;
    use std::ptr::NonNull;

    use windows::Win32::System::Memory;

    use super::{ArenaProvider, OsProvider, Page, ProviderError};

    impl ArenaProvider for OsProvider {
        fn request_page(&mut self, len: usize) -> Result<Page, ProviderError> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            let addr = unsafe { Memory::VirtualAlloc(None, len, flags, protection) };

            match NonNull::new(addr.cast::<u8>()) {
                // SAFETY: VirtualAlloc committed `len` writable bytes for us.
                Some(ptr) => Ok(unsafe { Page::from_raw(ptr, len) }),
                None => Err(ProviderError::MapFailed(len)),
            }
        }

        fn release_page(&mut self, page: Page) -> Result<(), ProviderError> {
            let (ptr, _len) = page.into_raw();

            // SAFETY: releasing a region obtained from `request_page`;
            // MEM_RELEASE requires the base address and a zero size.
            unsafe {
                Memory::VirtualFree(ptr.as_ptr().cast::<c_void>(), 0, Memory::MEM_RELEASE)
                    .map_err(|_| ProviderError::UnmapFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_page_round_trip() {
        let mut provider = HeapProvider;
        let mut page = provider.request_page(4096).unwrap();

        assert_eq!(page.len(), 4096);
        assert!(page.bytes().iter().all(|&byte| byte == 0));

        page.bytes_mut()[0] = 0xAB;
        page.bytes_mut()[4095] = 0xCD;
        assert_eq!(page.bytes()[0], 0xAB);
        assert_eq!(page.bytes()[4095], 0xCD);

        provider.release_page(page).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn os_page_round_trip() {
        let mut provider = OsProvider;
        let mut page = provider.request_page(4096).unwrap();

        page.bytes_mut()[123] = 42;
        assert_eq!(page.bytes()[123], 42);

        provider.release_page(page).unwrap();
    }
}
