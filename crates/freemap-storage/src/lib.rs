#![forbid(unsafe_code)]
//! Pluggable byte storage for the raw bitmap.
//!
//! Provides the [`ByteStore`] trait and the two standard backends:
//!
//! - [`HeapStore`] — a word-granularity heap buffer. Reallocates freely on
//!   `allocate` but refuses in-place extension, so it behaves as a
//!   fixed-capacity region between resets.
//! - [`PagedStore`] — a page-granularity region modelling a pageable
//!   virtual-memory object. A reservation ceiling is fixed at construction;
//!   pages are committed on demand below it.
//!
//! Backends allocate only inside `allocate`/`ensure_capacity`; the data
//! accessors are direct slices with no bookkeeping.

use freemap_error::{FreemapError, Result};
use tracing::{debug, trace};

/// Resizable raw byte region consumed by the bitmap core.
///
/// Capacity is always a multiple of the backend's page granularity, and
/// the region reads zero everywhere a caller has not written: `allocate`
/// hands out a zero-filled region, and `ensure_capacity` zero-fills
/// whatever it adds.
pub trait ByteStore {
    /// Fixed allocation quantum in bytes.
    fn page_granularity(&self) -> usize;

    /// Discard contents and make the region at least `bytes` long, rounded
    /// up to the page granularity and zero-filled.
    ///
    /// Fails with [`FreemapError::NoResources`] when the backend cannot
    /// satisfy the request; the region is then unchanged.
    fn allocate(&mut self, bytes: usize) -> Result<()>;

    /// Extend the region to at least `bytes` (rounded up to the page
    /// granularity), preserving existing contents. Newly exposed bytes
    /// read zero.
    ///
    /// Fails with [`FreemapError::NoResources`] when the region cannot be
    /// extended; the region is then unchanged.
    fn ensure_capacity(&mut self, bytes: usize) -> Result<()>;

    /// Current region length in bytes.
    fn capacity(&self) -> usize;

    /// The byte region.
    fn data(&self) -> &[u8];

    /// The byte region, writable.
    fn data_mut(&mut self) -> &mut [u8];
}

fn round_up(bytes: usize, granularity: usize) -> usize {
    bytes.div_ceil(granularity) * granularity
}

// ── Heap backend ────────────────────────────────────────────────────────────

/// Allocation quantum of [`HeapStore`], in bytes.
pub const HEAP_GRANULARITY: usize = 8;

/// Word-granularity heap buffer.
///
/// `allocate` swaps in a fresh zeroed buffer of the requested size;
/// `ensure_capacity` never extends the buffer, so any request beyond the
/// current capacity fails with `NoResources`.
#[derive(Debug, Default)]
pub struct HeapStore {
    bytes: Vec<u8>,
}

impl HeapStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for HeapStore {
    fn page_granularity(&self) -> usize {
        HEAP_GRANULARITY
    }

    fn allocate(&mut self, bytes: usize) -> Result<()> {
        let capacity = round_up(bytes, HEAP_GRANULARITY);
        trace!(
            target: "freemap::storage",
            event = "heap_alloc",
            bytes,
            capacity
        );
        self.bytes = vec![0_u8; capacity];
        Ok(())
    }

    fn ensure_capacity(&mut self, bytes: usize) -> Result<()> {
        if bytes <= self.bytes.len() {
            return Ok(());
        }
        debug!(
            target: "freemap::storage",
            event = "heap_grow_refused",
            bytes,
            capacity = self.bytes.len()
        );
        Err(FreemapError::NoResources)
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

// ── Paged backend ───────────────────────────────────────────────────────────

/// Page size of [`PagedStore`], in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Pages reserved by [`PagedStore::default`].
pub const DEFAULT_RESERVED_PAGES: usize = 64;

/// Page-granularity region with a fixed reservation ceiling.
///
/// Models a pageable virtual-memory object: the reservation is decided at
/// construction, and pages are committed on demand up to that ceiling.
/// Requests beyond the reservation fail with `NoResources`.
#[derive(Debug)]
pub struct PagedStore {
    bytes: Vec<u8>,
    reserved_pages: usize,
}

impl PagedStore {
    /// Create a store that may commit at most `reserved_pages` pages.
    #[must_use]
    pub fn new(reserved_pages: usize) -> Self {
        Self {
            bytes: Vec::new(),
            reserved_pages,
        }
    }

    /// The reservation ceiling in bytes.
    #[must_use]
    pub fn reserved_bytes(&self) -> usize {
        self.reserved_pages * PAGE_SIZE
    }

    /// Page-rounded capacity for `bytes`, or `NoResources` past the ceiling.
    fn commit_size(&self, bytes: usize) -> Result<usize> {
        let capacity = round_up(bytes, PAGE_SIZE);
        if capacity > self.reserved_bytes() {
            debug!(
                target: "freemap::storage",
                event = "page_commit_refused",
                bytes,
                reserved = self.reserved_bytes()
            );
            return Err(FreemapError::NoResources);
        }
        Ok(capacity)
    }
}

impl Default for PagedStore {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_PAGES)
    }
}

impl ByteStore for PagedStore {
    fn page_granularity(&self) -> usize {
        PAGE_SIZE
    }

    fn allocate(&mut self, bytes: usize) -> Result<()> {
        let capacity = self.commit_size(bytes)?;
        trace!(
            target: "freemap::storage",
            event = "page_alloc",
            bytes,
            capacity
        );
        self.bytes = vec![0_u8; capacity];
        Ok(())
    }

    fn ensure_capacity(&mut self, bytes: usize) -> Result<()> {
        let capacity = self.commit_size(bytes)?;
        if capacity > self.bytes.len() {
            trace!(
                target: "freemap::storage",
                event = "page_commit",
                bytes,
                capacity
            );
            self.bytes.resize(capacity, 0);
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocate_rounds_to_word() {
        let mut store = HeapStore::new();
        store.allocate(1).unwrap();
        assert_eq!(store.capacity(), HEAP_GRANULARITY);
        store.allocate(9).unwrap();
        assert_eq!(store.capacity(), 16);
        store.allocate(0).unwrap();
        assert_eq!(store.capacity(), 0);
    }

    #[test]
    fn heap_allocate_zero_fills() {
        let mut store = HeapStore::new();
        store.allocate(16).unwrap();
        store.data_mut().fill(0xFF);
        store.allocate(16).unwrap();
        assert!(store.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn heap_refuses_extension() {
        let mut store = HeapStore::new();
        store.allocate(16).unwrap();
        assert_eq!(store.ensure_capacity(16), Ok(()));
        assert_eq!(store.ensure_capacity(17), Err(FreemapError::NoResources));
        // Refusal leaves the region alone.
        assert_eq!(store.capacity(), 16);
    }

    #[test]
    fn paged_allocate_rounds_to_page() {
        let mut store = PagedStore::new(4);
        store.allocate(1).unwrap();
        assert_eq!(store.capacity(), PAGE_SIZE);
        store.allocate(PAGE_SIZE + 1).unwrap();
        assert_eq!(store.capacity(), 2 * PAGE_SIZE);
    }

    #[test]
    fn paged_commit_preserves_and_zero_fills() {
        let mut store = PagedStore::new(4);
        store.allocate(PAGE_SIZE).unwrap();
        store.data_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);

        store.ensure_capacity(2 * PAGE_SIZE).unwrap();
        assert_eq!(store.capacity(), 2 * PAGE_SIZE);
        assert_eq!(&store.data()[..4], &[1, 2, 3, 4]);
        assert!(store.data()[PAGE_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn paged_reservation_ceiling() {
        let mut store = PagedStore::new(2);
        assert_eq!(store.reserved_bytes(), 2 * PAGE_SIZE);
        store.allocate(2 * PAGE_SIZE).unwrap();
        assert_eq!(
            store.ensure_capacity(2 * PAGE_SIZE + 1),
            Err(FreemapError::NoResources)
        );
        assert_eq!(store.capacity(), 2 * PAGE_SIZE);
        assert_eq!(
            store.allocate(3 * PAGE_SIZE),
            Err(FreemapError::NoResources)
        );
    }

    #[test]
    fn granularities() {
        assert_eq!(HeapStore::new().page_granularity(), HEAP_GRANULARITY);
        assert_eq!(PagedStore::default().page_granularity(), PAGE_SIZE);
    }
}
