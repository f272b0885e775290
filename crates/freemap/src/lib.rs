#![forbid(unsafe_code)]
//! Freemap public API facade.
//!
//! Re-exports the raw bitmap core, the status taxonomy, and the standard
//! storage backends through a single crate for downstream consumers.

pub use freemap_core::{HeapBitmap, PagedBitmap, RawBitmap};
pub use freemap_error::{FreemapError, Result};
pub use freemap_storage::{
    ByteStore, DEFAULT_RESERVED_PAGES, HEAP_GRANULARITY, HeapStore, PAGE_SIZE, PagedStore,
};
