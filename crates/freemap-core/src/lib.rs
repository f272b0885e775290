#![forbid(unsafe_code)]
//! Growable raw bitmap.
//!
//! [`RawBitmap`] is a logical array of single-bit flags over a resizable
//! byte region, addressed by non-negative bit offsets. All range
//! operations take half-open `[off, max)` ranges. The structure is
//! infrastructure for allocators and free-space trackers that ask
//! questions like "is every bit in `[a, b)` set?" or "where does a run of
//! `k` clear bits start?".
//!
//! Bit `i` lives at byte `i / 8`, bit position `i % 8`, LSB first. Every
//! operation uses this one mapping. Storage is pluggable through
//! [`ByteStore`]; [`HeapBitmap`] and [`PagedBitmap`] are the standard
//! instantiations.
//!
//! Not thread-safe: callers coordinate access externally. No operation
//! blocks or suspends; each call runs to completion and returns a status.

use freemap_error::{FreemapError, Result};
use freemap_storage::{ByteStore, HeapStore, PagedStore};
use tracing::trace;

/// Raw bitmap over a word-granularity heap buffer (fixed capacity between
/// resets, so `grow` beyond the allocation fails).
pub type HeapBitmap = RawBitmap<HeapStore>;

/// Raw bitmap over a pageable region with a fixed reservation ceiling.
pub type PagedBitmap = RawBitmap<PagedStore>;

// ── Byte-level helpers ──────────────────────────────────────────────────────

/// Mask selecting bit positions `[lo, hi)` within a byte, `lo <= hi <= 8`.
#[expect(clippy::cast_possible_truncation)] // hi <= 8, the mask fits the low byte
fn byte_mask(lo: usize, hi: usize) -> u8 {
    debug_assert!(lo <= hi && hi <= 8);
    (((1_u16 << hi) - 1) & !((1_u16 << lo) - 1)) as u8
}

fn bit_at(data: &[u8], pos: usize) -> bool {
    (data[pos / 8] >> (pos % 8)) & 1 == 1
}

fn apply_mask(byte: &mut u8, mask: u8, value: bool) {
    if value {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

/// Write `value` into every bit of `[off, max)`. Edge bytes are masked so
/// bits below `off` and at/above `max` keep their contents; interior bytes
/// get whole-byte stores.
fn write_bits(data: &mut [u8], off: usize, max: usize, value: bool) {
    debug_assert!(off < max);
    let first = off / 8;
    let last = (max - 1) / 8;
    let lo = off % 8;
    let hi = (max - 1) % 8 + 1;

    if first == last {
        apply_mask(&mut data[first], byte_mask(lo, hi), value);
        return;
    }
    apply_mask(&mut data[first], byte_mask(lo, 8), value);
    data[first + 1..last].fill(if value { 0xFF } else { 0x00 });
    apply_mask(&mut data[last], byte_mask(0, hi), value);
}

// ── Raw bitmap ──────────────────────────────────────────────────────────────

/// A growable bitmap of `size` bits over a [`ByteStore`] byte region.
///
/// Invariants held between public operations:
///
/// - storage capacity is at least `ceil(size / 8)` bytes;
/// - bits at positions `>= size` (the tail inside allocated bytes) are
///   never observable and always read 0, which is what lets `grow` expose
///   clear bits without rewriting them;
/// - every failed operation leaves the bitmap bitwise unchanged
///   (arguments are validated before any byte is written).
#[derive(Debug)]
pub struct RawBitmap<S> {
    size: usize,
    storage: S,
}

impl<S: ByteStore + Default> Default for RawBitmap<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: ByteStore> RawBitmap<S> {
    /// Create an empty bitmap (`size() == 0`) over `storage`.
    pub fn new(storage: S) -> Self {
        Self { size: 0, storage }
    }

    /// Current logical bit count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The storage backend.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Discard all contents and resize to `size` bits, all clear.
    ///
    /// Fails with `NoResources` when the backend cannot allocate; the
    /// bitmap is then unchanged.
    pub fn reset(&mut self, size: usize) -> Result<()> {
        self.storage.allocate(size.div_ceil(8))?;
        self.size = size;
        trace!(
            target: "freemap::bitmap",
            event = "reset",
            size,
            capacity = self.storage.capacity()
        );
        Ok(())
    }

    /// `true` iff bit `bit` is set. Out-of-range bits read as set.
    ///
    /// Exactly `get(bit, bit + 1)`.
    #[must_use]
    pub fn get_one(&self, bit: usize) -> bool {
        self.get(bit, bit.saturating_add(1))
    }

    /// `true` iff every bit in `[off, max)` is set.
    ///
    /// The upper bound is clamped to `size()`, so an empty range or a
    /// range lying entirely at/past the end is vacuously `true`.
    #[must_use]
    pub fn get(&self, off: usize, max: usize) -> bool {
        self.get_with_first_unset(off, max).0
    }

    /// As [`get`](Self::get), also reporting where the scan stopped: the
    /// first clear bit in the clamped range when the result is `false`,
    /// the clamped upper bound when it is `true`.
    #[must_use]
    pub fn get_with_first_unset(&self, off: usize, max: usize) -> (bool, usize) {
        let max = max.min(self.size);
        let first_unset = self.scan(off, max, true);
        (first_unset == max, first_unset)
    }

    /// Set bit `bit`. `InvalidArgs` when `bit >= size()`. Idempotent.
    pub fn set_one(&mut self, bit: usize) -> Result<()> {
        if bit >= self.size {
            return Err(FreemapError::InvalidArgs);
        }
        self.storage.data_mut()[bit / 8] |= 1 << (bit % 8);
        Ok(())
    }

    /// Clear bit `bit`. `InvalidArgs` when `bit >= size()`. Idempotent.
    pub fn clear_one(&mut self, bit: usize) -> Result<()> {
        if bit >= self.size {
            return Err(FreemapError::InvalidArgs);
        }
        self.storage.data_mut()[bit / 8] &= !(1 << (bit % 8));
        Ok(())
    }

    /// Set every bit in `[off, max)`.
    ///
    /// The empty range (`off == max`) is a successful no-op at any
    /// position, even past the end. Otherwise `InvalidArgs` when
    /// `off > max` or `max > size()`, checked before any byte is written.
    pub fn set(&mut self, off: usize, max: usize) -> Result<()> {
        if off == max {
            return Ok(());
        }
        if off > max || max > self.size {
            return Err(FreemapError::InvalidArgs);
        }
        write_bits(self.storage.data_mut(), off, max, true);
        Ok(())
    }

    /// Clear every bit in `[off, max)`. Same validity rules as
    /// [`set`](Self::set).
    pub fn clear(&mut self, off: usize, max: usize) -> Result<()> {
        if off == max {
            return Ok(());
        }
        if off > max || max > self.size {
            return Err(FreemapError::InvalidArgs);
        }
        write_bits(self.storage.data_mut(), off, max, false);
        Ok(())
    }

    /// Clear the whole bitmap. Never fails.
    pub fn clear_all(&mut self) {
        let bytes = self.size.div_ceil(8);
        self.storage.data_mut()[..bytes].fill(0);
    }

    /// Smallest position in `[off, min(max, size()))` whose bit differs
    /// from `value`; the clamped upper bound when every bit matches (or
    /// the range is empty after clamping). Total function.
    #[must_use]
    pub fn scan(&self, off: usize, max: usize, value: bool) -> usize {
        let max = max.min(self.size);
        if off >= max {
            return max;
        }
        let data = self.storage.data();
        let uniform = if value { 0xFF } else { 0x00 };

        let mut pos = off;
        while pos % 8 != 0 && pos < max {
            if bit_at(data, pos) != value {
                return pos;
            }
            pos += 1;
        }
        while pos + 8 <= max {
            let byte = data[pos / 8];
            if byte != uniform {
                return pos + (byte ^ uniform).trailing_zeros() as usize;
            }
            pos += 8;
        }
        while pos < max {
            if bit_at(data, pos) != value {
                return pos;
            }
            pos += 1;
        }
        max
    }

    /// Number of bits equal to `value` in `[off, min(max, size()))`.
    /// Total function; interior bytes go through popcount.
    #[must_use]
    pub fn count(&self, off: usize, max: usize, value: bool) -> usize {
        let max = max.min(self.size);
        if off >= max {
            return 0;
        }
        let data = self.storage.data();
        let first = off / 8;
        let last = (max - 1) / 8;
        let lo = off % 8;
        let hi = (max - 1) % 8 + 1;

        let ones = if first == last {
            (data[first] & byte_mask(lo, hi)).count_ones() as usize
        } else {
            let mut total = (data[first] & byte_mask(lo, 8)).count_ones() as usize;
            for &byte in &data[first + 1..last] {
                total += byte.count_ones() as usize;
            }
            total + (data[last] & byte_mask(0, hi)).count_ones() as usize
        };
        if value { ones } else { (max - off) - ones }
    }

    /// Locate the lowest-addressed run of at least `run_len` bits equal to
    /// `value` lying entirely within `[off, max) ∩ [0, size())`.
    ///
    /// On success the run's first position is written to `out`. On failure
    /// `out` receives the clamped upper bound (where the search stopped,
    /// so a caller can resume a wider search) and the call returns
    /// `NoResources`. A reversed or empty input range is `InvalidArgs`;
    /// `run_len == 0` requires no run and succeeds at `off`.
    pub fn find(
        &self,
        value: bool,
        off: usize,
        max: usize,
        run_len: usize,
        out: &mut usize,
    ) -> Result<()> {
        if off >= max {
            return Err(FreemapError::InvalidArgs);
        }
        if run_len == 0 {
            *out = off;
            return Ok(());
        }
        let max = max.min(self.size);

        let mut pos = off;
        while pos < max {
            // Next bit equal to `value`, then the end of that run.
            let start = self.scan(pos, max, !value);
            if start == max {
                break;
            }
            let end = self.scan(start, max, value);
            if end - start >= run_len {
                *out = start;
                return Ok(());
            }
            pos = end;
        }
        *out = max;
        Err(FreemapError::NoResources)
    }

    /// Grow the bitmap to `new_size` bits.
    ///
    /// Requires `new_size > size()`; anything else is `NoResources`.
    /// Previously set bits are preserved and every newly exposed bit reads
    /// 0: mutators never touch bits past `size()` and the backend
    /// zero-fills fresh capacity, so the tail is already clear when it
    /// becomes visible. When the backend refuses to extend, the bitmap is
    /// unchanged.
    pub fn grow(&mut self, new_size: usize) -> Result<()> {
        if new_size <= self.size {
            return Err(FreemapError::NoResources);
        }
        let bytes = new_size.div_ceil(8);
        if bytes > self.storage.capacity() {
            self.storage.ensure_capacity(bytes)?;
        }
        trace!(
            target: "freemap::bitmap",
            event = "grow",
            size = self.size,
            new_size,
            capacity = self.storage.capacity()
        );
        self.size = new_size;
        Ok(())
    }

    /// Shrink the bitmap to `new_size` bits.
    ///
    /// Requires `new_size < size()`; anything else is `NoResources`. The
    /// truncated bits are zeroed so a later [`grow`](Self::grow) exposes
    /// clear bits.
    pub fn shrink(&mut self, new_size: usize) -> Result<()> {
        if new_size >= self.size {
            return Err(FreemapError::NoResources);
        }
        let old_bytes = self.size.div_ceil(8);
        let data = self.storage.data_mut();
        let keep = new_size / 8;
        if new_size % 8 == 0 {
            data[keep..old_bytes].fill(0);
        } else {
            data[keep] &= byte_mask(0, new_size % 8);
            data[keep + 1..old_bytes].fill(0);
        }
        trace!(
            target: "freemap::bitmap",
            event = "shrink",
            size = self.size,
            new_size
        );
        self.size = new_size;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
