//! Bounds-checked reads of untrusted memory.
//!
//! Inside a fault handler the stack pointer that locates the exception frame
//! may be garbage: a stack overflow, a wild write, or the very corruption
//! that caused the fault. Dereferencing it blindly can raise a second fault
//! from within the handler, which on Cortex-M means lockup and a lost record.
//!
//! This module is the only place that turns an address into a load:
//!
//! - [`RamWindow`]: the configured range of RAM known to be mapped and
//!   side-effect free to read.
//! - [`MemorySource`]: an `unsafe` word loader (volatile pointer reads on
//!   hardware, a byte slice in tests).
//! - [`BoundedReader`]: validates alignment and the *whole* requested span
//!   against the window before calling the loader.
//!
//! Nothing else in the crate calls [`MemorySource::read_word`].

use core::cell::Cell;

use thiserror_no_std::Error;

/// Word size of every read (Cortex-M stacks are word-aligned).
pub const WORD_BYTES: u32 = 4;

const WORD_MASK: u32 = WORD_BYTES - 1;

/// Error constructing a [`RamWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamWindowError {
    /// Window length is zero.
    #[error("RAM window is empty")]
    Empty,
    /// Base address is not word-aligned.
    #[error("RAM window base 0x{0:08X} is not word aligned")]
    Misaligned(u32),
    /// `base + len` runs past the end of the 32-bit address space.
    #[error("RAM window wraps the address space")]
    Wraps,
}

/// Error from a bounded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessError {
    /// Address is not word-aligned.
    #[error("address 0x{0:08X} is not word aligned")]
    Misaligned(u32),
    /// Some byte of `[address, address + bytes)` lies outside the window.
    #[error("span 0x{address:08X}+{bytes} leaves the RAM window")]
    OutOfWindow {
        /// Start of the requested span.
        address: u32,
        /// Length of the requested span in bytes.
        bytes: u32,
    },
}

// ---------------------------------------------------------------------------
// RamWindow
// ---------------------------------------------------------------------------

/// A contiguous, word-aligned range of readable RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RamWindow {
    base: u32,
    len: u32,
}

impl RamWindow {
    /// Create a window, validating it.
    ///
    /// # Errors
    ///
    /// - [`RamWindowError::Empty`] if `len == 0`
    /// - [`RamWindowError::Misaligned`] if `base` is not a multiple of 4
    /// - [`RamWindowError::Wraps`] if `base + len > 2^32`
    pub const fn new(base: u32, len: u32) -> Result<Self, RamWindowError> {
        if len == 0 {
            return Err(RamWindowError::Empty);
        }
        if base & WORD_MASK != 0 {
            return Err(RamWindowError::Misaligned(base));
        }
        if base.checked_add(len.wrapping_sub(1)).is_none() {
            return Err(RamWindowError::Wraps);
        }
        Ok(Self { base, len })
    }

    /// First address of the window.
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Window length in bytes.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Always `false`: construction rejects empty windows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Exclusive end address. May be `2^32`, hence `u64`.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.base).saturating_add(u64::from(self.len))
    }

    /// `true` if every byte of `[address, address + bytes)` lies in the window.
    ///
    /// A zero-length span is contained iff `address` itself is inside.
    #[must_use]
    pub fn contains(&self, address: u32, bytes: u32) -> bool {
        let start = u64::from(address);
        let end = start.saturating_add(u64::from(bytes));
        start >= u64::from(self.base) && start < self.end() && end <= self.end()
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Raw word loads from the target's address space.
pub trait MemorySource {
    /// Load the 32-bit word at `address`.
    ///
    /// # Safety
    ///
    /// `address` must be word-aligned and lie in memory that is mapped and
    /// readable without side effects. [`BoundedReader`] establishes this
    /// against a [`RamWindow`]; do not call it from anywhere else.
    unsafe fn read_word(&self, address: u32) -> u32;
}

impl<T: MemorySource + ?Sized> MemorySource for &T {
    unsafe fn read_word(&self, address: u32) -> u32 {
        // SAFETY: forwarded contract.
        unsafe { (**self).read_word(address) }
    }
}

/// A byte slice standing in for target memory at `base`.
///
/// Used by host tests and by tools that replay a RAM dump. Counts loads and
/// latches [`strayed`](Self::strayed) if anything reads outside the slice,
/// which on hardware would have been a secondary fault.
#[derive(Debug)]
pub struct SliceMemory<'a> {
    base: u32,
    bytes: &'a [u8],
    reads: Cell<usize>,
    strayed: Cell<bool>,
}

impl<'a> SliceMemory<'a> {
    /// Map `bytes` at address `base`.
    #[must_use]
    pub fn new(base: u32, bytes: &'a [u8]) -> Self {
        Self {
            base,
            bytes,
            reads: Cell::new(0),
            strayed: Cell::new(false),
        }
    }

    /// Number of word loads performed so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// `true` if any load fell outside the backing slice.
    #[must_use]
    pub fn strayed(&self) -> bool {
        self.strayed.get()
    }

    fn load(&self, address: u32) -> Option<u32> {
        let offset = usize::try_from(address.checked_sub(self.base)?).ok()?;
        let chunk = self.bytes.get(offset..offset.checked_add(4)?)?;
        let mut le = [0u8; 4];
        le.copy_from_slice(chunk);
        Some(u32::from_le_bytes(le))
    }
}

impl MemorySource for SliceMemory<'_> {
    unsafe fn read_word(&self, address: u32) -> u32 {
        self.reads.set(self.reads.get().saturating_add(1));
        self.load(address).unwrap_or_else(|| {
            self.strayed.set(true);
            0
        })
    }
}

// ---------------------------------------------------------------------------
// BoundedReader
// ---------------------------------------------------------------------------

/// The single gate between an untrusted address and a memory load.
pub struct BoundedReader<'m, M: MemorySource + ?Sized> {
    window: RamWindow,
    memory: &'m M,
}

impl<'m, M: MemorySource + ?Sized> BoundedReader<'m, M> {
    /// Bind a memory source to the window it may be read within.
    pub fn new(window: RamWindow, memory: &'m M) -> Self {
        Self { window, memory }
    }

    /// The window reads are confined to.
    #[must_use]
    pub fn window(&self) -> RamWindow {
        self.window
    }

    /// Validate a span of `words` words starting at `address` without reading it.
    ///
    /// # Errors
    ///
    /// [`AccessError::Misaligned`] or [`AccessError::OutOfWindow`].
    pub fn check(&self, address: u32, words: u32) -> Result<(), AccessError> {
        if address & WORD_MASK != 0 {
            return Err(AccessError::Misaligned(address));
        }
        let bytes = words.checked_mul(WORD_BYTES).ok_or(AccessError::OutOfWindow {
            address,
            bytes: u32::MAX,
        })?;
        if self.window.contains(address, bytes) {
            Ok(())
        } else {
            Err(AccessError::OutOfWindow { address, bytes })
        }
    }

    /// Read `N` consecutive words starting at `address`, after validating the span.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check); no load is issued on error.
    #[allow(clippy::cast_possible_truncation)] // N is a small frame size
    pub fn read_words<const N: usize>(&self, address: u32) -> Result<[u32; N], AccessError> {
        self.check(address, N as u32)?;
        let mut out = [0u32; N];
        let mut cursor = address;
        for slot in &mut out {
            // SAFETY: `check` proved `[address, address + 4N)` is word-aligned
            // and inside the configured readable window; `cursor` walks that span.
            *slot = unsafe { self.memory.read_word(cursor) };
            cursor = cursor.wrapping_add(WORD_BYTES);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    fn ram() -> RamWindow {
        RamWindow::new(0x2000_0000, 0x100).unwrap()
    }

    #[test]
    fn window_rejects_empty_misaligned_and_wrapping() {
        assert_eq!(RamWindow::new(0x2000_0000, 0), Err(RamWindowError::Empty));
        assert_eq!(
            RamWindow::new(0x2000_0002, 16),
            Err(RamWindowError::Misaligned(0x2000_0002))
        );
        assert_eq!(RamWindow::new(0xFFFF_FF00, 0x200), Err(RamWindowError::Wraps));
    }

    #[test]
    fn window_may_end_exactly_at_top_of_address_space() {
        let w = RamWindow::new(0xFFFF_FF00, 0x100).unwrap();
        assert_eq!(w.end(), 1 << 32);
        assert!(w.contains(0xFFFF_FFFC, 4));
        assert!(!w.contains(0xFFFF_FFFC, 8));
    }

    #[test]
    fn contains_checks_full_span() {
        let w = ram();
        assert!(w.contains(0x2000_0000, 0x100));
        assert!(w.contains(0x2000_00E0, 32));
        assert!(!w.contains(0x2000_00E4, 32), "span crosses the end");
        assert!(!w.contains(0x1FFF_FFFC, 8), "span starts below");
        assert!(!w.contains(0x2000_0100, 0), "empty span at end is outside");
        assert!(!w.contains(u32::MAX, 4));
    }

    #[test]
    fn reader_rejects_misaligned_without_loading() {
        let bytes = [0u8; 0x100];
        let mem = SliceMemory::new(0x2000_0000, &bytes);
        let r = BoundedReader::new(ram(), &mem);
        assert_eq!(
            r.read_words::<8>(0x2000_0002),
            Err(AccessError::Misaligned(0x2000_0002))
        );
        assert_eq!(mem.reads(), 0);
    }

    #[test]
    fn reader_rejects_out_of_window_without_loading() {
        let bytes = [0u8; 0x100];
        let mem = SliceMemory::new(0x2000_0000, &bytes);
        let r = BoundedReader::new(ram(), &mem);
        assert!(r.read_words::<8>(0x2000_00F0).is_err());
        assert!(r.read_words::<8>(0xDEAD_BEEC).is_err());
        assert!(r.read_words::<8>(0xFFFF_FFF0).is_err());
        assert_eq!(mem.reads(), 0);
        assert!(!mem.strayed());
    }

    #[test]
    fn reader_loads_little_endian_words_in_order() {
        let mut bytes = [0u8; 0x100];
        for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&(i as u32 * 0x10).to_le_bytes());
        }
        let mem = SliceMemory::new(0x2000_0000, &bytes);
        let r = BoundedReader::new(ram(), &mem);
        let words = r.read_words::<3>(0x2000_0008).unwrap();
        assert_eq!(words, [0x20, 0x30, 0x40]);
        assert_eq!(mem.reads(), 3);
    }

    #[test]
    fn slice_memory_flags_stray_reads() {
        let bytes = [0u8; 8];
        let mem = SliceMemory::new(0x1000, &bytes);
        // SAFETY: SliceMemory never dereferences raw pointers.
        let v = unsafe { mem.read_word(0x2000) };
        assert_eq!(v, 0);
        assert!(mem.strayed());
    }
}
