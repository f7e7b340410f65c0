//! Register window access.
//!
//! [`RegisterMap`] is the only place raw MMIO pointers are dereferenced.
//! Everything above it talks to the device through [`RegisterAccess`], which
//! the test suite also implements with a simulated register file.

use core::ptr::NonNull;
use core::sync::atomic::{fence, Ordering};

/// 32-bit register access at byte offsets from BAR0.
pub trait RegisterAccess {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);

    /// Read-modify-write: set `bits`.
    fn set_bits(&self, offset: usize, bits: u32) {
        let v = self.read32(offset);
        self.write32(offset, v | bits);
    }

    /// Read-modify-write: clear `bits`.
    fn clear_bits(&self, offset: usize, bits: u32) {
        let v = self.read32(offset);
        self.write32(offset, v & !bits);
    }
}

impl<R: RegisterAccess + ?Sized> RegisterAccess for &R {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// Order descriptor stores before a doorbell (tail) write.
#[inline]
pub fn wmb() {
    fence(Ordering::SeqCst);
}

/// Order a DD status read before reading the rest of the descriptor and the
/// buffer it points at.
#[inline]
pub fn rmb() {
    fence(Ordering::Acquire);
}

/// Bounds-checked volatile view of a mapped register window.
pub struct RegisterMap {
    /// Start of the window.
    base: NonNull<u8>,
    /// Window length in bytes.
    len: usize,
}

impl RegisterMap {
    /// Wrap a mapped register window.
    ///
    /// # Safety
    /// - `base` must be the start of a device register mapping of at least
    ///   `len` bytes, mapped uncached, that outlives the returned value
    /// - Nothing else may treat that window as ordinary memory
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Window length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn reg_ptr(&self, offset: usize) -> *mut u32 {
        assert!(offset % 4 == 0, "misaligned register offset {:#x}", offset);
        assert!(
            offset.checked_add(4).map_or(false, |end| end <= self.len),
            "register offset {:#x} outside {:#x}-byte window",
            offset,
            self.len
        );
        // SAFETY: offset + 4 <= len, so the pointer stays inside the window.
        unsafe { self.base.as_ptr().add(offset) as *mut u32 }
    }
}

impl RegisterAccess for RegisterMap {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        let ptr = self.reg_ptr(offset);
        // SAFETY: in-bounds, aligned, and the window is device memory.
        unsafe { core::ptr::read_volatile(ptr) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        let ptr = self.reg_ptr(offset);
        // SAFETY: as for read32.
        unsafe { core::ptr::write_volatile(ptr, value) }
    }
}

// Safety: RegisterMap only holds the window address; the facade lock
// serializes every access made through it.
unsafe impl Send for RegisterMap {}
