//! Firmware-agnostic DMA memory pool allocator.
//!
//! This crate manages a single DMA-capable memory region handed over by the
//! platform (for example a physically contiguous block obtained by the OS
//! integration layer) and carves page-granular allocations out of it for
//! device drivers: descriptor tables, packet buffer arenas, and so on.
//!
//! # Design Philosophy
//!
//! - **Zero firmware dependencies**: Works on any platform
//! - **Explicit ownership**: One pool per device instance, no global state
//! - **Dual addressing**: Every allocation carries the CPU pointer *and* the
//!   bus address the device must be programmed with
//!
//! # Usage
//!
//! ```ignore
//! use dma_pool::{DmaPool, DmaRegion};
//!
//! // Region obtained from the platform (cpu pointer, bus address, size)
//! let region = unsafe { DmaRegion::new(cpu_ptr, bus_addr, 2 * 1024 * 1024) };
//! let mut pool = DmaPool::new(region)?;
//!
//! // Allocate zeroed DMA memory
//! let ring = pool.alloc_pages(1)?;
//! program_device(ring.bus_addr());
//! ```

#![cfg_attr(not(test), no_std)]

use core::ptr::NonNull;

/// Page size (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Maximum allocation tracking entries.
pub const MAX_ALLOCATIONS: usize = 128;

/// Minimum usable memory region size (one page).
pub const MIN_REGION_SIZE: usize = PAGE_SIZE;

// ============================================================================
// Utility functions
// ============================================================================

/// Align a value up to the given alignment.
#[inline]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Align a value down to the given alignment.
#[inline]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

/// Convert pages to bytes.
#[inline]
pub const fn pages_to_bytes(pages: usize) -> usize {
    pages * PAGE_SIZE
}

/// Convert bytes to pages (rounded up).
#[inline]
pub const fn bytes_to_pages(bytes: usize) -> usize {
    align_up(bytes, PAGE_SIZE) / PAGE_SIZE
}

// ============================================================================
// Error types
// ============================================================================

/// DMA pool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Requested 0 pages.
    ZeroPages,
    /// Not enough memory in pool.
    OutOfMemory,
    /// Allocation tracking table is full.
    TooManyAllocations,
    /// Invalid memory region (misaligned, too small, or null).
    InvalidRegion,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroPages => write!(f, "zero-page DMA allocation"),
            Self::OutOfMemory => write!(f, "DMA pool exhausted"),
            Self::TooManyAllocations => write!(f, "DMA allocation table full"),
            Self::InvalidRegion => write!(f, "invalid DMA region"),
        }
    }
}

/// Result type for DMA operations.
pub type Result<T> = core::result::Result<T, DmaError>;

// ============================================================================
// DMA region
// ============================================================================

/// A contiguous block of DMA-capable memory.
///
/// Tracks both the CPU-visible pointer and the device-visible bus address.
/// The two are not assumed to be equal; identity mapping is just the special
/// case `bus_addr == cpu_ptr as u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRegion {
    /// CPU-accessible pointer to the first byte.
    cpu_ptr: NonNull<u8>,
    /// Device-visible bus address of the first byte.
    bus_addr: u64,
    /// Size in bytes.
    size: usize,
}

impl DmaRegion {
    /// Describe a DMA region.
    ///
    /// # Safety
    /// - `cpu_ptr` must be valid for reads and writes of `size` bytes
    /// - `bus_addr` must be the address at which the device sees `cpu_ptr`
    /// - The memory must be physically contiguous and stay mapped for as
    ///   long as any allocation made from it is alive
    pub const unsafe fn new(cpu_ptr: NonNull<u8>, bus_addr: u64, size: usize) -> Self {
        Self {
            cpu_ptr,
            bus_addr,
            size,
        }
    }

    /// Get the CPU pointer.
    #[inline]
    pub fn cpu_ptr(&self) -> *mut u8 {
        self.cpu_ptr.as_ptr()
    }

    /// Get the device-visible bus address.
    #[inline]
    pub fn bus_addr(&self) -> u64 {
        self.bus_addr
    }

    /// Get size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if region is usable for DMA (page-aligned, large enough).
    pub fn is_usable(&self) -> bool {
        self.cpu_ptr.as_ptr() as usize % PAGE_SIZE == 0
            && self.bus_addr % PAGE_SIZE as u64 == 0
            && self.size >= MIN_REGION_SIZE
    }

    /// Sub-region starting `offset` bytes in, `size` bytes long.
    ///
    /// Returns `None` if the requested window does not fit.
    pub fn slice(&self, offset: usize, size: usize) -> Option<DmaRegion> {
        let end = offset.checked_add(size)?;
        if end > self.size {
            return None;
        }
        // SAFETY: offset is within the region, so the pointer stays in bounds
        // and non-null.
        let cpu_ptr = unsafe { NonNull::new_unchecked(self.cpu_ptr.as_ptr().add(offset)) };
        Some(DmaRegion {
            cpu_ptr,
            bus_addr: self.bus_addr + offset as u64,
            size,
        })
    }
}

// ============================================================================
// Allocation tracking
// ============================================================================

#[derive(Clone, Copy)]
struct Allocation {
    offset: usize,
    pages: usize,
    in_use: bool,
}

impl Allocation {
    const fn empty() -> Self {
        Self { offset: 0, pages: 0, in_use: false }
    }
}

// ============================================================================
// DmaPool - Main API
// ============================================================================

/// Page-granular DMA memory pool over a single region.
///
/// Bump allocation with a tracking table. Freed allocations at the top of
/// the pool are returned immediately; anything else is reclaimed on
/// [`DmaPool::reset`].
pub struct DmaPool {
    /// Backing region.
    region: DmaRegion,
    /// Bump allocator offset.
    offset: usize,
    /// Allocation tracking.
    allocations: [Allocation; MAX_ALLOCATIONS],
    /// Number of tracking entries used.
    alloc_count: usize,
}

impl DmaPool {
    /// Create a pool over a region.
    ///
    /// The region is trimmed to whole pages and zeroed.
    pub fn new(region: DmaRegion) -> Result<Self> {
        if !region.is_usable() {
            return Err(DmaError::InvalidRegion);
        }

        let size = align_down(region.size(), PAGE_SIZE);
        // SAFETY: `DmaRegion::new` guarantees the memory is writable.
        unsafe {
            core::ptr::write_bytes(region.cpu_ptr(), 0, size);
        }

        Ok(Self {
            region: DmaRegion { size, ..region },
            offset: 0,
            allocations: [Allocation::empty(); MAX_ALLOCATIONS],
            alloc_count: 0,
        })
    }

    /// Allocate contiguous, zeroed DMA pages.
    pub fn alloc_pages(&mut self, pages: usize) -> Result<DmaRegion> {
        if pages == 0 {
            return Err(DmaError::ZeroPages);
        }
        if self.alloc_count >= MAX_ALLOCATIONS {
            return Err(DmaError::TooManyAllocations);
        }

        let size = pages_to_bytes(pages);
        let aligned_offset = align_up(self.offset, PAGE_SIZE);
        let new_offset = aligned_offset
            .checked_add(size)
            .ok_or(DmaError::OutOfMemory)?;

        if new_offset > self.region.size() {
            return Err(DmaError::OutOfMemory);
        }

        let region = self
            .region
            .slice(aligned_offset, size)
            .ok_or(DmaError::OutOfMemory)?;

        self.offset = new_offset;
        self.allocations[self.alloc_count] = Allocation {
            offset: aligned_offset,
            pages,
            in_use: true,
        };
        self.alloc_count += 1;

        // Zero the memory
        // SAFETY: region lies inside the pool's backing memory.
        unsafe {
            core::ptr::write_bytes(region.cpu_ptr(), 0, size);
        }

        Ok(region)
    }

    /// Allocate enough pages to hold `bytes`.
    pub fn alloc_bytes(&mut self, bytes: usize) -> Result<DmaRegion> {
        self.alloc_pages(bytes_to_pages(bytes))
    }

    /// Deallocate DMA pages.
    ///
    /// Note: With bump allocation, memory is only reusable immediately when
    /// it was the most recent allocation; otherwise it waits for `reset`.
    ///
    /// # Safety
    ///
    /// `region` must have been returned by `alloc_pages` on this pool, and the
    /// device must no longer be accessing it.
    pub unsafe fn dealloc_pages(&mut self, region: &DmaRegion) {
        let offset = (region.bus_addr() - self.region.bus_addr()) as usize;
        let pages = bytes_to_pages(region.size());

        for alloc in self.allocations[..self.alloc_count].iter_mut() {
            if alloc.in_use && alloc.offset == offset && alloc.pages == pages {
                alloc.in_use = false;
                break;
            }
        }

        // Pop freed entries off the top so the bump offset can roll back.
        while self.alloc_count > 0 && !self.allocations[self.alloc_count - 1].in_use {
            self.alloc_count -= 1;
            self.offset = self.allocations[self.alloc_count].offset;
            self.allocations[self.alloc_count] = Allocation::empty();
        }
    }

    /// Get remaining free space in bytes.
    pub fn free_space(&self) -> usize {
        self.region.size().saturating_sub(self.offset)
    }

    /// Get total pool size in bytes.
    pub fn total_size(&self) -> usize {
        self.region.size()
    }

    /// Number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.allocations[..self.alloc_count]
            .iter()
            .filter(|a| a.in_use)
            .count()
    }

    /// Backing region.
    pub fn region(&self) -> DmaRegion {
        self.region
    }

    /// Reset the allocator.
    ///
    /// # Safety
    ///
    /// All previous allocations must be abandoned and no longer accessed by
    /// the device.
    pub unsafe fn reset(&mut self) {
        self.offset = 0;
        self.alloc_count = 0;
        for alloc in self.allocations.iter_mut() {
            *alloc = Allocation::empty();
        }
    }
}

// SAFETY: the pool is the sole owner of its region; moving it between
// execution contexts moves that ownership with it.
unsafe impl Send for DmaPool {}

// ============================================================================
// Tests
// ============================================================================
