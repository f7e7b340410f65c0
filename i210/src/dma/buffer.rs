//! DMA buffer with ownership tracking.
//!
//! A `DmaBuffer` is a move-only handle: exactly one place (a pool free list,
//! a ring slot, or a caller in the middle of a reclaim) holds it at a time,
//! so a buffer can be neither double-freed nor published twice.

use core::ptr::NonNull;

use super::ownership::BufferOwnership;

/// A single fixed-size DMA buffer with ownership tracking.
///
/// Tracks both CPU and bus addresses, plus ownership state.
#[derive(Debug)]
pub struct DmaBuffer {
    /// CPU-accessible pointer to buffer data.
    cpu_ptr: NonNull<u8>,
    /// Device-visible bus address.
    bus_addr: u64,
    /// Buffer capacity in bytes.
    capacity: usize,
    /// Current ownership state.
    ownership: BufferOwnership,
    /// Buffer index within its pool.
    index: u16,
}

impl DmaBuffer {
    /// Create a new (Free) DMA buffer.
    ///
    /// # Safety
    /// - `cpu_ptr` must point to `capacity` bytes of valid DMA-capable memory
    /// - `bus_addr` must be the corresponding device-visible address
    pub(crate) unsafe fn new(
        cpu_ptr: NonNull<u8>,
        bus_addr: u64,
        capacity: usize,
        index: u16,
    ) -> Self {
        Self {
            cpu_ptr,
            bus_addr,
            capacity,
            ownership: BufferOwnership::Free,
            index,
        }
    }

    /// Get buffer data as slice.
    ///
    /// # Panics
    /// Panics if buffer is not DriverOwned.
    pub fn as_slice(&self) -> &[u8] {
        assert!(
            self.ownership.can_access(),
            "BUG: Cannot access buffer not owned by driver (state: {:?})",
            self.ownership
        );
        // SAFETY: DriverOwned means the device is not writing to it.
        unsafe { core::slice::from_raw_parts(self.cpu_ptr.as_ptr(), self.capacity) }
    }

    /// Get buffer data as mutable slice.
    ///
    /// # Panics
    /// Panics if buffer is not DriverOwned.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        assert!(
            self.ownership.can_access(),
            "BUG: Cannot access buffer not owned by driver (state: {:?})",
            self.ownership
        );
        // SAFETY: as above, and `&mut self` excludes other CPU aliases.
        unsafe { core::slice::from_raw_parts_mut(self.cpu_ptr.as_ptr(), self.capacity) }
    }

    /// Copy `data` to the start of the buffer.
    ///
    /// # Panics
    /// Panics if buffer is not DriverOwned or `data` exceeds capacity.
    pub fn fill(&mut self, data: &[u8]) {
        assert!(data.len() <= self.capacity, "Frame exceeds buffer capacity");
        self.as_mut_slice()[..data.len()].copy_from_slice(data);
    }

    /// Get the device-visible bus address.
    pub fn bus_addr(&self) -> u64 {
        self.bus_addr
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ownership(&self) -> BufferOwnership {
        self.ownership
    }

    pub fn is_driver_owned(&self) -> bool {
        self.ownership.can_access()
    }

    pub fn is_device_owned(&self) -> bool {
        self.ownership.is_device_owned()
    }

    /// Free -> DriverOwned. Pool allocation only.
    pub(crate) fn mark_allocated(&mut self) {
        assert!(self.ownership.is_free(), "Buffer must be free to allocate");
        self.ownership = BufferOwnership::DriverOwned;
    }

    /// DriverOwned -> DeviceOwned.
    ///
    /// # Safety
    /// Only call immediately before publishing the buffer in a descriptor;
    /// the CPU must not touch the contents until `mark_driver_owned`.
    pub(crate) unsafe fn mark_device_owned(&mut self) {
        assert!(
            self.ownership.can_access(),
            "Buffer must be driver-owned before device transfer"
        );
        self.ownership = BufferOwnership::DeviceOwned;
    }

    /// DeviceOwned -> DriverOwned.
    ///
    /// # Safety
    /// Only call after the device reported completion (DD writeback) or
    /// after the device has been reset.
    pub(crate) unsafe fn mark_driver_owned(&mut self) {
        assert!(
            self.ownership.is_device_owned(),
            "Buffer must be device-owned before reclaim"
        );
        self.ownership = BufferOwnership::DriverOwned;
    }

    /// DriverOwned -> Free. Pool return only.
    pub(crate) fn mark_free(&mut self) {
        assert!(
            self.ownership.can_access(),
            "Buffer must be driver-owned before freeing"
        );
        self.ownership = BufferOwnership::Free;
    }
}

// Safety: DmaBuffer is a unique handle to memory inside a DmaPool region;
// moving it moves exclusive access with it.
unsafe impl Send for DmaBuffer {}
