//! Descriptor ring shared by the RX and TX paths.
//!
//! A `DescRing` is N descriptors laid out contiguously in DMA memory plus a
//! parallel slot table holding the [`DmaBuffer`] each descriptor points at.
//! It knows nothing about head/tail semantics; [`super::rx::RxRing`] and
//! [`super::tx::TxRing`] layer those on top.

use alloc::vec::Vec;
use core::marker::PhantomData;

use dma_pool::DmaRegion;

use super::desc::{Descriptor, DESC_SIZE};
use super::mmio::RegisterAccess;
use super::regs;
use crate::dma::DmaBuffer;
use crate::error::InitError;

/// Per-queue register set.
#[derive(Debug, Clone, Copy)]
pub struct RingRegs {
    pub bal: usize,
    pub bah: usize,
    pub len: usize,
    pub head: usize,
    pub tail: usize,
    pub dctl: usize,
}

/// RX queue 0.
pub const RX_QUEUE0: RingRegs = RingRegs {
    bal: regs::RDBAL,
    bah: regs::RDBAH,
    len: regs::RDLEN,
    head: regs::RDH,
    tail: regs::RDT,
    dctl: regs::RXDCTL,
};

/// TX queue 0.
pub const TX_QUEUE0: RingRegs = RingRegs {
    bal: regs::TDBAL,
    bah: regs::TDBAH,
    len: regs::TDLEN,
    head: regs::TDH,
    tail: regs::TDT,
    dctl: regs::TXDCTL,
};

pub struct DescRing<D: Descriptor> {
    /// Descriptor table.
    table: DmaRegion,
    /// Buffer recorded for each slot, `None` while the slot is empty.
    slots: Vec<Option<DmaBuffer>>,
    /// Number of descriptors (power of two).
    capacity: usize,
    regs: RingRegs,
    _desc: PhantomData<D>,
}

impl<D: Descriptor> DescRing<D> {
    /// Lay a ring of `capacity` descriptors over `table` and zero them.
    ///
    /// # Panics
    /// Panics if `capacity` is not a power of two or the table is too small.
    pub fn new(table: DmaRegion, capacity: usize, regs: RingRegs) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        assert!(
            capacity * DESC_SIZE <= table.size(),
            "descriptor table too small"
        );
        // Legacy descriptor tables must be 128-byte aligned.
        assert!(table.bus_addr() % 128 == 0, "descriptor table misaligned");

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        let ring = Self {
            table,
            slots,
            capacity,
            regs,
            _desc: PhantomData,
        };
        for i in 0..capacity {
            ring.write(i, D::default());
        }
        ring
    }

    /// Publish base, length and zeroed head/tail to the device. The queue is
    /// left disabled.
    pub fn program<R: RegisterAccess>(&self, mmio: &R) {
        let base = self.table.bus_addr();
        mmio.write32(self.regs.dctl, 0);
        mmio.write32(self.regs.bal, base as u32);
        mmio.write32(self.regs.bah, (base >> 32) as u32);
        mmio.write32(self.regs.len, self.len_bytes());
        mmio.write32(self.regs.head, 0);
        mmio.write32(self.regs.tail, 0);
    }

    /// Set the queue enable bit and wait, at most `polls` reads, for the
    /// device to report it set. The tail must not move before that.
    pub fn enable_queue<R: RegisterAccess>(&self, mmio: &R, polls: u32) -> Result<(), InitError> {
        mmio.set_bits(self.regs.dctl, regs::QUEUE_ENABLE);
        for _ in 0..polls {
            if mmio.read32(self.regs.dctl) & regs::QUEUE_ENABLE != 0 {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(InitError::QueueEnableTimeout)
    }

    /// Doorbell: hand slots up to (not including) `index` to the device.
    ///
    /// Issues the write barrier first so every descriptor store is visible
    /// before the device can fetch it.
    pub fn write_tail<R: RegisterAccess>(&self, mmio: &R, index: usize) {
        super::mmio::wmb();
        mmio.write32(self.regs.tail, index as u32);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len_bytes(&self) -> u32 {
        (self.capacity * DESC_SIZE) as u32
    }

    pub fn bus_addr(&self) -> u64 {
        self.table.bus_addr()
    }

    #[inline]
    pub fn next(&self, index: usize) -> usize {
        (index + 1) & (self.capacity - 1)
    }

    #[inline]
    fn desc_ptr(&self, index: usize) -> *mut D {
        assert!(index < self.capacity, "descriptor index out of range");
        // SAFETY: index < capacity and the table holds capacity descriptors.
        unsafe { (self.table.cpu_ptr() as *mut D).add(index) }
    }

    /// Volatile read of descriptor `index`.
    pub fn read(&self, index: usize) -> D {
        // SAFETY: in-bounds, aligned DMA memory owned by this ring.
        unsafe { core::ptr::read_volatile(self.desc_ptr(index)) }
    }

    /// Volatile write of descriptor `index`.
    pub fn write(&self, index: usize, desc: D) {
        // SAFETY: as for `read`.
        unsafe { core::ptr::write_volatile(self.desc_ptr(index), desc) }
    }

    /// Record `buf` as device-owned in `index` after writing its descriptor.
    ///
    /// # Panics
    /// Panics if the slot is occupied or `desc` does not point at `buf`.
    pub fn publish(&mut self, index: usize, mut buf: DmaBuffer, desc: D) {
        assert!(self.slots[index].is_none(), "slot {} already armed", index);
        assert_eq!(desc.buffer_addr(), buf.bus_addr(), "descriptor/buffer mismatch");
        self.write(index, desc);
        // SAFETY: the descriptor is written; the device may take it from here.
        unsafe { buf.mark_device_owned() };
        self.slots[index] = Some(buf);
    }

    /// Take the buffer back from `index` once the device is done with it.
    pub fn take(&mut self, index: usize) -> Option<DmaBuffer> {
        let mut buf = self.slots[index].take()?;
        // SAFETY: callers only take after DD writeback or device reset.
        unsafe { buf.mark_driver_owned() };
        Some(buf)
    }

    pub fn slot(&self, index: usize) -> Option<&DmaBuffer> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Whether `index` holds a device-owned buffer its descriptor points at.
    pub fn is_armed(&self, index: usize) -> bool {
        match self.slot(index) {
            Some(buf) => buf.is_device_owned() && self.read(index).buffer_addr() == buf.bus_addr(),
            None => false,
        }
    }

    /// Drain every occupied slot (device must be quiesced or reset).
    pub fn drain(&mut self) -> impl Iterator<Item = DmaBuffer> + '_ {
        (0..self.capacity).filter_map(move |i| {
            self.write(i, D::default());
            self.take(i)
        })
    }
}
