//! Simulated I210 for host tests.
//!
//! `SimNic` is a register file with the hardware side effects the driver
//! depends on. Descriptor rings are found through the programmed base
//! registers and completed by writing straight into host memory; test DMA
//! memory is identity mapped, so a bus address is also a CPU pointer.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::vec::Vec;

use dma_pool::{DmaPool, DmaRegion, PAGE_SIZE};

use crate::driver::intel::desc::{RxDesc, RxStatus, TxDesc, TxStatus, DESC_SIZE};
use crate::driver::intel::mmio::RegisterAccess;
use crate::driver::intel::regs::{self, Ctrl, IntCause, Status};
use crate::types::{Duplex, MacAddress, Speed};

// ═══════════════════════════════════════════════════════════════════════════
// HOST DMA MEMORY
// ═══════════════════════════════════════════════════════════════════════════

/// Page-aligned, zeroed heap memory standing in for a DMA region.
pub struct HostDma {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl HostDma {
    pub fn new(size: usize) -> Self {
        let size = dma_pool::align_up(size.max(PAGE_SIZE), PAGE_SIZE);
        let layout = Layout::from_size_align(size, PAGE_SIZE).unwrap();
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).unwrap();
        Self { ptr, layout }
    }

    pub fn region(&self) -> DmaRegion {
        unsafe { DmaRegion::new(self.ptr, self.ptr.as_ptr() as u64, self.layout.size()) }
    }

    pub fn pool(&self) -> DmaPool {
        DmaPool::new(self.region()).unwrap()
    }
}

impl Drop for HostDma {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SIMULATED NIC
// ═══════════════════════════════════════════════════════════════════════════

pub struct SimNic {
    regs: RefCell<Vec<u32>>,
    phy: RefCell<[u16; 32]>,
    reset_stuck: Cell<bool>,
    rst_polls: Cell<u32>,
    icr_reads: Cell<u32>,
    mdic_stuck: Cell<bool>,
    mdic_error: Cell<bool>,
    queue_enable_stuck: Cell<bool>,
    sent: RefCell<Vec<Vec<u8>>>,
}

impl SimNic {
    pub const DEFAULT_MAC: MacAddress = MacAddress([0x00, 0x1B, 0x21, 0xAA, 0xBB, 0xCC]);

    pub fn new() -> Self {
        let nic = Self {
            regs: RefCell::new(vec![0; regs::MMIO_SIZE / 4]),
            phy: RefCell::new([0; 32]),
            reset_stuck: Cell::new(false),
            rst_polls: Cell::new(0),
            icr_reads: Cell::new(0),
            mdic_stuck: Cell::new(false),
            mdic_error: Cell::new(false),
            queue_enable_stuck: Cell::new(false),
            sent: RefCell::new(Vec::new()),
        };
        nic.set_mac(Self::DEFAULT_MAC);
        nic.set_phy_reg(regs::PHY_BMCR, 0x1140);
        nic
    }

    // ─── raw register file ───

    /// Register value without read side effects.
    pub fn reg(&self, offset: usize) -> u32 {
        self.regs.borrow()[offset / 4]
    }

    fn set_reg(&self, offset: usize, value: u32) {
        self.regs.borrow_mut()[offset / 4] = value;
    }

    // ─── knobs ───

    /// Program RAL0/RAH0 as the NVM autoload would.
    pub fn set_mac(&self, mac: MacAddress) {
        let (ral, rah) = mac.to_ral_rah();
        self.set_reg(regs::RAL0, ral);
        self.set_reg(regs::RAH0, rah | regs::RAH_AV);
    }

    pub fn set_link(&self, link: Option<(Speed, Duplex)>) {
        let status = match link {
            None => 0,
            Some((speed, duplex)) => {
                let speed_bits = match speed {
                    Speed::Mbps10 => 0b00,
                    Speed::Mbps100 => 0b01,
                    Speed::Mbps1000 => 0b10,
                };
                let mut s = Status::LU.bits() | (speed_bits << regs::STATUS_SPEED_SHIFT);
                if duplex == Duplex::Full {
                    s |= Status::FD.bits();
                }
                s
            }
        };
        self.set_reg(regs::STATUS, status);
    }

    pub fn set_reset_stuck(&self, stuck: bool) {
        self.reset_stuck.set(stuck);
    }

    /// CTRL reads observed while RST was set.
    pub fn rst_polls(&self) -> u32 {
        self.rst_polls.get()
    }

    pub fn icr_reads(&self) -> u32 {
        self.icr_reads.get()
    }

    pub fn set_mdic_stuck(&self, stuck: bool) {
        self.mdic_stuck.set(stuck);
    }

    pub fn set_mdic_error(&self, error: bool) {
        self.mdic_error.set(error);
    }

    /// RXDCTL/TXDCTL.ENABLE never latches.
    pub fn set_queue_enable_stuck(&self, stuck: bool) {
        self.queue_enable_stuck.set(stuck);
    }

    pub fn phy_reg(&self, reg: u32) -> u16 {
        self.phy.borrow()[reg as usize]
    }

    pub fn set_phy_reg(&self, reg: u32, value: u16) {
        self.phy.borrow_mut()[reg as usize] = value;
    }

    /// Latch interrupt causes.
    pub fn raise(&self, cause: IntCause) {
        let icr = self.reg(regs::ICR);
        self.set_reg(regs::ICR, icr | cause.bits());
    }

    /// Frames the device has "put on the wire", in order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    // ─── hardware behaviour ───

    fn global_reset(&self) {
        let keep = [regs::STATUS, regs::RAL0, regs::RAH0];
        let saved: Vec<u32> = keep.iter().map(|&r| self.reg(r)).collect();
        self.regs.borrow_mut().iter_mut().for_each(|r| *r = 0);
        for (&r, v) in keep.iter().zip(saved) {
            self.set_reg(r, v);
        }
    }

    fn mdic_access(&self, value: u32) {
        if self.mdic_stuck.get() {
            self.set_reg(regs::MDIC, value & !regs::MDIC_READY);
            return;
        }
        let reg = (value >> regs::MDIC_REG_SHIFT) & 0x1F;
        let mut out = value | regs::MDIC_READY;
        if value & regs::MDIC_OP_READ == regs::MDIC_OP_READ {
            out = (out & !regs::MDIC_DATA_MASK) | self.phy_reg(reg) as u32;
        } else if value & regs::MDIC_OP_WRITE == regs::MDIC_OP_WRITE {
            self.set_phy_reg(reg, (value & regs::MDIC_DATA_MASK) as u16);
        }
        if self.mdic_error.get() {
            out |= regs::MDIC_ERROR;
        }
        self.set_reg(regs::MDIC, out);
    }

    fn ring_base(&self, bal: usize, bah: usize) -> u64 {
        self.reg(bal) as u64 | ((self.reg(bah) as u64) << 32)
    }

    /// DMA one frame into the descriptor at RDH with DD | EOP set.
    ///
    /// Returns false if the device owns no descriptor (RDH == RDT).
    pub fn complete_rx(&self, frame: &[u8]) -> bool {
        self.complete_rx_with(frame, RxStatus::DD | RxStatus::EOP, 0)
    }

    pub fn complete_rx_with(&self, frame: &[u8], status: RxStatus, errors: u8) -> bool {
        let count = self.reg(regs::RDLEN) as usize / DESC_SIZE;
        let head = self.reg(regs::RDH) as usize;
        if count == 0 || head == self.reg(regs::RDT) as usize {
            return false;
        }

        let base = self.ring_base(regs::RDBAL, regs::RDBAH) as *mut RxDesc;
        unsafe {
            let slot = base.add(head);
            let mut desc = core::ptr::read_volatile(slot);
            assert_ne!(desc.addr, 0, "device fetched an unarmed RX descriptor");
            core::ptr::copy_nonoverlapping(frame.as_ptr(), desc.addr as *mut u8, frame.len());
            desc.length = frame.len() as u16;
            desc.status = status.bits();
            desc.errors = errors;
            core::ptr::write_volatile(slot, desc);
        }

        self.set_reg(regs::RDH, ((head + 1) % count) as u32);
        self.raise(IntCause::RXT0);
        true
    }

    /// Transmit everything between TDH and TDT.
    pub fn complete_tx(&self) -> usize {
        self.complete_tx_n(usize::MAX)
    }

    /// Transmit at most `n` descriptors starting at TDH.
    pub fn complete_tx_n(&self, n: usize) -> usize {
        let count = self.reg(regs::TDLEN) as usize / DESC_SIZE;
        if count == 0 {
            return 0;
        }
        let base = self.ring_base(regs::TDBAL, regs::TDBAH) as *mut TxDesc;
        let tail = self.reg(regs::TDT) as usize;
        let mut head = self.reg(regs::TDH) as usize;
        let mut done = 0;

        while head != tail && done < n {
            unsafe {
                let slot = base.add(head);
                let mut desc = core::ptr::read_volatile(slot);
                let bytes =
                    core::slice::from_raw_parts(desc.addr as *const u8, desc.length as usize);
                self.sent.borrow_mut().push(bytes.to_vec());
                desc.status |= TxStatus::DD.bits();
                core::ptr::write_volatile(slot, desc);
            }
            head = (head + 1) % count;
            done += 1;
        }

        self.set_reg(regs::TDH, head as u32);
        if done > 0 {
            self.raise(IntCause::TXDW);
        }
        done
    }
}

impl RegisterAccess for SimNic {
    fn read32(&self, offset: usize) -> u32 {
        assert!(offset % 4 == 0 && offset < regs::MMIO_SIZE);
        match offset {
            regs::CTRL => {
                let ctrl = self.reg(regs::CTRL);
                if ctrl & Ctrl::RST.bits() == 0 {
                    return ctrl;
                }
                self.rst_polls.set(self.rst_polls.get() + 1);
                if self.reset_stuck.get() {
                    return ctrl;
                }
                self.global_reset();
                self.reg(regs::CTRL)
            }
            regs::ICR => {
                self.icr_reads.set(self.icr_reads.get() + 1);
                let icr = self.reg(regs::ICR);
                self.set_reg(regs::ICR, 0);
                icr
            }
            _ => self.reg(offset),
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        assert!(offset % 4 == 0 && offset < regs::MMIO_SIZE);
        match offset {
            regs::ICR => {
                let icr = self.reg(regs::ICR);
                self.set_reg(regs::ICR, icr & !value);
            }
            regs::ICS => self.raise(IntCause::from_bits_retain(value)),
            regs::IMS => {
                let ims = self.reg(regs::IMS);
                self.set_reg(regs::IMS, ims | value);
            }
            regs::IMC => {
                let ims = self.reg(regs::IMS);
                self.set_reg(regs::IMS, ims & !value);
            }
            regs::MDIC => self.mdic_access(value),
            regs::RXDCTL | regs::TXDCTL if self.queue_enable_stuck.get() => {
                self.set_reg(offset, value & !regs::QUEUE_ENABLE)
            }
            _ => self.set_reg(offset, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_register_semantics() {
        let nic = SimNic::new();
        nic.write32(regs::IMS, 0b101);
        nic.write32(regs::IMC, 0b001);
        assert_eq!(nic.read32(regs::IMS), 0b100);

        nic.write32(regs::ICS, IntCause::LSC.bits());
        assert_eq!(nic.read32(regs::ICR), IntCause::LSC.bits());
        assert_eq!(nic.read32(regs::ICR), 0);
    }

    #[test]
    fn test_reset_self_clears() {
        let nic = SimNic::new();
        nic.write32(regs::IMS, 0xFF);
        nic.write32(regs::CTRL, Ctrl::RST.bits());
        assert_eq!(nic.read32(regs::CTRL), 0);
        assert_eq!(nic.reg(regs::IMS), 0);
        assert_eq!(
            MacAddress::from_ral_rah(nic.reg(regs::RAL0), nic.reg(regs::RAH0)),
            SimNic::DEFAULT_MAC
        );
    }
}
