//! Intel I210 register offsets and bit definitions.
//!
//! Only the registers this driver touches. Offsets are byte offsets from
//! BAR0; every register is 32 bits wide.
//!
//! # Reference
//! Intel I210 Datasheet, Section 8 (Programming Interface)

use bitflags::bitflags;

/// Size of the BAR0 memory window.
pub const MMIO_SIZE: usize = 128 * 1024;

// ═══════════════════════════════════════════════════════════════════════════
// GENERAL
// ═══════════════════════════════════════════════════════════════════════════

pub const CTRL: usize = 0x0000;
pub const STATUS: usize = 0x0008;
pub const EERD: usize = 0x0014;
pub const MDIC: usize = 0x0020;

bitflags! {
    /// Device Control (CTRL), Section 8.2.1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ctrl: u32 {
        const FD = 1 << 0;
        const LRST = 1 << 3;
        const ASDE = 1 << 5;
        const SLU = 1 << 6;
        const RST = 1 << 26;
        const PHY_RST = 1 << 31;
    }
}

bitflags! {
    /// Device Status (STATUS), Section 8.2.2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        const FD = 1 << 0;
        const LU = 1 << 1;
        const SPEED_LO = 1 << 6;
        const SPEED_HI = 1 << 7;
    }
}

/// STATUS.SPEED field.
pub const STATUS_SPEED_SHIFT: u32 = 6;
pub const STATUS_SPEED_MASK: u32 = 0b11 << STATUS_SPEED_SHIFT;

// ═══════════════════════════════════════════════════════════════════════════
// INTERRUPTS
// ═══════════════════════════════════════════════════════════════════════════

/// Interrupt Cause Read; clear-on-read.
pub const ICR: usize = 0x00C0;
/// Interrupt Cause Set.
pub const ICS: usize = 0x00C8;
/// Interrupt Mask Set/Read.
pub const IMS: usize = 0x00D0;
/// Interrupt Mask Clear.
pub const IMC: usize = 0x00D8;

bitflags! {
    /// Interrupt cause bits shared by ICR/ICS/IMS/IMC, Section 8.8.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntCause: u32 {
        /// Transmit descriptor written back.
        const TXDW = 1 << 0;
        /// Link status change.
        const LSC = 1 << 2;
        /// RX descriptor minimum threshold.
        const RXDMT0 = 1 << 4;
        /// Receiver overrun.
        const RXO = 1 << 6;
        /// Receiver timer interrupt.
        const RXT0 = 1 << 7;
    }
}

impl IntCause {
    /// Causes that mean "look at the RX ring".
    pub const RX_ANY: IntCause = IntCause::RXT0
        .union(IntCause::RXO)
        .union(IntCause::RXDMT0);
}

// ═══════════════════════════════════════════════════════════════════════════
// RECEIVE
// ═══════════════════════════════════════════════════════════════════════════

pub const RCTL: usize = 0x0100;

bitflags! {
    /// Receive Control (RCTL), Section 8.9.1. BSIZE = 00 selects 2048 bytes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rctl: u32 {
        const EN = 1 << 1;
        const SBP = 1 << 2;
        const UPE = 1 << 3;
        const MPE = 1 << 4;
        const LPE = 1 << 5;
        const BAM = 1 << 15;
        const SECRC = 1 << 26;
    }
}

/// Queue 0 receive registers.
pub const RDBAL: usize = 0xC000;
pub const RDBAH: usize = 0xC004;
pub const RDLEN: usize = 0xC008;
pub const SRRCTL: usize = 0xC00C;
pub const RDH: usize = 0xC010;
pub const RDT: usize = 0xC018;
pub const RXDCTL: usize = 0xC028;

/// SRRCTL.BSIZEPACKET, in 1 KB units.
pub const SRRCTL_BSIZEPKT_SHIFT: u32 = 0;
/// SRRCTL.DESCTYPE = 000b selects legacy descriptors.
pub const SRRCTL_DESCTYPE_LEGACY: u32 = 0b000 << 25;
pub const SRRCTL_DROP_EN: u32 = 1 << 31;

// ═══════════════════════════════════════════════════════════════════════════
// TRANSMIT
// ═══════════════════════════════════════════════════════════════════════════

pub const TCTL: usize = 0x0400;

bitflags! {
    /// Transmit Control (TCTL), Section 8.12.1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tctl: u32 {
        const EN = 1 << 1;
        const PSP = 1 << 3;
        const RTLC = 1 << 24;
    }
}

pub const TCTL_CT_SHIFT: u32 = 4;
pub const TCTL_COLD_SHIFT: u32 = 12;
/// Collision threshold.
pub const TCTL_CT_DEFAULT: u32 = 0x0F;
/// Collision distance.
pub const TCTL_COLD_DEFAULT: u32 = 0x40;

/// Queue 0 transmit registers.
pub const TDBAL: usize = 0xE000;
pub const TDBAH: usize = 0xE004;
pub const TDLEN: usize = 0xE008;
pub const TDH: usize = 0xE010;
pub const TDT: usize = 0xE018;
pub const TXDCTL: usize = 0xE028;

/// RXDCTL/TXDCTL queue enable.
pub const QUEUE_ENABLE: u32 = 1 << 25;

// ═══════════════════════════════════════════════════════════════════════════
// ADDRESS FILTERS
// ═══════════════════════════════════════════════════════════════════════════

/// Multicast Table Array.
pub const MTA: usize = 0x5200;
pub const MTA_ENTRIES: usize = 128;
/// Receive Address Low/High, entry 0.
pub const RAL0: usize = 0x5400;
pub const RAH0: usize = 0x5404;
/// RAH.AV: address valid.
pub const RAH_AV: u32 = 1 << 31;

// ═══════════════════════════════════════════════════════════════════════════
// MDIC / PHY
// ═══════════════════════════════════════════════════════════════════════════

pub const MDIC_DATA_MASK: u32 = 0xFFFF;
pub const MDIC_REG_SHIFT: u32 = 16;
pub const MDIC_PHY_SHIFT: u32 = 21;
pub const MDIC_OP_WRITE: u32 = 0b01 << 26;
pub const MDIC_OP_READ: u32 = 0b10 << 26;
pub const MDIC_READY: u32 = 1 << 28;
pub const MDIC_ERROR: u32 = 1 << 30;

/// MDIO address of the internal copper PHY.
pub const PHY_ADDR: u32 = 1;

/// PHY Basic Mode Control Register.
pub const PHY_BMCR: u32 = 0x00;
pub const BMCR_ISOLATE: u16 = 1 << 10;
pub const BMCR_PDOWN: u16 = 1 << 11;
