//! Legacy RX/TX descriptor layouts.
//!
//! Both directions use the 16-byte legacy format (SRRCTL.DESCTYPE = 000b,
//! TX DEXT = 0).
//!
//! # Reference
//! Intel I210 Datasheet, Section 7.1.4.1 (Legacy Receive Descriptor) and
//! Section 7.2.2.1 (Legacy Transmit Descriptor)

use bitflags::bitflags;

/// Size of a single descriptor in bytes.
pub const DESC_SIZE: usize = 16;

/// Hardware descriptor that can live in a [`super::ring::DescRing`].
pub trait Descriptor: Copy + Default {
    /// Buffer address field.
    fn buffer_addr(&self) -> u64;
    /// Descriptor Done has been written back.
    fn is_done(&self) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════
// RECEIVE
// ═══════════════════════════════════════════════════════════════════════════

/// Legacy receive descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxDesc {
    pub addr: u64,
    pub length: u16,
    pub checksum: u16,
    pub status: u8,
    pub errors: u8,
    pub special: u16,
}

const _: () = assert!(core::mem::size_of::<RxDesc>() == DESC_SIZE);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxStatus: u8 {
        /// Descriptor done.
        const DD = 1 << 0;
        /// End of packet.
        const EOP = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxErrors: u8 {
        /// CRC / alignment error.
        const CE = 1 << 0;
        /// Symbol error.
        const SE = 1 << 1;
        /// Sequence error.
        const SEQ = 1 << 2;
        /// Carrier extension error.
        const CXE = 1 << 4;
        /// RX data error.
        const RXE = 1 << 7;
    }
}

impl RxDesc {
    /// Fresh descriptor pointing at `addr`, status cleared.
    pub fn armed(addr: u64) -> Self {
        Self {
            addr,
            ..Self::default()
        }
    }

    pub fn status(&self) -> RxStatus {
        RxStatus::from_bits_retain(self.status)
    }

    /// Frame-level errors only; checksum-offload bits are ignored.
    pub fn frame_errors(&self) -> RxErrors {
        RxErrors::from_bits_truncate(self.errors)
    }
}

impl Descriptor for RxDesc {
    fn buffer_addr(&self) -> u64 {
        self.addr
    }

    fn is_done(&self) -> bool {
        self.status().contains(RxStatus::DD)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TRANSMIT
// ═══════════════════════════════════════════════════════════════════════════

/// Legacy transmit descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxDesc {
    pub addr: u64,
    pub length: u16,
    pub cso: u8,
    pub cmd: u8,
    pub status: u8,
    pub css: u8,
    pub special: u16,
}

const _: () = assert!(core::mem::size_of::<TxDesc>() == DESC_SIZE);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxCmd: u8 {
        /// End of packet.
        const EOP = 1 << 0;
        /// Insert FCS.
        const IFCS = 1 << 1;
        /// Report status (DD writeback).
        const RS = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxStatus: u8 {
        const DD = 1 << 0;
    }
}

impl TxDesc {
    /// Single-buffer frame with FCS insertion and status writeback.
    pub fn frame(addr: u64, len: u16) -> Self {
        Self {
            addr,
            length: len,
            cmd: (TxCmd::EOP | TxCmd::IFCS | TxCmd::RS).bits(),
            ..Self::default()
        }
    }

    pub fn cmd(&self) -> TxCmd {
        TxCmd::from_bits_retain(self.cmd)
    }
}

impl Descriptor for TxDesc {
    fn buffer_addr(&self) -> u64 {
        self.addr
    }

    fn is_done(&self) -> bool {
        TxStatus::from_bits_retain(self.status).contains(TxStatus::DD)
    }
}
