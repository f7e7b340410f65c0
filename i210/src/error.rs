//! Driver error types.
//!
//! One enum per concern. Only `DeviceTimeout` and `InitError` are fatal (for
//! the device and for the init attempt respectively); the rest are
//! backpressure or per-frame conditions the caller recovers from.

use core::fmt;

use dma_pool::DmaError;

use crate::types::MacAddress;

// ═══════════════════════════════════════════════════════════════════════════
// RESET
// ═══════════════════════════════════════════════════════════════════════════

/// CTRL.RST never self-cleared within the configured poll budget.
///
/// The device is unusable until it is initialized again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTimeout;

impl fmt::Display for DeviceTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device reset timed out")
    }
}

/// Reset requested through the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetError {
    /// No controller has been initialized.
    NotReady,
    /// CTRL.RST never self-cleared.
    DeviceTimeout,
}

impl fmt::Display for ResetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "no device to reset"),
            Self::DeviceTimeout => write!(f, "device reset timed out"),
        }
    }
}

impl From<DeviceTimeout> for ResetError {
    fn from(_: DeviceTimeout) -> Self {
        ResetError::DeviceTimeout
    }
}

impl From<NotReady> for ResetError {
    fn from(_: NotReady) -> Self {
        ResetError::NotReady
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// INIT
// ═══════════════════════════════════════════════════════════════════════════

/// Initialization errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// A controller instance is already up.
    AlreadyInitialized,
    /// Device reset timed out.
    DeviceTimeout,
    /// RXDCTL/TXDCTL.ENABLE did not read back set.
    QueueEnableTimeout,
    /// MAC address in RAL0/RAH0 is all zeros or all ones.
    InvalidMac(MacAddress),
    /// Configuration rejected by `I210Config::validate`.
    InvalidConfig(&'static str),
    /// DMA memory could not be carved for rings or buffers.
    Dma(DmaError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "controller already initialized"),
            Self::DeviceTimeout => write!(f, "device reset timed out"),
            Self::QueueEnableTimeout => write!(f, "queue enable timed out"),
            Self::InvalidMac(mac) => write!(f, "invalid MAC address {}", mac),
            Self::InvalidConfig(why) => write!(f, "invalid configuration: {}", why),
            Self::Dma(err) => write!(f, "DMA setup failed: {}", err),
        }
    }
}

impl From<DmaError> for InitError {
    fn from(err: DmaError) -> Self {
        InitError::Dma(err)
    }
}

impl From<DeviceTimeout> for InitError {
    fn from(_: DeviceTimeout) -> Self {
        InitError::DeviceTimeout
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DATA PATH
// ═══════════════════════════════════════════════════════════════════════════

/// TX errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// TX ring (or its buffer pool) is full, try again after completions.
    RingFull,
    /// Frame exceeds the maximum Ethernet frame size.
    TooLarge {
        /// Offending frame length.
        len: usize,
    },
    /// Zero-length frame.
    Empty,
    /// No controller in the Ready state.
    NotReady,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingFull => write!(f, "TX ring full"),
            Self::TooLarge { len } => write!(f, "frame too large ({} bytes)", len),
            Self::Empty => write!(f, "empty frame"),
            Self::NotReady => write!(f, "device not ready"),
        }
    }
}

impl From<NotReady> for SendError {
    fn from(_: NotReady) -> Self {
        SendError::NotReady
    }
}

/// RX reclaim errors.
///
/// Each one consumed a completed descriptor; the slot has already been
/// re-armed and the ring advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxError {
    /// No fresh buffer to re-arm with; the frame was dropped.
    ResourceExhausted,
    /// Hardware flagged receive errors (RX descriptor ERRORS byte).
    PacketError(u8),
    /// Frame spans more than one descriptor (EOP clear).
    Fragmented,
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted => write!(f, "RX buffer pool exhausted"),
            Self::PacketError(bits) => write!(f, "RX packet error {:#04x}", bits),
            Self::Fragmented => write!(f, "fragmented RX frame"),
        }
    }
}

/// Operation requires a Ready controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotReady;

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device not ready")
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRNO MAPPING
// ═══════════════════════════════════════════════════════════════════════════

/// Negative errno-style codes reported across the C ABI.
pub mod errno {
    use super::{InitError, ResetError, SendError};

    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const EMSGSIZE: i32 = 90;
    pub const ETIMEDOUT: i32 = 110;
    pub const EALREADY: i32 = 114;

    pub fn from_init(err: InitError) -> i32 {
        match err {
            InitError::AlreadyInitialized => -EALREADY,
            InitError::DeviceTimeout | InitError::QueueEnableTimeout => -ETIMEDOUT,
            InitError::InvalidMac(_) => -EIO,
            InitError::InvalidConfig(_) => -EINVAL,
            InitError::Dma(_) => -ENOMEM,
        }
    }

    pub fn from_send(err: SendError) -> i32 {
        match err {
            SendError::RingFull => -EBUSY,
            SendError::TooLarge { .. } => -EMSGSIZE,
            SendError::Empty => -EINVAL,
            SendError::NotReady => -ENODEV,
        }
    }

    pub fn from_reset(err: ResetError) -> i32 {
        match err {
            ResetError::NotReady => -ENODEV,
            ResetError::DeviceTimeout => -ETIMEDOUT,
        }
    }
}
