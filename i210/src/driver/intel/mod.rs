//! Intel I210/I211 Gigabit Ethernet driver.
//!
//! # Reference
//! Intel Ethernet Controller I210 Datasheet

pub mod desc;
pub mod i210;
pub mod init;
pub mod link;
pub mod mmio;
pub mod phy;
pub mod regs;
pub mod ring;
pub mod rx;
pub mod tx;

pub use i210::{DeviceState, I210};
pub use init::I210Config;

/// Intel PCI vendor ID.
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Supported device IDs.
pub const I210_DEVICE_IDS: &[u16] = &[
    0x1533, // I210 copper
    0x1534, // I210 copper OEM
    0x1535, // I210 copper IT
    0x1536, // I210 fiber
    0x1537, // I210 SERDES
    0x1538, // I210 SGMII
    0x1539, // I211 copper
    0x157B, // I210 copper, flashless
    0x157C, // I210 SERDES, flashless
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::traits::DriverInit;
    use mmio::RegisterMap;

    #[test]
    fn test_supports_device() {
        assert!(I210::<RegisterMap>::supports_device(0x8086, 0x1533));
        assert!(I210::<RegisterMap>::supports_device(0x8086, 0x1539));
        assert!(!I210::<RegisterMap>::supports_device(0x8086, 0x10D3));
        assert!(!I210::<RegisterMap>::supports_device(0x10EC, 0x1539));
    }
}
