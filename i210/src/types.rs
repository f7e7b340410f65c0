//! Shared data types: station address, link state, capabilities, Ethernet
//! constants.
//!
//! # Reference
//! IEEE 802.3, Intel I210 Datasheet, Section 8.2.2 (STATUS)

use core::fmt;

use bitflags::bitflags;

pub const ETH_ALEN: usize = 6;
pub const ETH_HLEN: usize = 14;
pub const ETH_MTU: usize = 1500;
/// Largest frame accepted by `send`, FCS excluded (hardware appends it).
pub const ETH_FRAME_MAX: usize = ETH_HLEN + ETH_MTU;

/// Station MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; ETH_ALEN]);

impl MacAddress {
    /// Assemble from the receive-address register pair (RAL holds bytes 0-3
    /// little-endian, RAH the low 16 bits hold bytes 4-5).
    pub fn from_ral_rah(ral: u32, rah: u32) -> Self {
        let lo = ral.to_le_bytes();
        let hi = rah.to_le_bytes();
        MacAddress([lo[0], lo[1], lo[2], lo[3], hi[0], hi[1]])
    }

    /// Inverse of [`MacAddress::from_ral_rah`] (address-valid bit not set).
    pub fn to_ral_rah(&self) -> (u32, u32) {
        let b = self.0;
        (
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u32::from_le_bytes([b[4], b[5], 0, 0]),
        )
    }

    /// Neither all zeros nor all ones.
    pub fn is_valid(&self) -> bool {
        self.0 != [0; ETH_ALEN] && self.0 != [0xFF; ETH_ALEN]
    }

    pub fn as_bytes(&self) -> &[u8; ETH_ALEN] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Negotiated link speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Mbps10,
    Mbps100,
    Mbps1000,
}

impl Speed {
    pub fn mbps(&self) -> u32 {
        match self {
            Speed::Mbps10 => 10,
            Speed::Mbps100 => 100,
            Speed::Mbps1000 => 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

/// Simplified link state reported to the integration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up(Speed, Duplex),
}

impl LinkState {
    pub fn is_up(&self) -> bool {
        matches!(self, LinkState::Up(..))
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Down => write!(f, "down"),
            LinkState::Up(speed, duplex) => {
                let duplex = match duplex {
                    Duplex::Full => "full",
                    Duplex::Half => "half",
                };
                write!(f, "up {} Mbps {}-duplex", speed.mbps(), duplex)
            }
        }
    }
}

bitflags! {
    /// Features reported to the integration layer once the device is up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Broadcast frames are accepted (RCTL.BAM).
        const BROADCAST = 1 << 0;
        /// Hardware appends the FCS on transmit (TX cmd IFCS).
        const TX_FCS = 1 << 1;
        /// Hardware strips the FCS on receive (RCTL.SECRC).
        const RX_FCS_STRIP = 1 << 2;
    }
}

impl Capabilities {
    /// What this driver programs into every I210/I211.
    pub const I210: Capabilities = Capabilities::BROADCAST
        .union(Capabilities::TX_FCS)
        .union(Capabilities::RX_FCS_STRIP);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_mac_register_layout() {
        let mac = MacAddress::from_ral_rah(0x4433_2211, 0x8000_6655);
        assert_eq!(mac.0, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(mac.to_ral_rah(), (0x4433_2211, 0x6655));
        assert_eq!(mac.to_string(), "11:22:33:44:55:66");
    }

    #[test]
    fn test_mac_validity() {
        assert!(!MacAddress([0; 6]).is_valid());
        assert!(!MacAddress([0xFF; 6]).is_valid());
        assert!(MacAddress([0x00, 0x1B, 0x21, 0x01, 0x02, 0x03]).is_valid());
    }

    #[test]
    fn test_link_display() {
        assert_eq!(LinkState::Down.to_string(), "down");
        assert_eq!(
            LinkState::Up(Speed::Mbps1000, Duplex::Full).to_string(),
            "up 1000 Mbps full-duplex"
        );
    }
}
