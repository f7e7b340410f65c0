//! Internal PHY access through MDIC.
//!
//! # Reference
//! Intel I210 Datasheet, Section 8.2.4 (MDIC) and Section 8.27 (PHY
//! registers)

use core::fmt;

use log::{debug, warn};

use super::mmio::RegisterAccess;
use super::regs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyError {
    /// MDIC.READY never set.
    Timeout,
    /// MDIC.E set by the PHY.
    Mdic,
}

impl fmt::Display for PhyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "MDIC timeout"),
            Self::Mdic => write!(f, "MDIC error"),
        }
    }
}

fn mdic_wait<R: RegisterAccess>(mmio: &R, polls: u32) -> Result<u32, PhyError> {
    for _ in 0..polls {
        let mdic = mmio.read32(regs::MDIC);
        if mdic & regs::MDIC_READY != 0 {
            if mdic & regs::MDIC_ERROR != 0 {
                return Err(PhyError::Mdic);
            }
            return Ok(mdic);
        }
        core::hint::spin_loop();
    }
    Err(PhyError::Timeout)
}

/// Read PHY register `reg`.
pub fn phy_read<R: RegisterAccess>(mmio: &R, reg: u32, polls: u32) -> Result<u16, PhyError> {
    mmio.write32(
        regs::MDIC,
        (reg << regs::MDIC_REG_SHIFT)
            | (regs::PHY_ADDR << regs::MDIC_PHY_SHIFT)
            | regs::MDIC_OP_READ,
    );
    let mdic = mdic_wait(mmio, polls)?;
    Ok((mdic & regs::MDIC_DATA_MASK) as u16)
}

/// Write PHY register `reg`.
pub fn phy_write<R: RegisterAccess>(
    mmio: &R,
    reg: u32,
    value: u16,
    polls: u32,
) -> Result<(), PhyError> {
    mmio.write32(
        regs::MDIC,
        value as u32
            | (reg << regs::MDIC_REG_SHIFT)
            | (regs::PHY_ADDR << regs::MDIC_PHY_SHIFT)
            | regs::MDIC_OP_WRITE,
    );
    mdic_wait(mmio, polls).map(|_| ())
}

/// Take the PHY out of power-down and isolation.
///
/// Firmware may leave BMCR.PDOWN or BMCR.ISOLATE set, in which case the link
/// never comes up. Failures are logged and otherwise ignored; the link
/// manager reports Down in that case.
pub fn wake_phy<R: RegisterAccess>(mmio: &R, polls: u32) {
    let bmcr = match phy_read(mmio, regs::PHY_BMCR, polls) {
        Ok(v) => v,
        Err(e) => {
            warn!("i210: BMCR read failed: {}", e);
            return;
        }
    };

    let mask = regs::BMCR_PDOWN | regs::BMCR_ISOLATE;
    if bmcr & mask == 0 {
        return;
    }

    debug!("i210: waking PHY (BMCR {:#06x})", bmcr);
    if let Err(e) = phy_write(mmio, regs::PHY_BMCR, bmcr & !mask, polls) {
        warn!("i210: BMCR write failed: {}", e);
    }
}
