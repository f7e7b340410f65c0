//! Link state tracking.
//!
//! `Unknown -> Up` / `Down -> Up` when STATUS.LU is set, `Up -> Down` when it
//! clears. Every caller (tick, on-demand query, LSC interrupt) goes through
//! [`LinkManager::update`].
//!
//! # Reference
//! Intel I210 Datasheet, Section 8.2.2 (STATUS)

use log::info;

use super::mmio::RegisterAccess;
use super::regs::{self, Status};
use crate::types::{Duplex, LinkState, Speed};

/// Decode a raw STATUS value.
pub fn decode_status(status: u32) -> LinkState {
    let flags = Status::from_bits_truncate(status);
    if !flags.contains(Status::LU) {
        return LinkState::Down;
    }

    let speed = match (status & regs::STATUS_SPEED_MASK) >> regs::STATUS_SPEED_SHIFT {
        0b00 => Speed::Mbps10,
        0b01 => Speed::Mbps100,
        _ => Speed::Mbps1000,
    };
    let duplex = if flags.contains(Status::FD) {
        Duplex::Full
    } else {
        Duplex::Half
    };
    LinkState::Up(speed, duplex)
}

#[derive(Debug, Default)]
pub struct LinkManager {
    /// `None` until the first poll.
    state: Option<LinkState>,
}

impl LinkManager {
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Last observed state; Down while still unknown.
    pub fn state(&self) -> LinkState {
        self.state.unwrap_or(LinkState::Down)
    }

    pub fn is_known(&self) -> bool {
        self.state.is_some()
    }

    /// Sample STATUS and apply the transition.
    pub fn update<R: RegisterAccess>(&mut self, mmio: &R) -> LinkState {
        let next = decode_status(mmio.read32(regs::STATUS));
        if self.state != Some(next) {
            info!("i210: link {}", next);
            self.state = Some(next);
        }
        next
    }

    /// Forget the state (after a device reset).
    pub fn invalidate(&mut self) {
        self.state = None;
    }
}
