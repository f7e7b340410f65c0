//! Intel I210 TX path.
//!
//! `next_to_use` is the next slot to fill (mirrors TDT), `next_to_clean` the
//! oldest outstanding slot. The ring is full when advancing `next_to_use`
//! would land on `next_to_clean`, so at most N-1 frames are ever in flight.

use log::trace;

use super::desc::{Descriptor, TxDesc};
use super::mmio::{rmb, RegisterAccess};
use super::ring::{DescRing, TX_QUEUE0};
use crate::dma::{BufferPool, DmaBuffer};
use crate::error::{InitError, SendError};
use crate::types::ETH_FRAME_MAX;
use dma_pool::DmaRegion;

/// Enqueue rejected because the ring is full; the buffer is handed back.
#[derive(Debug)]
pub struct RingFull(pub DmaBuffer);

/// TX descriptor ring.
pub struct TxRing {
    ring: DescRing<TxDesc>,
    /// Buffers for outbound frames.
    pool: BufferPool,
    /// Next slot to fill.
    next_to_use: usize,
    /// Oldest slot not yet reclaimed.
    next_to_clean: usize,
}

impl TxRing {
    pub fn new(table: DmaRegion, pool: BufferPool, capacity: usize) -> Self {
        Self {
            ring: DescRing::new(table, capacity, TX_QUEUE0),
            pool,
            next_to_use: 0,
            next_to_clean: 0,
        }
    }

    /// Program queue 0 and enable it. TDH = TDT = 0: nothing to send.
    pub fn program<R: RegisterAccess>(&self, mmio: &R, enable_polls: u32) -> Result<(), InitError> {
        self.ring.program(mmio);
        self.ring.enable_queue(mmio, enable_polls)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn in_flight(&self) -> usize {
        (self.next_to_use + self.capacity() - self.next_to_clean) & (self.capacity() - 1)
    }

    pub fn is_full(&self) -> bool {
        self.ring.next(self.next_to_use) == self.next_to_clean
    }

    /// Check if a frame can be queued right now.
    pub fn can_transmit(&self) -> bool {
        !self.is_full() && !self.pool.is_empty()
    }

    /// Publish `buf` holding a `len`-byte frame at the head slot and ring
    /// the doorbell.
    pub fn try_enqueue_tx<R: RegisterAccess>(
        &mut self,
        mmio: &R,
        buf: DmaBuffer,
        len: usize,
    ) -> Result<(), RingFull> {
        if self.is_full() {
            return Err(RingFull(buf));
        }

        let idx = self.next_to_use;
        let addr = buf.bus_addr();
        self.ring.publish(idx, buf, TxDesc::frame(addr, len as u16));
        self.next_to_use = self.ring.next(idx);
        self.ring.write_tail(mmio, self.next_to_use);
        trace!("i210: tx slot {} len {}", idx, len);
        Ok(())
    }

    /// Copy `frame` into a pool buffer and enqueue it.
    ///
    /// Never touches the ring when the frame is rejected.
    pub fn transmit<R: RegisterAccess>(&mut self, mmio: &R, frame: &[u8]) -> Result<(), SendError> {
        if frame.is_empty() {
            return Err(SendError::Empty);
        }
        if frame.len() > ETH_FRAME_MAX {
            return Err(SendError::TooLarge { len: frame.len() });
        }
        if self.is_full() {
            self.reclaim_tx_completed();
            if self.is_full() {
                return Err(SendError::RingFull);
            }
        }

        let mut buf = self.pool.alloc().ok_or(SendError::RingFull)?;
        buf.fill(frame);
        self.try_enqueue_tx(mmio, buf, frame.len()).map_err(|RingFull(buf)| {
            self.pool.free(buf);
            SendError::RingFull
        })
    }

    /// Return every buffer the device has finished with, oldest first.
    ///
    /// Returns the number of slots reclaimed.
    pub fn reclaim_tx_completed(&mut self) -> usize {
        let mut reclaimed = 0;

        while self.next_to_clean != self.next_to_use {
            let idx = self.next_to_clean;
            let desc = self.ring.read(idx);
            if !desc.is_done() {
                break;
            }
            rmb();

            self.ring.write(idx, TxDesc::default());
            if let Some(buf) = self.ring.take(idx) {
                self.pool.free(buf);
            }
            self.next_to_clean = self.ring.next(idx);
            reclaimed += 1;
        }

        reclaimed
    }

    /// Pull every buffer back after the device has been reset.
    pub fn reclaim_all(&mut self) {
        let bufs: alloc::vec::Vec<_> = self.ring.drain().collect();
        for buf in bufs {
            self.pool.free(buf);
        }
        self.next_to_use = 0;
        self.next_to_clean = 0;
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn next_to_use(&self) -> usize {
        self.next_to_use
    }

    pub fn next_to_clean(&self) -> usize {
        self.next_to_clean
    }
}
