//! Intel I210 RX path.
//!
//! Every slot is armed with a pool buffer at init. RDT starts at N-1, so
//! the device owns N-1 slots and one armed slot sits behind the tail.
//! Reclaiming slot `i` re-arms it immediately and moves RDT to `i`, which
//! keeps exactly N-1 slots in flight at all times.
//!
//! # Reference
//! Intel I210 Datasheet, Section 7.1 (Receive Functionality)

use log::{trace, warn};

use super::desc::{RxDesc, RxStatus};
use super::mmio::{rmb, RegisterAccess};
use super::regs;
use super::ring::{DescRing, RX_QUEUE0};
use crate::dma::{BufferPool, DmaBuffer};
use crate::error::{InitError, RxError};
use dma_pool::{DmaError, DmaRegion};

/// RX descriptor ring.
pub struct RxRing {
    ring: DescRing<RxDesc>,
    /// Buffers for arming and re-arming.
    pool: BufferPool,
    /// Next descriptor to check for a received packet.
    next_to_clean: usize,
    /// Last tail value written to hardware.
    tail: usize,
}

impl RxRing {
    /// Build the ring over `table` and arm every slot from `pool`.
    pub fn new(
        table: DmaRegion,
        mut pool: BufferPool,
        capacity: usize,
    ) -> Result<Self, InitError> {
        let mut ring = DescRing::new(table, capacity, RX_QUEUE0);

        for i in 0..capacity {
            let buf = pool.alloc().ok_or(InitError::Dma(DmaError::OutOfMemory))?;
            let addr = buf.bus_addr();
            ring.publish(i, buf, RxDesc::armed(addr));
        }

        Ok(Self {
            ring,
            pool,
            next_to_clean: 0,
            tail: capacity - 1,
        })
    }

    /// Program queue 0 and hand N-1 armed descriptors to the device.
    ///
    /// RDT is written only once RXDCTL.ENABLE reads back set.
    pub fn program<R: RegisterAccess>(
        &self,
        mmio: &R,
        buffer_size: usize,
        enable_polls: u32,
    ) -> Result<(), InitError> {
        self.ring.program(mmio);
        let bsize_kb = (buffer_size / 1024) as u32;
        mmio.write32(
            regs::SRRCTL,
            (bsize_kb << regs::SRRCTL_BSIZEPKT_SHIFT)
                | regs::SRRCTL_DESCTYPE_LEGACY
                | regs::SRRCTL_DROP_EN,
        );
        self.ring.enable_queue(mmio, enable_polls)?;
        self.ring.write_tail(mmio, self.tail);
        Ok(())
    }

    /// Reclaim the oldest completed descriptor, if any.
    ///
    /// On success the slot is re-armed with a fresh buffer and the completed
    /// buffer is returned with its frame length; give it back with
    /// [`RxRing::recycle`]. Errors consume the descriptor but re-arm the slot
    /// with its own buffer.
    pub fn try_reclaim_rx<R: RegisterAccess>(
        &mut self,
        mmio: &R,
    ) -> Result<Option<(usize, DmaBuffer)>, RxError> {
        let idx = self.next_to_clean;
        let desc = self.ring.read(idx);

        if !desc.status().contains(RxStatus::DD) {
            return Ok(None);
        }

        // DD observed; the rest of the descriptor and the buffer are stable.
        rmb();

        let done = match self.ring.take(idx) {
            Some(buf) => buf,
            None => panic!("BUG: completed RX slot {} has no buffer", idx),
        };

        let errors = desc.frame_errors();
        let outcome = if !errors.is_empty() {
            Err(RxError::PacketError(errors.bits()))
        } else if !desc.status().contains(RxStatus::EOP) {
            Err(RxError::Fragmented)
        } else {
            match self.pool.alloc() {
                Some(fresh) => Ok(fresh),
                None => Err(RxError::ResourceExhausted),
            }
        };

        let result = match outcome {
            Ok(fresh) => {
                self.arm(mmio, idx, fresh);
                let len = (desc.length as usize).min(done.capacity());
                trace!("i210: rx slot {} len {}", idx, len);
                Ok(Some((len, done)))
            }
            Err(err) => {
                if err == RxError::ResourceExhausted {
                    warn!("i210: rx pool empty, dropping frame in slot {}", idx);
                }
                self.arm(mmio, idx, done);
                Err(err)
            }
        };

        self.next_to_clean = self.ring.next(idx);
        result
    }

    /// Return a buffer obtained from [`RxRing::try_reclaim_rx`].
    pub fn recycle(&mut self, buf: DmaBuffer) {
        self.pool.free(buf);
    }

    fn arm<R: RegisterAccess>(&mut self, mmio: &R, idx: usize, buf: DmaBuffer) {
        let addr = buf.bus_addr();
        self.ring.publish(idx, buf, RxDesc::armed(addr));
        self.tail = idx;
        self.ring.write_tail(mmio, idx);
    }

    /// Next slot to be inspected.
    pub fn next_to_clean(&self) -> usize {
        self.next_to_clean
    }

    /// Last RDT value written.
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Slots owned by the device (those between the next slot to clean and
    /// the tail).
    pub fn in_flight(&self) -> usize {
        (self.tail + self.capacity() - self.next_to_clean) & (self.capacity() - 1)
    }

    /// Descriptor at `next_to_clean` has DD set.
    pub fn can_receive(&self) -> bool {
        self.ring.read(self.next_to_clean).status().contains(RxStatus::DD)
    }

    pub fn is_armed(&self, index: usize) -> bool {
        self.ring.is_armed(index)
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub(crate) fn pool_mut(&mut self) -> &mut BufferPool {
        &mut self.pool
    }

    /// Pull every buffer back after the device has been reset.
    pub fn reclaim_all(&mut self) {
        let bufs: alloc::vec::Vec<_> = self.ring.drain().collect();
        for buf in bufs {
            self.pool.free(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::BUFFER_SIZE;
    use crate::sim::{HostDma, SimNic};

    struct Fixture {
        nic: SimNic,
        rx: RxRing,
        _table: HostDma,
        _bufs: HostDma,
    }

    fn fixture(capacity: usize, pool_buffers: usize) -> Fixture {
        let table = HostDma::new(4096);
        let bufs = HostDma::new(pool_buffers * BUFFER_SIZE);
        let pool = BufferPool::new(bufs.region(), BUFFER_SIZE, pool_buffers);
        let rx = RxRing::new(table.region(), pool, capacity).unwrap();
        let nic = SimNic::new();
        rx.program(&nic, BUFFER_SIZE, 4).unwrap();
        Fixture { nic, rx, _table: table, _bufs: bufs }
    }

    #[test]
    fn test_init_arms_every_slot() {
        let f = fixture(8, 16);
        for i in 0..8 {
            assert!(f.rx.is_armed(i), "slot {} not armed", i);
        }
        assert_eq!(f.nic.reg(regs::RDT), 7);
        assert_eq!(f.nic.reg(regs::RDLEN), 128);
        assert_eq!(f.rx.in_flight(), 7);
        assert_eq!(f.rx.pool().available(), 8);
    }

    #[test]
    fn test_srrctl_legacy_2k() {
        let f = fixture(8, 16);
        let srrctl = f.nic.reg(regs::SRRCTL);
        assert_eq!(srrctl & 0x7F, 2);
        assert_eq!(srrctl & (0b111 << 25), 0);
        assert_ne!(f.nic.reg(regs::RXDCTL) & regs::QUEUE_ENABLE, 0);
    }

    #[test]
    fn test_pool_too_small_is_out_of_memory() {
        let table = HostDma::new(4096);
        let bufs = HostDma::new(4 * BUFFER_SIZE);
        let pool = BufferPool::new(bufs.region(), BUFFER_SIZE, 4);
        let err = RxRing::new(table.region(), pool, 8).err();
        assert_eq!(err, Some(InitError::Dma(DmaError::OutOfMemory)));
    }

    #[test]
    fn test_nothing_pending() {
        let mut f = fixture(8, 16);
        assert!(f.rx.try_reclaim_rx(&f.nic).unwrap().is_none());
        assert!(!f.rx.can_receive());
    }

    #[test]
    fn test_reclaim_rearms_and_moves_tail() {
        let mut f = fixture(8, 16);
        f.nic.complete_rx(&[0xAB; 60]);

        let (len, buf) = f.rx.try_reclaim_rx(&f.nic).unwrap().unwrap();
        assert_eq!(len, 60);
        assert_eq!(&buf.as_slice()[..60], &[0xAB; 60][..]);
        assert!(f.rx.is_armed(0));
        assert_eq!(f.nic.reg(regs::RDT), 0);
        assert_eq!(f.rx.next_to_clean(), 1);
        assert_eq!(f.rx.in_flight(), 7);

        f.rx.recycle(buf);
        assert_eq!(f.rx.pool().available(), 8);
    }

    #[test]
    fn test_every_slot_armed_after_wraparound() {
        let mut f = fixture(8, 16);
        for round in 0..20u8 {
            f.nic.complete_rx(&[round; 64]);
            let (len, buf) = f.rx.try_reclaim_rx(&f.nic).unwrap().unwrap();
            assert_eq!(len, 64);
            assert_eq!(buf.as_slice()[0], round);
            f.rx.recycle(buf);

            for i in 0..8 {
                assert!(f.rx.is_armed(i));
            }
            assert_eq!(f.rx.in_flight(), 7);
        }
    }

    #[test]
    fn test_starvation_rearms_with_completed_buffer() {
        let mut f = fixture(8, 8);
        assert_eq!(f.rx.pool().available(), 0);

        let addr_before = f.rx.ring.slot(0).unwrap().bus_addr();
        f.nic.complete_rx(&[1; 60]);
        assert_eq!(f.rx.try_reclaim_rx(&f.nic).err(), Some(RxError::ResourceExhausted));

        // Same buffer back in the slot, ring advanced, nothing half-armed.
        assert!(f.rx.is_armed(0));
        assert_eq!(f.rx.ring.slot(0).unwrap().bus_addr(), addr_before);
        assert_eq!(f.rx.next_to_clean(), 1);
        assert_eq!(f.nic.reg(regs::RDT), 0);
    }

    #[test]
    fn test_packet_error_is_reported_and_slot_recycled() {
        let mut f = fixture(8, 16);
        f.nic.complete_rx_with(&[2; 60], RxStatus::DD | RxStatus::EOP, 0x01);

        assert_eq!(f.rx.try_reclaim_rx(&f.nic).err(), Some(RxError::PacketError(0x01)));
        assert!(f.rx.is_armed(0));
        assert_eq!(f.rx.pool().available(), 8);
    }

    #[test]
    fn test_missing_eop_is_fragmented() {
        let mut f = fixture(8, 16);
        f.nic.complete_rx_with(&[3; 60], RxStatus::DD, 0);
        assert_eq!(f.rx.try_reclaim_rx(&f.nic).err(), Some(RxError::Fragmented));
        assert!(f.rx.is_armed(0));
    }

    #[test]
    fn test_reclaim_all_returns_buffers() {
        let mut f = fixture(8, 16);
        f.rx.reclaim_all();
        assert_eq!(f.rx.pool().available(), 16);
        assert!(!f.rx.is_armed(0));
    }
}
