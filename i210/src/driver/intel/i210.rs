//! Intel I210 device controller.
//!
//! Owns the register window, both rings, the DMA pool backing them and the
//! RX backlog filled by interrupt servicing.
//!
//! # Lifecycle
//! ```text
//!   Unconfigured ──init()──> Resetting ──ok──> Ready ──stop()──> Stopped
//!        ▲                       │                │
//!        └────────error──────────┘<────reset()────┘
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::ptr::NonNull;

use log::{debug, trace, warn};

use dma_pool::{DmaPool, DmaRegion};

use super::init::{init_i210, mask_interrupts, reset_device, I210Config, IRQ_MASK};
use super::link::LinkManager;
use super::mmio::{RegisterAccess, RegisterMap};
use super::regs::{self, IntCause, Rctl, Tctl};
use super::rx::RxRing;
use super::tx::TxRing;
use super::{I210_DEVICE_IDS, INTEL_VENDOR_ID};
use crate::driver::traits::DriverInit;
use crate::error::{DeviceTimeout, InitError, NotReady, SendError};
use crate::types::{Capabilities, LinkState, MacAddress};

// ═══════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No rings; `init` required.
    Unconfigured,
    /// Reset / init in progress, interrupts masked.
    Resetting,
    /// Rings published, causes unmasked.
    Ready,
    /// Torn down by `stop`.
    Stopped,
}

struct Queues {
    rx: RxRing,
    tx: TxRing,
}

// ═══════════════════════════════════════════════════════════════════════════
// DRIVER
// ═══════════════════════════════════════════════════════════════════════════

/// Intel I210/I211 controller.
pub struct I210<R: RegisterAccess> {
    /// Register window.
    mmio: R,
    config: I210Config,
    /// Interrupt line reported by the integration layer.
    irq: u32,
    state: DeviceState,
    /// Station address, valid while Ready.
    mac: MacAddress,
    link: LinkManager,
    /// Present only while Ready.
    queues: Option<Queues>,
    /// Backing memory for rings and buffers.
    dma: DmaPool,
    /// Frames reclaimed outside `receive`, oldest first.
    backlog: VecDeque<Vec<u8>>,
}

impl<R: RegisterAccess> I210<R> {
    /// Reset and bring up the device.
    ///
    /// Nothing is returned on failure; the DMA pool is dropped with the
    /// half-built controller.
    pub fn new(mmio: R, dma: DmaPool, irq: u32, config: I210Config) -> Result<Self, InitError> {
        config.validate()?;
        let backlog = VecDeque::with_capacity(config.rx_backlog);
        let mut dev = Self {
            mmio,
            config,
            irq,
            state: DeviceState::Unconfigured,
            mac: MacAddress::default(),
            link: LinkManager::new(),
            queues: None,
            dma,
            backlog,
        };
        dev.init()?;
        Ok(dev)
    }

    /// (Re)initialize an Unconfigured controller.
    pub fn init(&mut self) -> Result<MacAddress, InitError> {
        if self.state == DeviceState::Ready {
            return Err(InitError::AlreadyInitialized);
        }

        self.state = DeviceState::Resetting;
        self.queues = None;
        self.backlog.clear();
        self.link.invalidate();
        // SAFETY: no rings exist, so no buffer from the old layout survives
        // and the device was (or is about to be) reset.
        unsafe { self.dma.reset() };

        match init_i210(&self.mmio, &mut self.dma, &self.config) {
            Ok(result) => {
                self.mac = result.mac;
                self.queues = Some(Queues {
                    rx: result.rx_ring,
                    tx: result.tx_ring,
                });
                self.state = DeviceState::Ready;
                self.link.update(&self.mmio);
                Ok(self.mac)
            }
            Err(err) => {
                mask_interrupts(&self.mmio);
                self.state = DeviceState::Unconfigured;
                Err(err)
            }
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Ready
    }

    /// Station address; `None` unless Ready.
    pub fn mac_address(&self) -> Option<MacAddress> {
        self.is_ready().then_some(self.mac)
    }

    /// Features the integration layer may rely on; `None` unless Ready.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.is_ready().then_some(Capabilities::I210)
    }

    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn config(&self) -> &I210Config {
        &self.config
    }

    pub fn regs(&self) -> &R {
        &self.mmio
    }

    fn ensure_ready(&self) -> Result<(), NotReady> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(NotReady)
        }
    }

    /// RCTL.EN | BAM | SECRC, 2 KB buffers.
    pub fn enable_rx(&mut self) -> Result<(), NotReady> {
        self.ensure_ready()?;
        self.mmio
            .set_bits(regs::RCTL, (Rctl::EN | Rctl::BAM | Rctl::SECRC).bits());
        debug!("i210: rx enabled");
        Ok(())
    }

    /// TCTL.EN | PSP with the default collision threshold and distance.
    pub fn enable_tx(&mut self) -> Result<(), NotReady> {
        self.ensure_ready()?;
        let fields = (0xFF << regs::TCTL_CT_SHIFT) | (0x3FF << regs::TCTL_COLD_SHIFT);
        let tctl = (self.mmio.read32(regs::TCTL) & !fields)
            | (Tctl::EN | Tctl::PSP).bits()
            | (regs::TCTL_CT_DEFAULT << regs::TCTL_CT_SHIFT)
            | (regs::TCTL_COLD_DEFAULT << regs::TCTL_COLD_SHIFT);
        self.mmio.write32(regs::TCTL, tctl);
        debug!("i210: tx enabled");
        Ok(())
    }

    /// Poll STATUS now.
    pub fn link_status(&mut self) -> LinkState {
        if self.state == DeviceState::Stopped {
            return LinkState::Down;
        }
        self.link.update(&self.mmio)
    }

    /// Global reset. The controller is Unconfigured afterwards, whatever
    /// the outcome; call `init` to bring it back.
    pub fn reset(&mut self) -> Result<(), DeviceTimeout> {
        self.state = DeviceState::Resetting;
        mask_interrupts(&self.mmio);
        self.mmio.clear_bits(regs::RCTL, Rctl::EN.bits());
        self.mmio.clear_bits(regs::TCTL, Tctl::EN.bits());

        let result = reset_device(&self.mmio, &self.config);
        self.teardown();
        self.state = DeviceState::Unconfigured;
        result
    }

    fn teardown(&mut self) {
        if let Some(mut q) = self.queues.take() {
            q.rx.reclaim_all();
            q.tx.reclaim_all();
        }
        self.backlog.clear();
        self.link.invalidate();
    }

    /// Queue one frame.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), SendError> {
        let q = self.queues.as_mut().ok_or(SendError::NotReady)?;
        q.tx.transmit(&self.mmio, frame)
    }

    /// Next received frame, backlog first. Never blocks.
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        if let Some(frame) = self.backlog.pop_front() {
            return Some(frame);
        }
        self.poll_rx()
    }

    /// Reclaim one good frame from the ring, skipping (and logging) bad
    /// descriptors.
    fn poll_rx(&mut self) -> Option<Vec<u8>> {
        let q = self.queues.as_mut()?;
        loop {
            match q.rx.try_reclaim_rx(&self.mmio) {
                Ok(Some((len, buf))) => {
                    let frame = buf.as_slice()[..len].to_vec();
                    q.rx.recycle(buf);
                    return Some(frame);
                }
                Ok(None) => return None,
                Err(err) => warn!("i210: rx dropped: {}", err),
            }
        }
    }

    /// Move every completed RX frame into the backlog.
    fn drain_rx(&mut self) -> usize {
        let mut moved = 0;
        while let Some(frame) = self.poll_rx() {
            if self.backlog.len() >= self.config.rx_backlog {
                warn!("i210: rx backlog full, dropping oldest frame");
                self.backlog.pop_front();
            }
            self.backlog.push_back(frame);
            moved += 1;
        }
        moved
    }

    /// Return finished TX buffers to the pool.
    pub fn reclaim_tx(&mut self) -> usize {
        match self.queues.as_mut() {
            Some(q) => q.tx.reclaim_tx_completed(),
            None => 0,
        }
    }

    /// Service the interrupt line: read ICR once, dispatch, re-arm IMS.
    ///
    /// Returns the causes that were pending.
    pub fn handle_interrupt(&mut self) -> IntCause {
        if !self.is_ready() {
            return IntCause::empty();
        }

        let icr = IntCause::from_bits_retain(self.mmio.read32(regs::ICR));
        trace!("i210: irq {} ICR {:#x}", self.irq, icr.bits());

        if icr.intersects(IntCause::RX_ANY) {
            if icr.contains(IntCause::RXO) {
                warn!("i210: receiver overrun");
            }
            self.drain_rx();
        }
        if icr.contains(IntCause::TXDW) {
            self.reclaim_tx();
        }
        if icr.contains(IntCause::LSC) {
            self.link.update(&self.mmio);
        }

        self.mmio.write32(regs::IMS, IRQ_MASK.bits());
        icr
    }

    /// Periodic housekeeping: link poll, TX reclaim, RX fallback poll.
    pub fn tick(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.link.update(&self.mmio);
        self.reclaim_tx();
        self.drain_rx();
    }

    /// Frames waiting in the backlog.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn tx_in_flight(&self) -> usize {
        self.queues.as_ref().map_or(0, |q| q.tx.in_flight())
    }

    pub fn can_transmit(&self) -> bool {
        self.queues.as_ref().map_or(false, |q| q.tx.can_transmit())
    }

    pub fn can_receive(&self) -> bool {
        !self.backlog.is_empty() || self.queues.as_ref().map_or(false, |q| q.rx.can_receive())
    }

    /// Mask interrupts, stop RX/TX, reset (best effort) and give back the
    /// DMA memory.
    pub fn stop(mut self) -> DmaPool {
        mask_interrupts(&self.mmio);
        self.mmio.clear_bits(regs::RCTL, Rctl::EN.bits());
        self.mmio.clear_bits(regs::TCTL, Tctl::EN.bits());
        if reset_device(&self.mmio, &self.config).is_err() {
            warn!("i210: reset during stop timed out");
        }
        self.teardown();
        self.state = DeviceState::Stopped;
        debug!("i210: stopped");
        self.dma
    }

    #[cfg(test)]
    pub(crate) fn rx_ring(&self) -> Option<&RxRing> {
        self.queues.as_ref().map(|q| &q.rx)
    }

    #[cfg(test)]
    pub(crate) fn rx_ring_mut(&mut self) -> Option<&mut RxRing> {
        self.queues.as_mut().map(|q| &mut q.rx)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DRIVER INIT IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

impl DriverInit for I210<RegisterMap> {
    type Error = InitError;
    type Config = I210Config;

    fn supported_vendors() -> &'static [u16] {
        &[INTEL_VENDOR_ID]
    }

    fn supported_devices() -> &'static [u16] {
        I210_DEVICE_IDS
    }

    unsafe fn create(
        mmio_base: NonNull<u8>,
        irq: u32,
        dma: DmaRegion,
        config: Self::Config,
    ) -> Result<Self, Self::Error> {
        let mmio = RegisterMap::new(mmio_base, regs::MMIO_SIZE);
        let pool = DmaPool::new(dma)?;
        Self::new(mmio, pool, irq, config)
    }
}

// Safety: I210 is Send when its register access is; DMA memory and buffers
// are uniquely owned by the controller.
unsafe impl<R: RegisterAccess + Send> Send for I210<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::intel::regs::Ctrl;
    use crate::sim::{HostDma, SimNic};
    use crate::types::{Duplex, Speed};

    fn config() -> I210Config {
        I210Config {
            rx_ring_size: 8,
            tx_ring_size: 8,
            reset_timeout_polls: 20,
            reset_poll_spins: 1,
            phy_timeout_polls: 10,
            queue_enable_polls: 10,
            rx_backlog: 4,
        }
    }

    fn controller<'a>(nic: &'a SimNic, mem: &HostDma) -> I210<&'a SimNic> {
        I210::new(nic, mem.pool(), 11, config()).unwrap()
    }

    #[test]
    fn test_init_reports_mock_mac() {
        let nic = SimNic::new();
        let mac = MacAddress([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        nic.set_mac(mac);
        let mem = HostDma::new(config().dma_bytes_required());
        let dev = controller(&nic, &mem);
        assert_eq!(dev.mac_address(), Some(mac));
        assert_eq!(dev.state(), DeviceState::Ready);
        assert_eq!(dev.irq(), 11);
    }

    #[test]
    fn test_capabilities_follow_readiness() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        let caps = dev.capabilities().unwrap();
        assert!(caps.contains(Capabilities::BROADCAST | Capabilities::TX_FCS));

        dev.enable_rx().unwrap();
        let rctl = Rctl::from_bits_retain(nic.reg(regs::RCTL));
        assert_eq!(caps.contains(Capabilities::BROADCAST), rctl.contains(Rctl::BAM));
        assert_eq!(caps.contains(Capabilities::RX_FCS_STRIP), rctl.contains(Rctl::SECRC));

        dev.reset().unwrap();
        assert_eq!(dev.capabilities(), None);
    }

    #[test]
    fn test_can_transmit_and_receive() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        assert!(dev.can_transmit());
        assert!(!dev.can_receive());

        for _ in 0..7 {
            dev.send(&[5; 60]).unwrap();
        }
        assert!(!dev.can_transmit());
        nic.complete_tx();
        dev.reclaim_tx();
        assert!(dev.can_transmit());

        nic.complete_rx(&[6; 60]);
        assert!(dev.can_receive());
        dev.tick();
        assert!(dev.can_receive());
        assert_eq!(dev.receive(), Some(alloc::vec![6; 60]));
        assert!(!dev.can_receive());
    }

    #[test]
    fn test_failed_init_constructs_nothing() {
        let nic = SimNic::new();
        nic.set_mac(MacAddress([0; 6]));
        let mem = HostDma::new(config().dma_bytes_required());
        let err = I210::new(&nic, mem.pool(), 11, config()).err();
        assert_eq!(err, Some(InitError::InvalidMac(MacAddress([0; 6]))));
        assert_eq!(nic.reg(regs::IMS), 0);
    }

    #[test]
    fn test_enable_rx_tx_bits() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        dev.enable_rx().unwrap();
        dev.enable_tx().unwrap();
        // Idempotent.
        dev.enable_rx().unwrap();
        dev.enable_tx().unwrap();

        let rctl = Rctl::from_bits_retain(nic.reg(regs::RCTL));
        assert!(rctl.contains(Rctl::EN | Rctl::BAM | Rctl::SECRC));
        assert_eq!(nic.reg(regs::RCTL) & (0b11 << 16), 0);

        let tctl = nic.reg(regs::TCTL);
        assert!(Tctl::from_bits_retain(tctl).contains(Tctl::EN | Tctl::PSP));
        assert_eq!((tctl >> regs::TCTL_CT_SHIFT) & 0xFF, 0x0F);
        assert_eq!((tctl >> regs::TCTL_COLD_SHIFT) & 0x3FF, 0x40);
    }

    #[test]
    fn test_single_rx_completion_yields_one_frame() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        dev.enable_rx().unwrap();

        let frame: Vec<u8> = (0..90u8).collect();
        assert!(nic.complete_rx(&frame));
        assert_eq!(dev.receive(), Some(frame));
        assert_eq!(dev.receive(), None);
    }

    #[test]
    fn test_link_up_then_down_on_tick() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);

        nic.set_link(Some((Speed::Mbps1000, Duplex::Full)));
        assert_eq!(dev.link_status(), LinkState::Up(Speed::Mbps1000, Duplex::Full));

        nic.set_link(None);
        dev.tick();
        assert_eq!(dev.link.state(), LinkState::Down);
    }

    #[test]
    fn test_interrupt_dispatch() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        dev.enable_rx().unwrap();
        dev.enable_tx().unwrap();

        dev.send(&[9; 64]).unwrap();
        nic.complete_tx();
        nic.complete_rx(&[7; 70]);
        nic.set_link(Some((Speed::Mbps100, Duplex::Half)));
        nic.raise(IntCause::LSC);

        let reads = nic.icr_reads();
        let causes = dev.handle_interrupt();
        assert!(causes.contains(IntCause::TXDW | IntCause::RXT0 | IntCause::LSC));
        assert_eq!(nic.icr_reads() - reads, 1);
        assert_eq!(nic.reg(regs::ICR), 0);
        assert_eq!(nic.reg(regs::IMS), IRQ_MASK.bits());
        assert_eq!(dev.tx_in_flight(), 0);
        assert_eq!(dev.backlog_len(), 1);
        assert_eq!(dev.link.state(), LinkState::Up(Speed::Mbps100, Duplex::Half));
        assert_eq!(dev.receive(), Some(alloc::vec![7; 70]));
        assert_eq!(nic.sent_frames(), alloc::vec![alloc::vec![9u8; 64]]);
    }

    #[test]
    fn test_backlog_drops_oldest_when_full() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);

        for i in 0..6u8 {
            nic.complete_rx(&[i; 60]);
        }
        dev.handle_interrupt();
        assert_eq!(dev.backlog_len(), 4);
        assert_eq!(dev.receive().unwrap()[0], 2);
    }

    #[test]
    fn test_rx_starvation_is_self_healing() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);

        // Drain the spare RX buffers so the next reclaim starves.
        let rx = dev.rx_ring_mut().unwrap();
        let mut held = Vec::new();
        while let Some(b) = rx.pool_mut().alloc() {
            held.push(b);
        }
        nic.complete_rx(&[1; 60]);
        assert_eq!(dev.receive(), None);
        assert!(dev.rx_ring().unwrap().is_armed(0));

        let rx = dev.rx_ring_mut().unwrap();
        for b in held {
            rx.recycle(b);
        }
        nic.complete_rx(&[2; 60]);
        assert_eq!(dev.receive(), Some(alloc::vec![2; 60]));
    }

    #[test]
    fn test_reset_leaves_unconfigured_and_reinit_works() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        dev.send(&[1; 60]).unwrap();

        dev.reset().unwrap();
        assert_eq!(dev.state(), DeviceState::Unconfigured);
        assert_eq!(dev.mac_address(), None);
        assert_eq!(dev.send(&[1; 60]), Err(SendError::NotReady));
        assert_eq!(dev.enable_rx(), Err(NotReady));

        assert_eq!(dev.init(), Ok(SimNic::DEFAULT_MAC));
        assert_eq!(dev.init(), Err(InitError::AlreadyInitialized));
        assert!(dev.send(&[1; 60]).is_ok());
    }

    #[test]
    fn test_reset_timeout() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        nic.set_reset_stuck(true);
        let before = nic.rst_polls();
        assert_eq!(dev.reset(), Err(DeviceTimeout));
        assert_eq!(nic.rst_polls() - before, 20);
        assert_eq!(dev.state(), DeviceState::Unconfigured);
    }

    #[test]
    fn test_stop_returns_dma_pool() {
        let nic = SimNic::new();
        let mem = HostDma::new(config().dma_bytes_required());
        let mut dev = controller(&nic, &mem);
        dev.enable_rx().unwrap();
        dev.enable_tx().unwrap();

        let pool = dev.stop();
        assert_eq!(pool.total_size(), config().dma_bytes_required());
        assert_eq!(nic.reg(regs::IMS), 0);
        assert_eq!(nic.reg(regs::RCTL) & Rctl::EN.bits(), 0);
        assert_eq!(nic.reg(regs::CTRL) & Ctrl::RST.bits(), 0);
    }
}
