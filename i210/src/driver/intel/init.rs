//! Intel I210 initialization sequence.
//!
//! # Initialization Sequence
//! 1. Mask all interrupts
//! 2. Global reset (CTRL.RST), bounded poll for self-clear
//! 3. Mask again and clear ICR (reset re-arms causes)
//! 4. Link bring-up: CTRL.SLU | CTRL.ASDE, release LRST / PHY_RST
//! 5. Wake PHY from power down / isolate
//! 6. Read MAC from RAL0/RAH0, assert RAH0.AV
//! 7. Clear multicast table
//! 8. Carve DMA memory; setup RX descriptor ring, wait for RXDCTL.ENABLE
//! 9. Setup TX descriptor ring, wait for TXDCTL.ENABLE
//! 10. Unmask RX/TX/link interrupts
//!
//! RX and TX stay disabled until `enable_rx` / `enable_tx`.
//!
//! # Reference
//! Intel I210 Datasheet, Section 4.5 (Software Initialization Sequence)

use alloc::vec::Vec;
use core::mem::size_of;

use log::{debug, error, info};

use dma_pool::{bytes_to_pages, pages_to_bytes, DmaError, DmaPool, DmaRegion};

use super::desc::DESC_SIZE;
use super::mmio::RegisterAccess;
use super::phy::wake_phy;
use super::regs::{self, Ctrl, IntCause};
use super::rx::RxRing;
use super::tx::TxRing;
use crate::alloc_heap::HEAP_SIZE;
use crate::dma::{BufferPool, DmaBuffer, BUFFER_SIZE};
use crate::error::{DeviceTimeout, InitError};
use crate::types::{MacAddress, ETH_FRAME_MAX};

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════

/// Smallest accepted ring.
pub const MIN_RING_SIZE: usize = 8;
/// Largest accepted ring (RDLEN/TDLEN limit for legacy descriptors).
pub const MAX_RING_SIZE: usize = 4096;

/// Interrupt causes unmasked once the device is Ready.
pub const IRQ_MASK: IntCause = IntCause::RXT0
    .union(IntCause::RXO)
    .union(IntCause::TXDW)
    .union(IntCause::LSC);

/// I210 driver configuration.
#[derive(Debug, Clone)]
pub struct I210Config {
    /// Number of RX descriptors.
    pub rx_ring_size: usize,
    /// Number of TX descriptors.
    pub tx_ring_size: usize,
    /// CTRL reads while waiting for RST to self-clear.
    pub reset_timeout_polls: u32,
    /// Spin iterations between two CTRL reads.
    pub reset_poll_spins: u32,
    /// MDIC reads while waiting for READY.
    pub phy_timeout_polls: u32,
    /// RXDCTL/TXDCTL reads while waiting for ENABLE to latch.
    pub queue_enable_polls: u32,
    /// Frames held between interrupt servicing and `receive`.
    pub rx_backlog: usize,
}

impl Default for I210Config {
    fn default() -> Self {
        Self {
            rx_ring_size: 256,
            tx_ring_size: 256,
            reset_timeout_polls: 10_000,
            reset_poll_spins: 1_000,
            phy_timeout_polls: 10_000,
            queue_enable_polls: 10_000,
            rx_backlog: 64,
        }
    }
}

impl I210Config {
    /// Create configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), InitError> {
        let ok = |n: usize| n.is_power_of_two() && (MIN_RING_SIZE..=MAX_RING_SIZE).contains(&n);
        if !ok(self.rx_ring_size) {
            return Err(InitError::InvalidConfig("rx_ring_size must be a power of two in 8..=4096"));
        }
        if !ok(self.tx_ring_size) {
            return Err(InitError::InvalidConfig("tx_ring_size must be a power of two in 8..=4096"));
        }
        if self.reset_timeout_polls == 0 {
            return Err(InitError::InvalidConfig("reset_timeout_polls must be non-zero"));
        }
        if self.heap_bytes_required() > HEAP_SIZE {
            return Err(InitError::InvalidConfig(
                "rings and rx_backlog exceed the driver heap",
            ));
        }
        Ok(())
    }

    /// RX buffers: one per slot plus as many spares for frames being
    /// copied out.
    pub fn rx_pool_buffers(&self) -> usize {
        self.rx_ring_size * 2
    }

    pub fn tx_pool_buffers(&self) -> usize {
        self.tx_ring_size
    }

    /// Heap bytes the controller holds at peak: buffer free lists, slot
    /// tables, the RX backlog (plus the frame being handed out) and the
    /// list built while draining a ring on teardown.
    pub fn heap_bytes_required(&self) -> usize {
        let buf = size_of::<DmaBuffer>();
        let slot = size_of::<Option<DmaBuffer>>();
        let rx = self.rx_pool_buffers() * buf + self.rx_ring_size * slot;
        let tx = self.tx_pool_buffers() * buf + self.tx_ring_size * slot;
        let teardown = self.rx_ring_size.max(self.tx_ring_size) * buf;
        let backlog =
            self.rx_backlog * size_of::<Vec<u8>>() + (self.rx_backlog + 1) * ETH_FRAME_MAX;
        rx + tx + teardown + backlog
    }

    /// DMA bytes `init` carves out of the pool.
    pub fn dma_bytes_required(&self) -> usize {
        let pages = bytes_to_pages(self.rx_ring_size * DESC_SIZE)
            + bytes_to_pages(self.tx_ring_size * DESC_SIZE)
            + bytes_to_pages(self.rx_pool_buffers() * BUFFER_SIZE)
            + bytes_to_pages(self.tx_pool_buffers() * BUFFER_SIZE);
        pages_to_bytes(pages)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// INITIALIZATION RESULT
// ═══════════════════════════════════════════════════════════════════════════

/// Result of successful initialization.
pub struct I210InitResult {
    pub mac: MacAddress,
    pub rx_ring: RxRing,
    pub tx_ring: TxRing,
}

// ═══════════════════════════════════════════════════════════════════════════
// RESET
// ═══════════════════════════════════════════════════════════════════════════

/// Mask every interrupt cause.
pub fn mask_interrupts<R: RegisterAccess>(mmio: &R) {
    mmio.write32(regs::IMC, u32::MAX);
}

/// Global device reset.
///
/// Sets CTRL.RST and reads CTRL at most `reset_timeout_polls` times, spinning
/// `reset_poll_spins` between reads, until the bit self-clears. Interrupts
/// are masked on both sides and ICR is cleared afterwards.
pub fn reset_device<R: RegisterAccess>(mmio: &R, config: &I210Config) -> Result<(), DeviceTimeout> {
    debug!("i210: global reset");
    mask_interrupts(mmio);
    mmio.set_bits(regs::CTRL, Ctrl::RST.bits());

    for _ in 0..config.reset_timeout_polls {
        for _ in 0..config.reset_poll_spins {
            core::hint::spin_loop();
        }
        if mmio.read32(regs::CTRL) & Ctrl::RST.bits() == 0 {
            mask_interrupts(mmio);
            let _ = mmio.read32(regs::ICR);
            debug!("i210: reset complete");
            return Ok(());
        }
    }

    error!(
        "i210: reset timed out after {} polls",
        config.reset_timeout_polls
    );
    Err(DeviceTimeout)
}

// ═══════════════════════════════════════════════════════════════════════════
// DMA CARVING
// ═══════════════════════════════════════════════════════════════════════════

struct RingMemory {
    rx_table: DmaRegion,
    rx_bufs: DmaRegion,
    tx_table: DmaRegion,
    tx_bufs: DmaRegion,
}

impl RingMemory {
    fn regions(&self) -> [DmaRegion; 4] {
        [self.rx_table, self.rx_bufs, self.tx_table, self.tx_bufs]
    }
}

/// Give carved regions back to the pool, newest first.
///
/// # Safety
/// The device must not be accessing any of `regions`.
unsafe fn release(dma: &mut DmaPool, regions: &[DmaRegion]) {
    for region in regions.iter().rev() {
        dma.dealloc_pages(region);
    }
}

/// Carve descriptor tables and buffer pools. All or nothing: on failure the
/// pool is left as it was.
fn carve(dma: &mut DmaPool, config: &I210Config) -> Result<RingMemory, DmaError> {
    // SAFETY (release): nothing carved here has been shown to the device.
    let rx_table = dma.alloc_bytes(config.rx_ring_size * DESC_SIZE)?;
    let rx_bufs = dma
        .alloc_bytes(config.rx_pool_buffers() * BUFFER_SIZE)
        .map_err(|e| {
            unsafe { release(dma, &[rx_table]) };
            e
        })?;
    let tx_table = dma
        .alloc_bytes(config.tx_ring_size * DESC_SIZE)
        .map_err(|e| {
            unsafe { release(dma, &[rx_table, rx_bufs]) };
            e
        })?;
    let tx_bufs = dma
        .alloc_bytes(config.tx_pool_buffers() * BUFFER_SIZE)
        .map_err(|e| {
            unsafe { release(dma, &[rx_table, rx_bufs, tx_table]) };
            e
        })?;
    Ok(RingMemory {
        rx_table,
        rx_bufs,
        tx_table,
        tx_bufs,
    })
}

fn build_rings<R: RegisterAccess>(
    mmio: &R,
    mem: &RingMemory,
    config: &I210Config,
) -> Result<(RxRing, TxRing), InitError> {
    let rx_pool = BufferPool::new(mem.rx_bufs, BUFFER_SIZE, config.rx_pool_buffers());
    let rx_ring = RxRing::new(mem.rx_table, rx_pool, config.rx_ring_size)?;
    rx_ring.program(mmio, BUFFER_SIZE, config.queue_enable_polls)?;

    let tx_pool = BufferPool::new(mem.tx_bufs, BUFFER_SIZE, config.tx_pool_buffers());
    let tx_ring = TxRing::new(mem.tx_table, tx_pool, config.tx_ring_size);
    tx_ring.program(mmio, config.queue_enable_polls)?;

    Ok((rx_ring, tx_ring))
}

// ═══════════════════════════════════════════════════════════════════════════
// INITIALIZATION
// ═══════════════════════════════════════════════════════════════════════════

/// Read and validate the station address, then mark RAH0 valid.
pub fn read_mac<R: RegisterAccess>(mmio: &R) -> Result<MacAddress, InitError> {
    let ral = mmio.read32(regs::RAL0);
    let rah = mmio.read32(regs::RAH0);
    let mac = MacAddress::from_ral_rah(ral, rah);
    if !mac.is_valid() {
        error!("i210: invalid MAC address {}", mac);
        return Err(InitError::InvalidMac(mac));
    }
    mmio.write32(regs::RAH0, rah | regs::RAH_AV);
    Ok(mac)
}

fn clear_mta<R: RegisterAccess>(mmio: &R) {
    for i in 0..regs::MTA_ENTRIES {
        mmio.write32(regs::MTA + i * 4, 0);
    }
}

fn link_bring_up<R: RegisterAccess>(mmio: &R) {
    let ctrl = Ctrl::from_bits_retain(mmio.read32(regs::CTRL));
    let ctrl = (ctrl | Ctrl::SLU | Ctrl::ASDE) - (Ctrl::LRST | Ctrl::PHY_RST);
    mmio.write32(regs::CTRL, ctrl.bits());
}

/// Initialize the I210 device.
///
/// On error the device is left reset with interrupts masked, and every DMA
/// allocation made by this call is handed back to `dma`.
pub fn init_i210<R: RegisterAccess>(
    mmio: &R,
    dma: &mut DmaPool,
    config: &I210Config,
) -> Result<I210InitResult, InitError> {
    config.validate()?;

    // ═══════════════════════════════════════════════════════════════════
    // STEP 1-3: MASK, RESET, MASK + CLEAR
    // ═══════════════════════════════════════════════════════════════════
    mask_interrupts(mmio);
    reset_device(mmio, config)?;

    // ═══════════════════════════════════════════════════════════════════
    // STEP 4-5: LINK + PHY
    // ═══════════════════════════════════════════════════════════════════
    link_bring_up(mmio);
    wake_phy(mmio, config.phy_timeout_polls);

    // ═══════════════════════════════════════════════════════════════════
    // STEP 6-7: ADDRESS FILTERS
    // ═══════════════════════════════════════════════════════════════════
    let mac = read_mac(mmio)?;
    clear_mta(mmio);

    // ═══════════════════════════════════════════════════════════════════
    // STEP 8-9: RX + TX RINGS
    // ═══════════════════════════════════════════════════════════════════
    let mem = carve(dma, config)?;
    let (rx_ring, tx_ring) = match build_rings(mmio, &mem, config) {
        Ok(rings) => rings,
        Err(err) => {
            mmio.write32(regs::RXDCTL, 0);
            mmio.write32(regs::TXDCTL, 0);
            // SAFETY: RCTL.EN / TCTL.EN are clear and both queues are
            // disabled, so the device holds no reference into `mem`.
            unsafe { release(dma, &mem.regions()) };
            return Err(err);
        }
    };

    // ═══════════════════════════════════════════════════════════════════
    // STEP 10: UNMASK
    // ═══════════════════════════════════════════════════════════════════
    mmio.write32(regs::IMS, IRQ_MASK.bits());

    info!(
        "i210: MAC {} rx ring {} @ {:#x}, tx ring {} @ {:#x}",
        mac,
        config.rx_ring_size,
        mem.rx_table.bus_addr(),
        config.tx_ring_size,
        mem.tx_table.bus_addr()
    );
    debug!(
        "i210: {} DMA allocations, {} bytes spare",
        dma.live_allocations(),
        dma.free_space()
    );

    Ok(I210InitResult {
        mac,
        rx_ring,
        tx_ring,
    })
}
