//! Driver facade: the operations the OS integration layer calls.
//!
//! The single controller instance lives behind a spin lock. Interrupts are
//! never allowed to spin on that lock: `handle_interrupt` only try-locks, and
//! if the instance is busy it records a pending interrupt that the current
//! holder services before it lets go.
//!
//! # Usage
//!
//! ```ignore
//! // PCI probe matched 8086:1533, BAR0 mapped, DMA memory reserved.
//! let mac = unsafe { i210_driver::facade::init(bar0, irq, dma_region)? };
//! i210_driver::facade::enable_rx()?;
//! i210_driver::facade::enable_tx()?;
//!
//! // Network task loop:
//! i210_driver::facade::send(&frame)?;
//! while let Some(frame) = i210_driver::facade::receive() { /* ... */ }
//! i210_driver::facade::tick();            // 10 Hz
//! i210_driver::facade::handle_interrupt(); // on IRQ notification
//! ```

use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use dma_pool::{DmaPool, DmaRegion};

use crate::driver::intel::mmio::{RegisterAccess, RegisterMap};
use crate::driver::intel::{I210Config, I210};
use crate::driver::traits::DriverInit;
use crate::error::{InitError, NotReady, ResetError, SendError};
use crate::types::{Capabilities, LinkState, MacAddress};

/// Lock-protected owner of at most one controller.
pub struct Facade<R: RegisterAccess> {
    device: Mutex<Option<I210<R>>>,
    /// Interrupt arrived while the device lock was held.
    irq_pending: AtomicBool,
}

impl<R: RegisterAccess> Facade<R> {
    pub const fn new() -> Self {
        Self {
            device: Mutex::new(None),
            irq_pending: AtomicBool::new(false),
        }
    }

    /// Run `f` on the controller, then service any interrupt that was
    /// deferred while it ran.
    pub fn with<T>(&self, f: impl FnOnce(&mut I210<R>) -> T) -> Option<T> {
        let out = {
            let mut guard = self.device.lock();
            let out = guard.as_mut().map(f);
            Self::service_pending(&self.irq_pending, &mut guard);
            out
        };
        self.drain_pending();
        out
    }

    fn service_pending(pending: &AtomicBool, device: &mut Option<I210<R>>) {
        while pending.swap(false, Ordering::AcqRel) {
            if let Some(dev) = device.as_mut() {
                dev.handle_interrupt();
            }
        }
    }

    /// Catch an interrupt that landed between the holder's last check and
    /// its unlock.
    fn drain_pending(&self) {
        while self.irq_pending.load(Ordering::Acquire) {
            match self.device.try_lock() {
                Some(mut guard) => Self::service_pending(&self.irq_pending, &mut guard),
                None => break,
            }
        }
    }

    /// Install a controller built by `build`, or re-initialize an existing
    /// Unconfigured one.
    pub fn init(
        &self,
        build: impl FnOnce() -> Result<I210<R>, InitError>,
    ) -> Result<MacAddress, InitError> {
        let result = {
            let mut guard = self.device.lock();
            if let Some(dev) = guard.as_mut() {
                if dev.is_ready() {
                    Err(InitError::AlreadyInitialized)
                } else {
                    dev.init()
                }
            } else {
                let dev = build()?;
                let mac = dev.mac_address().unwrap_or_default();
                *guard = Some(dev);
                Ok(mac)
            }
        };
        self.drain_pending();
        result
    }

    pub fn is_initialized(&self) -> bool {
        self.with(|dev| dev.is_ready()).unwrap_or(false)
    }

    pub fn mac_address(&self) -> Option<MacAddress> {
        self.with(|dev| dev.mac_address()).flatten()
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.with(|dev| dev.capabilities()).flatten()
    }

    pub fn enable_rx(&self) -> Result<(), NotReady> {
        self.with(|dev| dev.enable_rx()).unwrap_or(Err(NotReady))
    }

    pub fn enable_tx(&self) -> Result<(), NotReady> {
        self.with(|dev| dev.enable_tx()).unwrap_or(Err(NotReady))
    }

    pub fn link_status(&self) -> LinkState {
        self.with(|dev| dev.link_status()).unwrap_or(LinkState::Down)
    }

    /// Reset the device. Re-run `init` afterwards.
    pub fn reset(&self) -> Result<(), ResetError> {
        match self.with(|dev| dev.reset()) {
            Some(result) => Ok(result?),
            None => Err(ResetError::NotReady),
        }
    }

    pub fn send(&self, frame: &[u8]) -> Result<(), SendError> {
        self.with(|dev| dev.send(frame)).unwrap_or(Err(SendError::NotReady))
    }

    pub fn receive(&self) -> Option<Vec<u8>> {
        self.with(|dev| dev.receive()).flatten()
    }

    /// IRQ notification entry point; never blocks.
    pub fn handle_interrupt(&self) {
        self.irq_pending.store(true, Ordering::Release);
        self.drain_pending();
    }

    pub fn tick(&self) {
        self.with(|dev| dev.tick());
    }

    /// Tear the controller down and hand back its DMA memory.
    pub fn stop(&self) -> Option<DmaPool> {
        let dev = self.device.lock().take()?;
        self.irq_pending.store(false, Ordering::Release);
        Some(dev.stop())
    }
}

impl<R: RegisterAccess> Default for Facade<R> {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROCESS-WIDE INSTANCE
// ═══════════════════════════════════════════════════════════════════════════

static DRIVER: Facade<RegisterMap> = Facade::new();

/// Bring up the process-wide controller with the default configuration.
///
/// # Safety
/// - `register_base` must be the device's mapped BAR0 (128 KB, uncached)
/// - `dma` must satisfy the contract of `DmaRegion::new`
pub unsafe fn init(
    register_base: NonNull<u8>,
    irq: u32,
    dma: DmaRegion,
) -> Result<MacAddress, InitError> {
    init_with_config(register_base, irq, dma, I210Config::default())
}

/// [`init`] with an explicit configuration.
///
/// # Safety
/// Same as [`init`].
pub unsafe fn init_with_config(
    register_base: NonNull<u8>,
    irq: u32,
    dma: DmaRegion,
    config: I210Config,
) -> Result<MacAddress, InitError> {
    DRIVER.init(|| I210::create(register_base, irq, dma, config))
}

/// PCI ID filter for the integration layer's probe.
pub fn supports_device(vendor: u16, device: u16) -> bool {
    I210::<RegisterMap>::supports_device(vendor, device)
}

pub fn get_mac_address() -> Option<MacAddress> {
    DRIVER.mac_address()
}

/// Features of the running device; `None` before `init`.
pub fn get_capabilities() -> Option<Capabilities> {
    DRIVER.capabilities()
}

pub fn enable_rx() -> Result<(), NotReady> {
    DRIVER.enable_rx()
}

pub fn enable_tx() -> Result<(), NotReady> {
    DRIVER.enable_tx()
}

pub fn get_link_status() -> LinkState {
    DRIVER.link_status()
}

pub fn reset() -> Result<(), ResetError> {
    DRIVER.reset()
}

pub fn send(frame: &[u8]) -> Result<(), SendError> {
    DRIVER.send(frame)
}

pub fn receive() -> Option<Vec<u8>> {
    DRIVER.receive()
}

pub fn handle_interrupt() {
    DRIVER.handle_interrupt()
}

pub fn tick() {
    DRIVER.tick()
}

pub fn stop() -> Option<DmaPool> {
    DRIVER.stop()
}
