//! Driver trait definitions.

use core::ptr::NonNull;

use dma_pool::DmaRegion;

/// Driver initialization trait.
pub trait DriverInit: Sized {
    /// Error type for initialization failures.
    type Error: core::fmt::Debug;

    /// Configuration type.
    type Config;

    /// PCI vendor IDs this driver supports.
    fn supported_vendors() -> &'static [u16];

    /// PCI device IDs this driver supports.
    fn supported_devices() -> &'static [u16];

    /// Check if driver supports a PCI device.
    fn supports_device(vendor: u16, device: u16) -> bool {
        Self::supported_vendors().contains(&vendor) && Self::supported_devices().contains(&device)
    }

    /// Create driver from a mapped register window and DMA memory.
    ///
    /// # Safety
    /// - `mmio_base` must be the device's mapped BAR0
    /// - `dma` must satisfy the contract of `DmaRegion::new`
    unsafe fn create(
        mmio_base: NonNull<u8>,
        irq: u32,
        dma: DmaRegion,
        config: Self::Config,
    ) -> Result<Self, Self::Error>;
}
