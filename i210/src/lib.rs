//! Intel I210/I211 Gigabit Ethernet driver core.
//!
//! Owns the controller's MMIO register window, the legacy RX/TX descriptor
//! rings shared with the device over DMA, and the interrupt/tick servicing
//! that moves frames between the NIC and host memory. The OS integration
//! layer (PCI enumeration, IRQ policy, the network task loop) drives it
//! through the [`facade`] operations or, with the `ffi` feature, through the
//! `i210_rust_*` C ABI.
//!
//! # Layering
//! ```text
//!   ffi (C ABI)  ──>  facade (lock + deferred IRQs)
//!                          │
//!                          ▼
//!                 driver::intel::I210  ── link manager / phy
//!                    │           │
//!                  RxRing      TxRing  ── DescRing + BufferPool
//!                    │           │
//!                 RegisterAccess      dma_pool::DmaPool
//! ```
//!
//! # Feature Flags
//! - `ffi`: export the C ABI and a panic handler that parks the CPU
//! - `global_allocator`: install a `linked_list_allocator` heap as the
//!   global allocator for standalone static-library builds
//!
//! # Testing
//! `cargo test` covers everything but the C ABI entry points;
//! `cargo test --features ffi` adds those.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod alloc_heap;
pub mod dma;
pub mod driver;
pub mod error;
pub mod facade;
pub mod types;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(test)]
pub(crate) mod sim;

pub use dma_pool::{DmaError, DmaPool, DmaRegion};
pub use driver::intel::{I210Config, I210, I210_DEVICE_IDS, INTEL_VENDOR_ID};
pub use driver::intel::mmio::{RegisterAccess, RegisterMap};
pub use error::{DeviceTimeout, InitError, NotReady, ResetError, RxError, SendError};
pub use types::{Capabilities, Duplex, LinkState, MacAddress, Speed};
