//! DMA buffer management module.
//!
//! Provides ownership-tracked DMA buffers for safe device communication.
//! Raw memory comes from the per-device [`dma_pool::DmaPool`].

pub mod buffer;
pub mod ownership;
pub mod pool;

pub use buffer::DmaBuffer;
pub use ownership::BufferOwnership;
pub use pool::BufferPool;

/// Size of every packet buffer (RX and TX).
pub const BUFFER_SIZE: usize = 2048;
