//! Fixed-size buffer pool management.
//!
//! A pool slices one contiguous DMA allocation into equal buffers and hands
//! them out by value. Returning a buffer moves it back into the free list.

use alloc::vec::Vec;

use dma_pool::DmaRegion;

use super::buffer::DmaBuffer;

/// Pre-allocated buffer pool for one ring.
pub struct BufferPool {
    /// Free buffers (LIFO).
    free: Vec<DmaBuffer>,
    /// Number of buffers carved from the region.
    total_count: usize,
    /// Size of each buffer.
    buffer_size: usize,
    /// Backing region.
    region: DmaRegion,
}

impl BufferPool {
    /// Carve `count` buffers of `buffer_size` bytes out of `region`.
    ///
    /// # Panics
    /// Panics if the region is too small or `count` exceeds `u16` indexing.
    pub fn new(region: DmaRegion, buffer_size: usize, count: usize) -> Self {
        assert!(buffer_size > 0, "Buffer size must be positive");
        assert!(count <= u16::MAX as usize + 1, "Pool size exceeds maximum");
        assert!(
            buffer_size * count <= region.size(),
            "DMA region too small for buffer pool"
        );

        // Reverse so the first alloc() yields index 0.
        let free = (0..count)
            .rev()
            .filter_map(|i| {
                let slice = region.slice(i * buffer_size, buffer_size)?;
                let cpu = core::ptr::NonNull::new(slice.cpu_ptr())?;
                // SAFETY: the slice lies inside the pool's DMA region.
                Some(unsafe { DmaBuffer::new(cpu, slice.bus_addr(), buffer_size, i as u16) })
            })
            .collect::<Vec<_>>();

        Self {
            free,
            total_count: count,
            buffer_size,
            region,
        }
    }

    /// Allocate a buffer from the pool.
    ///
    /// Returns `None` if pool is exhausted.
    pub fn alloc(&mut self) -> Option<DmaBuffer> {
        let mut buf = self.free.pop()?;
        buf.mark_allocated();
        Some(buf)
    }

    /// Return a buffer to the pool.
    ///
    /// # Panics
    /// Panics if the buffer is not driver-owned or came from another pool.
    pub fn free(&mut self, mut buf: DmaBuffer) {
        assert!(self.owns(&buf), "Buffer returned to the wrong pool");
        buf.mark_free();
        self.free.push(buf);
    }

    /// Whether `buf` was carved from this pool.
    pub fn owns(&self, buf: &DmaBuffer) -> bool {
        let base = self.region.bus_addr();
        let offset = (buf.index() as usize) * self.buffer_size;
        (buf.index() as usize) < self.total_count && buf.bus_addr() == base + offset as u64
    }

    /// Get number of available (free) buffers.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Get total number of buffers in pool.
    pub fn total(&self) -> usize {
        self.total_count
    }

    /// Get number of buffers currently in use.
    pub fn in_use(&self) -> usize {
        self.total_count - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}
