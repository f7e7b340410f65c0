//! Buffer ownership state machine.
//!
//! # State Machine
//! ```text
//!     FREE ──alloc()──> DRIVER_OWNED ──arm/enqueue──> DEVICE_OWNED
//!       ▲                     │                            │
//!       └────free()───────────┴──────DD writeback──────────┘
//! ```
//!
//! INVARIANT: the CPU never reads or writes a DEVICE_OWNED buffer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwnership {
    /// Sitting in a pool free list.
    Free,
    /// Held by the driver; CPU access allowed.
    DriverOwned,
    /// Published to the NIC through a descriptor.
    DeviceOwned,
}

impl BufferOwnership {
    #[inline]
    pub fn is_free(&self) -> bool {
        *self == BufferOwnership::Free
    }

    /// CPU may touch the buffer contents.
    #[inline]
    pub fn can_access(&self) -> bool {
        *self == BufferOwnership::DriverOwned
    }

    #[inline]
    pub fn is_device_owned(&self) -> bool {
        *self == BufferOwnership::DeviceOwned
    }
}
