//! Driver abstraction module.
//!
//! Provides the probe/construction trait and the Intel I210 implementation.

pub mod intel;
pub mod traits;

// Re-exports
pub use intel::I210;
pub use traits::DriverInit;
