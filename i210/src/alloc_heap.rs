//! Standalone Global Allocator
//!
//! Uses linked_list_allocator for a battle-tested, no_std heap over a
//! static buffer. Needed when the driver is linked as a static library into
//! a C driver process that provides no Rust allocator (the RX backlog and
//! slot tables allocate).
//!
//! # Feature Flags
//!
//! - `global_allocator`: install [`LockedHeap`] as `#[global_allocator]`.
//!   Leave it off when the host program already has an allocator.
//!
//! # Safety
//!
//! - `init_heap()` must run before the first allocation (the FFI init entry
//!   point does this)

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

use linked_list_allocator::Heap;

/// Heap size: 1MB covers two 4096-entry rings (free lists, slot tables and
/// the teardown drain) plus the RX backlog at its default depth.
/// `I210Config::validate` rejects anything larger.
pub const HEAP_SIZE: usize = 1024 * 1024;

/// Locked heap wrapper implementing GlobalAlloc
pub struct LockedHeap {
    inner: spin::Mutex<Heap>,
}

impl LockedHeap {
    /// Create an empty (uninitialized) heap
    pub const fn empty() -> Self {
        Self {
            inner: spin::Mutex::new(Heap::empty()),
        }
    }

    /// Initialize the heap with a memory region
    ///
    /// # Safety
    /// - Must be called exactly once
    /// - Memory region must be valid and not used elsewhere
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        self.inner.lock().init(start, size);
    }

    pub fn stats(&self) -> HeapStats {
        let heap = self.inner.lock();
        HeapStats {
            total_size: heap.size(),
            used: heap.used(),
            free: heap.free(),
        }
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner
            .lock()
            .allocate_first_fit(layout)
            .map(|nn| nn.as_ptr())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(nn) = NonNull::new(ptr) {
            self.inner.lock().deallocate(nn, layout);
        }
    }
}

/// Heap statistics
#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    pub total_size: usize,
    pub used: usize,
    pub free: usize,
}

#[cfg(all(feature = "global_allocator", not(test)))]
mod global {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};

    /// Page-aligned heap buffer wrapper
    #[repr(C, align(4096))]
    struct AlignedHeapBuffer([u8; HEAP_SIZE]);

    /// Static heap buffer - lives in .bss, zero-initialized
    static mut HEAP_BUFFER: AlignedHeapBuffer = AlignedHeapBuffer([0u8; HEAP_SIZE]);

    #[global_allocator]
    pub(super) static GLOBAL: LockedHeap = LockedHeap::empty();

    pub(super) static HEAP_INITIALIZED: AtomicBool = AtomicBool::new(false);

    pub(super) unsafe fn init() {
        if HEAP_INITIALIZED.swap(true, Ordering::AcqRel) {
            return;
        }
        let start = core::ptr::addr_of_mut!(HEAP_BUFFER) as *mut u8;
        GLOBAL.init(start, HEAP_SIZE);
    }
}

/// Initialize the global heap (no-op without `global_allocator`).
///
/// Safe to call multiple times - only initializes once.
///
/// # Safety
/// Must be called before any allocation when the feature is enabled.
pub unsafe fn init_heap() {
    #[cfg(all(feature = "global_allocator", not(test)))]
    global::init();
}

/// Check if the global heap is initialized.
pub fn is_initialized() -> bool {
    #[cfg(all(feature = "global_allocator", not(test)))]
    {
        global::HEAP_INITIALIZED.load(core::sync::atomic::Ordering::Acquire)
    }
    #[cfg(not(all(feature = "global_allocator", not(test))))]
    {
        false
    }
}

/// Get global heap statistics, if this crate installed the allocator.
pub fn heap_stats() -> Option<HeapStats> {
    #[cfg(all(feature = "global_allocator", not(test)))]
    {
        is_initialized().then(|| global::GLOBAL.stats())
    }
    #[cfg(not(all(feature = "global_allocator", not(test))))]
    {
        None
    }
}
