//! C ABI for the OS integration layer.
//!
//! Thin wrappers over [`crate::facade`]. Every entry point returns 0 on
//! success and a negative errno-style code on failure, except `recv`, which
//! returns the frame length (0 when idle).
//!
//! The errno mapping lives in [`crate::error::errno`] and is tested there;
//! the entry points themselves are tested with `cargo test --features ffi`.

use core::ffi::c_int;
use core::ptr::NonNull;

use dma_pool::DmaRegion;

use crate::error::errno::{self, EINVAL, EMSGSIZE, ENODEV};
use crate::facade;
use crate::types::{Duplex, LinkState, ETH_ALEN};

/// Bring up the controller.
///
/// # Safety
/// - `regs` must be the mapped BAR0 of a supported device
/// - `dma_cpu`/`dma_bus`/`dma_len` must describe physically contiguous,
///   page-aligned DMA memory that stays mapped until `i210_rust_stop`
#[no_mangle]
pub unsafe extern "C" fn i210_rust_init(
    regs: *mut u8,
    irq: c_int,
    dma_cpu: *mut u8,
    dma_bus: u64,
    dma_len: usize,
) -> c_int {
    crate::alloc_heap::init_heap();

    let (Some(regs), Some(dma_cpu)) = (NonNull::new(regs), NonNull::new(dma_cpu)) else {
        return -EINVAL;
    };
    let Ok(irq) = u32::try_from(irq) else {
        return -EINVAL;
    };
    let dma = DmaRegion::new(dma_cpu, dma_bus, dma_len);

    match facade::init(regs, irq, dma) {
        Ok(_) => 0,
        Err(e) => errno::from_init(e),
    }
}

/// PCI probe filter: 1 if supported, 0 otherwise.
#[no_mangle]
pub extern "C" fn i210_rust_supports_device(vendor: u16, device: u16) -> c_int {
    facade::supports_device(vendor, device) as c_int
}

/// Copy the station address into `mac_addr` (6 bytes).
///
/// # Safety
/// The mac_addr pointer must be valid and point to at least 6 bytes
#[no_mangle]
pub unsafe extern "C" fn i210_rust_get_mac_addr(mac_addr: *mut u8) -> c_int {
    if mac_addr.is_null() {
        return -EINVAL;
    }
    match facade::get_mac_address() {
        Some(mac) => {
            core::ptr::copy_nonoverlapping(mac.as_bytes().as_ptr(), mac_addr, ETH_ALEN);
            0
        }
        None => -ENODEV,
    }
}

/// Capability bits of the running device (see `Capabilities`).
#[no_mangle]
pub extern "C" fn i210_rust_get_caps() -> c_int {
    match facade::get_capabilities() {
        Some(caps) => caps.bits() as c_int,
        None => -ENODEV,
    }
}

#[no_mangle]
pub extern "C" fn i210_rust_enable_rx() -> c_int {
    match facade::enable_rx() {
        Ok(()) => 0,
        Err(_) => -ENODEV,
    }
}

#[no_mangle]
pub extern "C" fn i210_rust_enable_tx() -> c_int {
    match facade::enable_tx() {
        Ok(()) => 0,
        Err(_) => -ENODEV,
    }
}

/// 0 when down, otherwise the speed in Mbps, negated for half duplex.
#[no_mangle]
pub extern "C" fn i210_rust_get_link_status() -> c_int {
    match facade::get_link_status() {
        LinkState::Down => 0,
        LinkState::Up(speed, Duplex::Full) => speed.mbps() as c_int,
        LinkState::Up(speed, Duplex::Half) => -(speed.mbps() as c_int),
    }
}

#[no_mangle]
pub extern "C" fn i210_rust_reset() -> c_int {
    match facade::reset() {
        Ok(()) => 0,
        Err(e) => errno::from_reset(e),
    }
}

/// Queue one frame.
///
/// # Safety
/// `buf` must be valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn i210_rust_send(buf: *const u8, len: usize) -> c_int {
    if buf.is_null() {
        return -EINVAL;
    }
    let frame = core::slice::from_raw_parts(buf, len);
    match facade::send(frame) {
        Ok(()) => 0,
        Err(e) => errno::from_send(e),
    }
}

/// Copy the next received frame into `buf`.
///
/// Returns its length, 0 when nothing is pending, or `-EMSGSIZE` if `cap`
/// is too small (the frame is dropped).
///
/// # Safety
/// `buf` must be valid for writes of `cap` bytes.
#[no_mangle]
pub unsafe extern "C" fn i210_rust_recv(buf: *mut u8, cap: usize) -> c_int {
    if buf.is_null() {
        return -EINVAL;
    }
    match facade::receive() {
        None => 0,
        Some(frame) if frame.len() > cap => -EMSGSIZE,
        Some(frame) => {
            core::ptr::copy_nonoverlapping(frame.as_ptr(), buf, frame.len());
            frame.len() as c_int
        }
    }
}

#[no_mangle]
pub extern "C" fn i210_rust_intr() {
    facade::handle_interrupt();
}

#[no_mangle]
pub extern "C" fn i210_rust_tick() {
    facade::tick();
}

/// Stop the controller. The DMA region may be released afterwards.
#[no_mangle]
pub extern "C" fn i210_rust_stop() -> c_int {
    match facade::stop() {
        Some(_) => 0,
        None => -ENODEV,
    }
}

/// Panic handler for no_std environment
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("i210: panic: {}", info);
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_before_init() {
        let mut mac = [0u8; 6];
        assert_eq!(unsafe { i210_rust_get_mac_addr(mac.as_mut_ptr()) }, -ENODEV);
        assert_eq!(i210_rust_get_caps(), -ENODEV);
        assert_eq!(i210_rust_get_link_status(), 0);
        assert_eq!(i210_rust_reset(), -ENODEV);
        assert_eq!(unsafe { i210_rust_send([0u8; 60].as_ptr(), 60) }, -ENODEV);
        assert_eq!(unsafe { i210_rust_recv(mac.as_mut_ptr(), 6) }, 0);
        assert_eq!(i210_rust_supports_device(0x8086, 0x1539), 1);
    }

    #[test]
    fn test_init_rejects_bad_arguments() {
        let null = core::ptr::null_mut();
        assert_eq!(unsafe { i210_rust_init(null, 0, null, 0, 0) }, -EINVAL);

        let mut regs = [0u8; 64];
        let mut dma = [0u8; 64];
        let (r, d) = (regs.as_mut_ptr(), dma.as_mut_ptr());
        assert_eq!(unsafe { i210_rust_init(r, -1, d, 0, dma.len()) }, -EINVAL);
    }
}
