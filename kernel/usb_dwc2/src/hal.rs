//! The driver's view of the platform underneath it.
//!
//! Register access, time and power sequencing are provided by the board.
//! Implementations for the Raspberry Pi are included here; tests provide
//! their own.

use core::sync::atomic::{fence, Ordering};
use core::time::Duration;

use volatile::{ReadOnly, Volatile};

use crate::error::Result;

/// 32-bit register access relative to the controller's base address.
pub trait UsbBus {
    fn read(&self, offset: usize) -> u32;
    fn write(&self, offset: usize, value: u32);

    /// Orders all previous register accesses before any later ones.
    fn barrier(&self) {
        fence(Ordering::SeqCst);
    }
}

impl<T: UsbBus + ?Sized> UsbBus for &T {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }

    fn barrier(&self) {
        (**self).barrier()
    }
}

/// A clock that never goes backwards.
pub trait MonotonicClock {
    fn now(&self) -> Duration;

    /// Busy-waits for at least `duration`.
    fn delay(&self, duration: Duration) {
        let end = self.now().saturating_add(duration);
        while self.now() < end {
            core::hint::spin_loop();
        }
    }
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn delay(&self, duration: Duration) {
        (**self).delay(duration)
    }
}

/// Switches on power to the USB block before the core is touched.
///
/// The core does not respond to register accesses at all until this
/// succeeds.
pub trait PowerController {
    fn power_on_usb(&mut self) -> Result<()>;
}

/// For boards where the USB block is powered from reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysPowered;

impl PowerController for AlwaysPowered {
    fn power_on_usb(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Memory-mapped DWC2 registers at a fixed address.
#[derive(Debug, Clone, Copy)]
pub struct MmioBus {
    base: usize,
}

impl MmioBus {
    /// # Safety
    ///
    /// `base` must be the address of a mapped DWC2 register block that
    /// nothing else accesses while this bus is in use.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// The controller of the board selected at build time.
    ///
    /// # Safety
    ///
    /// See [`MmioBus::new`].
    pub const unsafe fn for_current_board() -> Self {
        Self::new(crate::boards::CURRENT.usb_base)
    }

    fn register(&self, offset: usize) -> *mut Volatile<u32> {
        (self.base + offset) as *mut Volatile<u32>
    }
}

impl UsbBus for MmioBus {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new` guarantees the block is mapped, offsets are in range.
        unsafe { (*self.register(offset)).read() }
    }

    fn write(&self, offset: usize, value: u32) {
        // SAFETY: see `read`.
        unsafe { (*self.register(offset)).write(value) }
    }
}

const TIMER_CLO: usize = 0x04;
const TIMER_CHI: usize = 0x08;

/// The free-running 1 MHz system timer of the Broadcom SoCs.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimer {
    base: usize,
}

impl SystemTimer {
    /// # Safety
    ///
    /// `base` must be the address of the mapped system timer block.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// # Safety
    ///
    /// See [`SystemTimer::new`].
    pub const unsafe fn for_current_board() -> Self {
        Self::new(crate::boards::CURRENT.system_timer_base)
    }

    fn counter(&self, offset: usize) -> u32 {
        // SAFETY: `new` guarantees the block is mapped.
        unsafe { (*((self.base + offset) as *const ReadOnly<u32>)).read() }
    }
}

impl MonotonicClock for SystemTimer {
    fn now(&self) -> Duration {
        // the high word can tick between the two reads
        loop {
            let hi = self.counter(TIMER_CHI);
            let lo = self.counter(TIMER_CLO);
            if self.counter(TIMER_CHI) == hi {
                return Duration::from_micros(((hi as u64) << 32) | lo as u64);
            }
        }
    }
}
