//! Host-mode driver for the Synopsys DesignWare USB 2.0 OTG core (DWC2).
//!
//! The driver is polled and single-threaded: every operation runs to
//! completion on the caller's thread with bounded, clock-based waits.
//! It supports exactly one directly attached device, which is expected to be
//! a HID-class input device exposing an interrupt-IN endpoint.
//!
//! Current support:
//! - control transfers: full support (SETUP / DATA / STATUS with NAK retry)
//! - interrupt transfers: IN only, one packet per poll
//! - bulk, isochronous, split transactions and hubs: not supported
//!
//! Hardware access goes through the [`UsbBus`] and [`MonotonicClock`] traits,
//! so the same code runs against real MMIO ([`MmioBus`], [`SystemTimer`]) or a
//! software model of the controller.
//!
//! All per-device bookkeeping lives in a caller-owned [`HostControllerState`]
//! which is passed by reference to the operations that need it.

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod deadline;

pub mod boards;
mod channel;
pub mod config;
mod control;
mod core_init;
pub mod descriptors;
mod enumerate;
pub mod error;
pub mod fifo;
pub mod hal;
mod interrupt;
mod port;
pub mod regs;
pub mod request;
mod state;

#[cfg(test)]
mod test;

pub use channel::Channel;
pub use config::Dwc2Config;
pub use deadline::Deadline;
pub use error::{Result, Stage, TransferError, TransferResult, UsbError};
pub use hal::{AlwaysPowered, MmioBus, MonotonicClock, PowerController, SystemTimer, UsbBus};
pub use regs::{Pid, TransferType};
pub use request::{Direction, SetupPacket};
pub use state::{HidEndpoint, HostControllerState, PortSpeed};

use core::time::Duration;
use regs::Dwc2Registers;

/// A DWC2 controller in host mode.
///
/// `B` provides register access relative to the controller's base address,
/// `C` provides time. Neither is touched outside the methods of this type.
pub struct Dwc2Host<B: UsbBus, C: MonotonicClock> {
    regs: Dwc2Registers<B>,
    clock: C,
    config: Dwc2Config,
}

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    pub fn new(bus: B, clock: C) -> Self {
        Self::with_config(bus, clock, Dwc2Config::default())
    }

    pub fn with_config(bus: B, clock: C, config: Dwc2Config) -> Self {
        Self {
            regs: Dwc2Registers::new(bus),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &Dwc2Config {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Raw value of the core's synopsys ID register.
    pub fn version(&self) -> u32 {
        self.regs.core_id()
    }

    fn delay(&self, duration: Duration) {
        self.clock.delay(duration);
    }

    /// Complete bring-up of the attached device.
    ///
    /// Initializes the core, waits up to `connect_timeout` for a device,
    /// resets the port and enumerates. A rejected HID SET_IDLE afterwards is
    /// logged but does not fail the bring-up, since many gamepads stall it.
    pub fn start<P: PowerController + ?Sized>(
        &self,
        state: &mut HostControllerState,
        power: &mut P,
        connect_timeout: Duration,
    ) -> Result<()> {
        self.init(power)?;

        if !self.wait_connection(connect_timeout) {
            log::error!("[USB-DWC2] no device connected after {:?}", connect_timeout);
            return Err(UsbError::NoDevice);
        }

        self.reset_port(state)?;
        self.enumerate(state)?;

        if let Err(e) = self.hid_set_idle(state) {
            log::warn!("[USB-DWC2] SET_IDLE rejected: {}", e);
        }

        Ok(())
    }
}
