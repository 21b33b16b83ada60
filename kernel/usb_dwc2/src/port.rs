//! The root port: connection detection and bus reset.

use core::time::Duration;

use crate::deadline::Deadline;
use crate::error::{Result, UsbError};
use crate::hal::{MonotonicClock, UsbBus};
use crate::regs::PortChanges;
use crate::state::{HostControllerState, PortSpeed};
use crate::Dwc2Host;

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    pub fn is_connected(&self) -> bool {
        self.regs.host_port().connected()
    }

    /// Polls for a device on the root port for up to `timeout`.
    pub fn wait_connection(&self, timeout: Duration) -> bool {
        let deadline = Deadline::after(&self.clock, timeout);
        loop {
            if self.is_connected() {
                log::info!("[USB-DWC2] device connected");
                return true;
            }
            if deadline.expired() {
                return false;
            }
            self.delay(self.config.port_poll_interval.min(deadline.remaining()));
        }
    }

    /// Drives a USB bus reset and waits for the port to come up enabled.
    ///
    /// Without a connected device this fails before touching the port or
    /// `state`. On success the negotiated speed is recorded and the device
    /// is back at address 0 with the default endpoint 0 packet size.
    pub fn reset_port(&self, state: &mut HostControllerState) -> Result<()> {
        if !self.is_connected() {
            log::warn!("[USB-DWC2] port reset without a connected device");
            return Err(UsbError::NoDevice);
        }

        self.regs.clear_port_changes(PortChanges::all());
        self.delay(self.config.port_poll_interval);

        self.regs.update_port_control(|port| port.set_reset(true));
        self.delay(self.config.reset_hold);
        self.regs.update_port_control(|port| port.set_reset(false));
        self.delay(self.config.reset_settle);

        let deadline = Deadline::after(&self.clock, self.config.port_enable_timeout);
        loop {
            let port = self.regs.host_port();
            if port.enable_changed() {
                self.regs.clear_port_changes(PortChanges::ENABLE_CHANGED);
            }
            if port.enabled() {
                let speed = PortSpeed::from_port_bits(port.speed().value());
                state.reset_device(speed);
                log::info!("[USB-DWC2] port enabled, {:?} speed", speed);
                return Ok(());
            }
            if deadline.expired() {
                log::error!("[USB-DWC2] port did not enable after reset: {:?}", port);
                return Err(UsbError::PortEnableTimeout);
            }
            self.delay(self.config.port_poll_interval);
        }
    }
}
