//! Enumeration of the single attached device.

use zerocopy::FromBytes;

use crate::descriptors::{self, ConfigurationHeader, Device, DescriptorType};
use crate::error::{Result, UsbError};
use crate::hal::{MonotonicClock, UsbBus};
use crate::request::SetupPacket;
use crate::state::{HostControllerState, DEFAULT_EP0_MAX_PACKET};
use crate::Dwc2Host;

/// The address given to the device once it leaves the default state.
pub const DEVICE_ADDRESS: u8 = 1;

/// Endpoint 0 packet size from byte 7 of the device descriptor, falling
/// back to 8 for anything USB 2.0 does not allow.
fn ep0_max_packet_from(descriptor_byte: u8) -> u16 {
    match descriptor_byte {
        8 | 16 | 32 | 64 => descriptor_byte as u16,
        _ => DEFAULT_EP0_MAX_PACKET,
    }
}

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    /// Addresses and configures the device on a freshly reset port.
    ///
    /// Any failing step aborts enumeration and leaves the device
    /// unenumerated. Steps that already completed are not undone.
    pub fn enumerate(&self, state: &mut HostControllerState) -> Result<()> {
        state.enumerated = false;

        let mut head = [0u8; 8];
        self.control_transfer(state, &SetupPacket::get_descriptor(DescriptorType::Device, 0, 8), Some(&mut head[..]))
            .map_err(|e| enumeration_failed("device descriptor head", e))?;
        let ep0_max_packet = ep0_max_packet_from(head[7]);
        state.ep0_max_packet = ep0_max_packet;
        log::debug!("[USB-DWC2] endpoint 0 max packet {}", ep0_max_packet);

        // the second reset forgets what we just learned
        self.reset_port(state)?;
        state.ep0_max_packet = ep0_max_packet;
        self.delay(self.config.reset_settle);

        self.control_transfer(state, &SetupPacket::set_address(DEVICE_ADDRESS), None)
            .map_err(|e| enumeration_failed("SET_ADDRESS", e))?;
        state.device_address = DEVICE_ADDRESS;
        self.delay(self.config.address_settle);

        let mut device = [0u8; 18];
        self.control_transfer(state, &SetupPacket::get_descriptor(DescriptorType::Device, 0, 18), Some(&mut device[..]))
            .map_err(|e| enumeration_failed("device descriptor", e))?;
        if let Some(desc) = Device::read_from(&device[..]) {
            log::info!(
                "[USB-DWC2] device {:04x}:{:04x}, class {:#04x}",
                desc.vendor_id.get(),
                desc.product_id.get(),
                desc.device_class,
            );
        }

        let mut config = [0u8; 64];
        let len = self
            .control_transfer(state, &SetupPacket::get_descriptor(DescriptorType::Configuration, 0, 64), Some(&mut config[..]))
            .map_err(|e| enumeration_failed("configuration descriptor", e))?;
        let config = &config[..len];

        let Some(hid) = descriptors::find_hid_endpoint(config) else {
            log::error!("[USB-DWC2] no interrupt-IN endpoint in {} byte configuration", len);
            return Err(UsbError::NoInterruptEndpoint);
        };
        state.hid_endpoint = Some(hid);
        state.hid_toggle = false;
        log::info!(
            "[USB-DWC2] HID endpoint {} on interface {}, max packet {}",
            hid.number,
            hid.interface,
            hid.max_packet_size,
        );

        let config_value = ConfigurationHeader::read_from_prefix(config).map_or(1, |h| h.config_value);
        self.control_transfer(state, &SetupPacket::set_configuration(config_value), None)
            .map_err(|e| enumeration_failed("SET_CONFIGURATION", e))?;

        state.enumerated = true;
        log::info!("[USB-DWC2] enumerated at address {}", state.device_address);
        Ok(())
    }

    /// Asks the HID interface to only report on change.
    pub fn hid_set_idle(&self, state: &HostControllerState) -> Result<()> {
        let hid = state.hid_endpoint.ok_or(UsbError::NotEnumerated)?;
        self.control_transfer(state, &SetupPacket::hid_set_idle(hid.interface, 0), None)
            .map(|_| ())
    }

    /// Selects an alternate setting of one of the device's interfaces.
    pub fn set_interface(&self, state: &HostControllerState, interface: u8, alt_setting: u8) -> Result<()> {
        if !state.enumerated {
            return Err(UsbError::NotEnumerated);
        }
        self.control_transfer(state, &SetupPacket::set_interface(interface, alt_setting), None)
            .map(|_| ())
    }
}

fn enumeration_failed(step: &str, e: UsbError) -> UsbError {
    log::error!("[USB-DWC2] enumeration failed at {}: {}", step, e);
    e
}
