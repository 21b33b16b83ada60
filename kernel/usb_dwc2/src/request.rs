//! Control requests.

use bilge::prelude::*;

use crate::descriptors::DescriptorType;

pub mod std_req {
    pub const GET_STATUS: u8 = 0x00;
    pub const CLEAR_FEATURE: u8 = 0x01;
    pub const SET_FEATURE: u8 = 0x03;
    pub const SET_ADDRESS: u8 = 0x05;
    pub const GET_DESCRIPTOR: u8 = 0x06;
    pub const SET_DESCRIPTOR: u8 = 0x07;
    pub const GET_CONFIGURATION: u8 = 0x08;
    pub const SET_CONFIGURATION: u8 = 0x09;
    pub const GET_INTERFACE: u8 = 0x0A;
    pub const SET_INTERFACE: u8 = 0x0B;
}

pub mod hid_req {
    pub const GET_REPORT: u8 = 0x01;
    pub const GET_IDLE: u8 = 0x02;
    pub const SET_REPORT: u8 = 0x09;
    pub const SET_IDLE: u8 = 0x0A;
}

/// Direction of a transfer as seen from the host.
#[bitsize(1)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum Direction {
    Out = 0,
    In = 1,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Out => Self::In,
            Self::In => Self::Out,
        }
    }
}

#[bitsize(2)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum RequestType {
    Standard = 0,
    Class = 1,
    Vendor = 2,
    Reserved = 3,
}

#[bitsize(5)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum Recipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
    #[fallback]
    Reserved = 0x1f,
}

/// The 8 bytes sent in the SETUP stage of a control transfer.
///
/// Fields are laid out least significant bit first, so the little-endian
/// bytes of the backing `u64` are exactly the wire format.
#[bitsize(64)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct SetupPacket {
    pub recipient: Recipient,
    pub request_type: RequestType,
    pub direction: Direction,
    pub request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

impl SetupPacket {
    pub fn to_bytes(&self) -> [u8; 8] {
        u64::from(*self).to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self::from(u64::from_le_bytes(bytes))
    }

    /// The `bmRequestType` byte.
    pub fn request_type_byte(&self) -> u8 {
        self.to_bytes()[0]
    }

    pub fn get_descriptor(descriptor: DescriptorType, index: u8, length: u16) -> Self {
        Self::new(
            Recipient::Device,
            RequestType::Standard,
            Direction::In,
            std_req::GET_DESCRIPTOR,
            ((u8::from(descriptor) as u16) << 8) | index as u16,
            0,
            length,
        )
    }

    pub fn set_address(address: u8) -> Self {
        Self::new(
            Recipient::Device,
            RequestType::Standard,
            Direction::Out,
            std_req::SET_ADDRESS,
            address as u16,
            0,
            0,
        )
    }

    pub fn set_configuration(value: u8) -> Self {
        Self::new(
            Recipient::Device,
            RequestType::Standard,
            Direction::Out,
            std_req::SET_CONFIGURATION,
            value as u16,
            0,
            0,
        )
    }

    pub fn set_interface(interface: u8, alt_setting: u8) -> Self {
        Self::new(
            Recipient::Interface,
            RequestType::Standard,
            Direction::Out,
            std_req::SET_INTERFACE,
            alt_setting as u16,
            interface as u16,
            0,
        )
    }

    /// HID SET_IDLE for all reports. A `duration` of 0 asks the device to
    /// only report on change.
    pub fn hid_set_idle(interface: u8, duration: u8) -> Self {
        Self::new(
            Recipient::Interface,
            RequestType::Class,
            Direction::Out,
            hid_req::SET_IDLE,
            (duration as u16) << 8,
            interface as u16,
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_descriptor_wire_format() {
        let setup = SetupPacket::get_descriptor(DescriptorType::Device, 0, 8);
        assert_eq!(setup.to_bytes(), [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x08, 0x00]);
    }

    #[test]
    fn request_type_bytes() {
        assert_eq!(SetupPacket::set_address(1).request_type_byte(), 0x00);
        assert_eq!(SetupPacket::set_interface(0, 1).request_type_byte(), 0x01);
        assert_eq!(SetupPacket::hid_set_idle(0, 0).request_type_byte(), 0x21);
    }

    #[test]
    fn configuration_descriptor_request() {
        let bytes = SetupPacket::get_descriptor(DescriptorType::Configuration, 0, 64).to_bytes();
        assert_eq!(bytes, [0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn decodes_wire_bytes() {
        let setup = SetupPacket::from_bytes([0x21, 0x0A, 0x00, 0x04, 0x02, 0x00, 0x00, 0x00]);
        assert_eq!(setup.direction(), Direction::Out);
        assert_eq!(setup.request_type(), RequestType::Class);
        assert_eq!(setup.recipient(), Recipient::Interface);
        assert_eq!(setup.request(), hid_req::SET_IDLE);
        assert_eq!(setup.w_value(), 0x0400);
        assert_eq!(setup.w_index(), 2);
        assert_eq!(setup.w_length(), 0);
    }
}
