//! Standard USB descriptors and a walker for configuration descriptors.

use bilge::prelude::*;
use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{FromBytes, FromZeroes, Unaligned};

use crate::regs::TransferType;
use crate::request::Direction;
use crate::state::HidEndpoint;

#[bitsize(8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum DescriptorType {
    Device = 1,
    Configuration = 2,
    String = 3,
    Interface = 4,
    Endpoint = 5,
    DeviceQualifier = 6,
    OtherSpeedConfiguration = 7,
    InterfacePower = 8,
    HumanInputDevice = 0x21,
    HidReport = 0x22,
    #[fallback]
    Reserved = 0xff,
}

#[derive(Debug, Copy, Clone, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct Device {
    pub length: u8,
    pub descriptor_type: u8,
    pub usb_version: U16<LittleEndian>,
    pub device_class: u8,
    pub device_sub_class: u8,
    pub device_protocol: u8,
    /// Max packet size of endpoint 0. One byte in this descriptor.
    pub max_packet_size: u8,
    pub vendor_id: U16<LittleEndian>,
    pub product_id: U16<LittleEndian>,
    pub device_version: U16<LittleEndian>,
    pub vendor_str: u8,
    pub product_str: u8,
    pub serial_str: u8,
    pub conf_count: u8,
}

/// The fixed 9-byte head of a configuration descriptor.
#[derive(Debug, Copy, Clone, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct ConfigurationHeader {
    pub length: u8,
    pub descriptor_type: u8,
    pub total_length: U16<LittleEndian>,
    pub num_interfaces: u8,
    pub config_value: u8,
    pub config_name: u8,
    pub attributes: u8,
    /// Expressed in 2mA units (i.e., 50 = 100mA)
    pub max_power: u8,
}

#[derive(Debug, Copy, Clone, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct Interface {
    pub length: u8,
    pub descriptor_type: u8,
    pub interface_number: u8,
    pub alt_setting: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub name: u8,
}

#[derive(Debug, Copy, Clone, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct Endpoint {
    pub length: u8,
    pub descriptor_type: u8,
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: U16<LittleEndian>,
    /// Polling interval in frames or microframes, depending on speed.
    pub interval: u8,
}

impl Endpoint {
    pub fn address(&self) -> EndpointAddress {
        EndpointAddress::from(self.address)
    }

    pub fn attributes(&self) -> EndpointAttributes {
        EndpointAttributes::from(self.attributes)
    }

    /// Packet size without the high-bandwidth multiplier bits.
    pub fn packet_size(&self) -> u16 {
        self.max_packet_size.get() & 0x7FF
    }
}

#[bitsize(8)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct EndpointAddress {
    pub number: u4,
    reserved: u3,
    pub direction: Direction,
}

#[bitsize(8)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct EndpointAttributes {
    pub transfer_type: TransferType,
    pub sync_type: u2,
    pub usage_type: u2,
    reserved: u2,
}

/// Iterates over the length-prefixed records of a descriptor blob.
///
/// Stops at the first record that is shorter than its own header or that
/// runs past the end of the buffer.
pub struct DescriptorRecords<'a> {
    bytes: &'a [u8],
}

impl<'a> DescriptorRecords<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl<'a> Iterator for DescriptorRecords<'a> {
    type Item = (DescriptorType, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.bytes.first()? as usize;
        if len < 2 || len > self.bytes.len() {
            self.bytes = &[];
            return None;
        }
        let (record, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Some((DescriptorType::from(record[1]), record))
    }
}

/// Finds the first interrupt-IN endpoint in a configuration descriptor,
/// along with the interface it belongs to.
pub fn find_hid_endpoint(configuration: &[u8]) -> Option<HidEndpoint> {
    let mut interface = 0;

    for (kind, record) in DescriptorRecords::new(configuration) {
        match kind {
            DescriptorType::Interface => {
                if let Some(desc) = Interface::read_from_prefix(record) {
                    interface = desc.interface_number;
                }
            }
            DescriptorType::Endpoint => {
                let Some(desc) = Endpoint::read_from_prefix(record) else {
                    continue;
                };
                let address = desc.address();
                if address.direction() == Direction::In
                    && desc.attributes().transfer_type() == TransferType::Interrupt
                {
                    return Some(HidEndpoint {
                        number: address.number().value(),
                        max_packet_size: desc.packet_size(),
                        interface,
                    });
                }
            }
            _ => {}
        }
    }

    None
}
