use crate::regs::Pid;

/// Negotiated speed of the device on the root port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpeed {
    High,
    Full,
    Low,
}

impl PortSpeed {
    /// Decodes the HPRT speed field. The reserved code is treated as full
    /// speed.
    pub fn from_port_bits(bits: u8) -> Self {
        match bits {
            0 => Self::High,
            2 => Self::Low,
            _ => Self::Full,
        }
    }
}

/// The interrupt-IN endpoint found during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidEndpoint {
    pub number: u8,
    pub max_packet_size: u16,
    pub interface: u8,
}

/// Everything the driver knows about the attached device.
///
/// Owned by the caller and handed to each operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostControllerState {
    pub(crate) device_address: u8,
    pub(crate) ep0_max_packet: u16,
    pub(crate) hid_endpoint: Option<HidEndpoint>,
    /// `true` when the next interrupt-IN packet is expected as DATA1.
    pub(crate) hid_toggle: bool,
    pub(crate) enumerated: bool,
    pub(crate) speed: PortSpeed,
}

/// Endpoint 0 max packet size before the device descriptor has been read.
pub const DEFAULT_EP0_MAX_PACKET: u16 = 8;

impl HostControllerState {
    pub const fn new() -> Self {
        Self {
            device_address: 0,
            ep0_max_packet: DEFAULT_EP0_MAX_PACKET,
            hid_endpoint: None,
            hid_toggle: false,
            enumerated: false,
            speed: PortSpeed::Full,
        }
    }

    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    pub fn ep0_max_packet(&self) -> u16 {
        self.ep0_max_packet
    }

    pub fn hid_endpoint(&self) -> Option<HidEndpoint> {
        self.hid_endpoint
    }

    pub fn is_enumerated(&self) -> bool {
        self.enumerated
    }

    pub fn speed(&self) -> PortSpeed {
        self.speed
    }

    /// PID of the next interrupt-IN poll.
    pub fn hid_pid(&self) -> Pid {
        Pid::from_toggle(self.hid_toggle)
    }

    /// Max packet size of `endpoint` on the attached device.
    pub(crate) fn max_packet_for(&self, endpoint: u8) -> u16 {
        match (endpoint, self.hid_endpoint) {
            (0, _) => self.ep0_max_packet,
            (_, Some(hid)) => hid.max_packet_size,
            (_, None) => self.ep0_max_packet,
        }
    }

    /// Forgets the device after a bus reset.
    pub(crate) fn reset_device(&mut self, speed: PortSpeed) {
        self.speed = speed;
        self.device_address = 0;
        self.ep0_max_packet = DEFAULT_EP0_MAX_PACKET;
        self.enumerated = false;
    }
}

impl Default for HostControllerState {
    fn default() -> Self {
        Self::new()
    }
}
