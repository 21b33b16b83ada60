//! A software model of a DWC2 core in host mode, with one gamepad-like
//! device on the root port.
//!
//! Transactions complete the moment a channel is enabled (or, for OUT
//! packets, once the last FIFO word arrives). Every call to `now()` moves
//! the clock forward by a microsecond so that all deadlines expire.

use core::cell::{Cell, RefCell, RefMut};
use core::time::Duration;
use std::collections::{HashMap, VecDeque};
use std::vec;
use std::vec::Vec;

use crate::fifo;
use crate::hal::{MonotonicClock, UsbBus};
use crate::regs::{offset, ChannelCharacteristics, ChannelInterrupts, Pid, TransferSize, TransferType};
use crate::request::{hid_req, std_req, Direction, SetupPacket};

pub const DWC2_CORE_ID: u32 = 0x4F54_280A;

/// The interrupt-IN endpoint of the simulated gamepad.
pub const GAMEPAD_ENDPOINT: u8 = 1;

pub const GAMEPAD_DEVICE_DESCRIPTOR: [u8; 18] = [
    18, 1, 0x00, 0x02, 0xFF, 0xFF, 0xFF, 64, 0x5E, 0x04, 0x8E, 0x02, 0x14, 0x01, 1, 2, 3, 1,
];

/// Configuration 1: a vendor interface with a class-specific descriptor, an
/// interrupt-OUT endpoint 2 and an interrupt-IN endpoint 1.
pub fn gamepad_config_descriptor() -> Vec<u8> {
    vec![
        9, 2, 38, 0, 1, 1, 0, 0xA0, 0xFA,
        9, 4, 0, 0, 2, 0xFF, 0x5D, 0x01, 0,
        6, 0x21, 0x10, 0x01, 0x01, 0x24,
        7, 5, 0x02, 0x03, 0x20, 0x00, 8,
        7, 5, 0x81, 0x03, 0x20, 0x00, 4,
    ]
}

/// One packet exchange as seen on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub channel: usize,
    pub device_address: u8,
    pub endpoint: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
    pub pid: Pid,
    pub max_packet: u16,
    pub low_speed: bool,
    /// Programmed transfer size.
    pub requested: usize,
    /// What the host sent for OUT, what the device answered for IN.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack(Vec<u8>),
    Nak,
    Stall,
    Error,
    /// No handshake at all; the channel stays busy.
    Silent,
    /// The channel halts without any other status bit.
    Halted,
}

struct ControlTransfer {
    setup: SetupPacket,
    response: Vec<u8>,
    sent: usize,
    stalled: bool,
}

pub struct SimDevice {
    pub address: u8,
    /// Chunk size the device actually uses on endpoint 0.
    pub packet_size: usize,
    pub device_descriptor: [u8; 18],
    pub config_descriptor: Vec<u8>,
    pub configuration: Option<u8>,
    pub idle_rate: Option<u8>,
    pub received_out: Vec<u8>,
    pub reports: VecDeque<Vec<u8>>,
    /// NAK this many transactions before answering normally.
    pub nak_budget: u32,
    /// Stall the DATA and STATUS stages of this request code.
    pub stall_request: Option<u8>,
    /// Answer every transaction with this instead.
    pub forced: Option<Response>,
    control: Option<ControlTransfer>,
}

impl SimDevice {
    pub fn gamepad() -> Self {
        Self {
            address: 0,
            packet_size: 64,
            device_descriptor: GAMEPAD_DEVICE_DESCRIPTOR,
            config_descriptor: gamepad_config_descriptor(),
            configuration: None,
            idle_rate: None,
            received_out: Vec::new(),
            reports: VecDeque::new(),
            nak_budget: 0,
            stall_request: None,
            forced: None,
            control: None,
        }
    }

    /// A device whose descriptor reports `descriptor_byte` as its endpoint 0
    /// size, while really sending `packet_size` byte packets.
    pub fn with_ep0(mut self, descriptor_byte: u8, packet_size: usize) -> Self {
        self.device_descriptor[7] = descriptor_byte;
        self.packet_size = packet_size;
        self
    }

    fn bus_reset(&mut self) {
        self.address = 0;
        self.configuration = None;
        self.control = None;
    }

    fn respond(&mut self, txn: &Transaction) -> Response {
        if let Some(forced) = &self.forced {
            return forced.clone();
        }
        if txn.device_address != self.address {
            return Response::Silent;
        }
        if self.nak_budget > 0 {
            self.nak_budget -= 1;
            return Response::Nak;
        }
        match txn.transfer_type {
            TransferType::Control if txn.endpoint == 0 => self.control(txn),
            TransferType::Interrupt if txn.endpoint == GAMEPAD_ENDPOINT && txn.direction == Direction::In => {
                match self.reports.pop_front() {
                    Some(report) => Response::Ack(report),
                    None => Response::Nak,
                }
            }
            _ => Response::Stall,
        }
    }

    fn control(&mut self, txn: &Transaction) -> Response {
        if txn.pid == Pid::Setup {
            let Ok(bytes) = <[u8; 8]>::try_from(&txn.data[..]) else {
                return Response::Error;
            };
            let setup = SetupPacket::from_bytes(bytes);
            let (mut response, known) = self.data_for(&setup);
            response.truncate(setup.w_length() as usize);
            self.control = Some(ControlTransfer {
                setup,
                response,
                sent: 0,
                stalled: !known || self.stall_request == Some(setup.request()),
            });
            return Response::Ack(Vec::new());
        }

        let packet_size = self.packet_size.min(txn.max_packet as usize);
        let Some(ctl) = self.control.as_mut() else {
            return Response::Stall;
        };
        if ctl.stalled {
            return Response::Stall;
        }

        let has_data = ctl.setup.w_length() > 0;
        let request_dir = ctl.setup.direction();
        let is_status = !has_data || txn.direction != request_dir;

        if !is_status {
            return match txn.direction {
                Direction::In => {
                    let end = (ctl.sent + packet_size).min(ctl.response.len());
                    let chunk = ctl.response[ctl.sent..end].to_vec();
                    ctl.sent = end;
                    Response::Ack(chunk)
                }
                Direction::Out => {
                    self.received_out.extend_from_slice(&txn.data);
                    Response::Ack(Vec::new())
                }
            };
        }

        // a status stage IN for a request without data, or the handshake
        // in the opposite direction of the data
        if !has_data && txn.direction == Direction::Out {
            return Response::Stall;
        }
        let setup = ctl.setup;
        self.control = None;
        self.apply(&setup);
        Response::Ack(Vec::new())
    }

    fn data_for(&self, setup: &SetupPacket) -> (Vec<u8>, bool) {
        match (setup.request_type_byte(), setup.request()) {
            (0x80, std_req::GET_DESCRIPTOR) => match setup.w_value() >> 8 {
                1 => (self.device_descriptor.to_vec(), true),
                2 => (self.config_descriptor.clone(), true),
                _ => (Vec::new(), false),
            },
            (0x00, std_req::SET_ADDRESS | std_req::SET_CONFIGURATION) => (Vec::new(), true),
            (0x01, std_req::SET_INTERFACE) => (Vec::new(), true),
            (0x21, hid_req::SET_IDLE | hid_req::SET_REPORT) => (Vec::new(), true),
            _ => (Vec::new(), false),
        }
    }

    fn apply(&mut self, setup: &SetupPacket) {
        match setup.request() {
            std_req::SET_ADDRESS if setup.request_type_byte() == 0x00 => {
                self.address = setup.w_value() as u8;
            }
            std_req::SET_CONFIGURATION if setup.request_type_byte() == 0x00 => {
                self.configuration = Some(setup.w_value() as u8);
            }
            hid_req::SET_IDLE if setup.request_type_byte() == 0x21 => {
                self.idle_rate = Some((setup.w_value() >> 8) as u8);
            }
            _ => {}
        }
    }
}

pub struct SimPort {
    pub attached: bool,
    pub enabled: bool,
    pub enable_changed: bool,
    pub connect_detected: bool,
    pub overcurrent_changed: bool,
    pub resetting: bool,
    pub powered: bool,
    /// HPRT speed code reported once enabled.
    pub speed: u8,
    /// Set when a write had the enable bit set, which turns the port off.
    pub disabled_by_write: bool,
    /// Never comes up enabled after a reset.
    pub stuck: bool,
    pub writes: usize,
}

impl SimPort {
    fn bits(&self) -> u32 {
        (self.attached as u32)
            | (self.connect_detected as u32) << 1
            | (self.enabled as u32) << 2
            | (self.enable_changed as u32) << 3
            | (self.overcurrent_changed as u32) << 5
            | (self.resetting as u32) << 8
            | (self.powered as u32) << 12
            | (self.speed as u32 & 0x3) << 17
    }
}

#[derive(Default)]
struct SimChannel {
    characteristics: u32,
    enabled: bool,
    split: u32,
    interrupts: u32,
    mask: u32,
    size: u32,
}

struct PendingOut {
    txn: Transaction,
    words: Vec<u32>,
}

pub struct SimState {
    pub core_id: u32,
    pub port: SimPort,
    pub device: SimDevice,
    /// Every transaction the host started, in order.
    pub log: Vec<Transaction>,
    /// Every register write, in order.
    pub writes: Vec<(usize, u32)>,
    /// What GNPTXSTS reads as.
    pub np_tx_status: u32,
    /// What GRSTCTL reads as. The default has the AHB idle and no reset or
    /// flush in progress.
    pub reset_control: u32,
    regs: HashMap<usize, u32>,
    channels: [SimChannel; 8],
    rx_status: VecDeque<u32>,
    rx_fifo: VecDeque<u32>,
    pending_out: Option<PendingOut>,
    frame: u32,
}

impl SimState {
    pub fn reg(&self, offset: usize) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    /// Sets a plain register without logging a write.
    pub fn preset(&mut self, offset: usize, value: u32) {
        self.regs.insert(offset, value);
    }

    pub fn channel_mask(&self, channel: usize) -> u32 {
        self.channels[channel].mask
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.rx_fifo.len()
    }

    pub fn wrote(&self, offset: usize) -> bool {
        self.writes.iter().any(|(o, _)| *o == offset)
    }

    fn read(&mut self, offset: usize) -> u32 {
        match offset {
            offset::GSNPSID => self.core_id,
            offset::GRSTCTL => self.reset_control,
            offset::GINTSTS => {
                let host = self.reg(offset::GUSBCFG) & (1 << 29) != 0;
                let rx_level = !self.rx_status.is_empty();
                (1 << 3) | (rx_level as u32) << 4 | host as u32
            }
            offset::GNPTXSTS => self.np_tx_status,
            offset::GRXSTSP => self.rx_status.pop_front().unwrap_or(0),
            offset::HFNUM => {
                self.frame = self.frame.wrapping_add(1);
                self.frame & 0x3FFF
            }
            offset::HPRT => self.port.bits(),
            o if is_channel_reg(o) => {
                let (ch, reg) = channel_reg(o);
                let c = &self.channels[ch];
                match reg {
                    offset::HCCHAR => c.characteristics | (c.enabled as u32) << 31,
                    offset::HCSPLT => c.split,
                    offset::HCINT => c.interrupts,
                    offset::HCINTMSK => c.mask,
                    offset::HCTSIZ => c.size,
                    _ => 0,
                }
            }
            o if is_fifo(o) => self.rx_fifo.pop_front().unwrap_or(0),
            o => self.reg(o),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.writes.push((offset, value));
        match offset {
            offset::GINTSTS | offset::GRSTCTL => {}
            offset::HPRT => self.write_port(value),
            o if is_channel_reg(o) => {
                let (ch, reg) = channel_reg(o);
                self.write_channel(ch, reg, value);
            }
            o if is_fifo(o) => self.push_fifo((o - offset::FIFO_BASE) / offset::FIFO_STRIDE, value),
            o => {
                self.regs.insert(o, value);
            }
        }
    }

    fn write_port(&mut self, value: u32) {
        let port = &mut self.port;
        port.writes += 1;
        if value & (1 << 1) != 0 {
            port.connect_detected = false;
        }
        if value & (1 << 2) != 0 {
            port.enabled = false;
            port.disabled_by_write = true;
        }
        if value & (1 << 3) != 0 {
            port.enable_changed = false;
        }
        if value & (1 << 5) != 0 {
            port.overcurrent_changed = false;
        }
        port.powered = value & (1 << 12) != 0;

        if value & (1 << 8) != 0 {
            port.resetting = true;
            port.enabled = false;
        } else if port.resetting {
            port.resetting = false;
            if port.attached && !port.stuck {
                port.enabled = true;
                port.enable_changed = true;
            }
            self.device.bus_reset();
        }
    }

    fn write_channel(&mut self, ch: usize, reg: usize, value: u32) {
        match reg {
            offset::HCCHAR => {
                let c = &mut self.channels[ch];
                if value & (1 << 30) != 0 {
                    if c.enabled {
                        c.interrupts |= ChannelInterrupts::HALTED.bits();
                    }
                    c.enabled = false;
                    c.characteristics = value & !(0b11 << 30);
                    return;
                }
                c.characteristics = value & !(1 << 31);
                if value & (1 << 31) != 0 {
                    self.start(ch, value);
                }
            }
            offset::HCSPLT => self.channels[ch].split = value,
            offset::HCINT => self.channels[ch].interrupts &= !value,
            offset::HCINTMSK => self.channels[ch].mask = value,
            offset::HCTSIZ => self.channels[ch].size = value,
            _ => {}
        }
    }

    fn start(&mut self, ch: usize, value: u32) {
        let chars = ChannelCharacteristics::from(value);
        let size = TransferSize::from(self.channels[ch].size);
        let txn = Transaction {
            channel: ch,
            device_address: chars.device_address().value(),
            endpoint: chars.endpoint().value(),
            direction: chars.direction(),
            transfer_type: chars.transfer_type(),
            pid: size.pid(),
            max_packet: chars.max_packet_size().value(),
            low_speed: chars.low_speed(),
            requested: size.bytes().value() as usize,
            data: Vec::new(),
        };
        self.channels[ch].enabled = true;

        if txn.direction == Direction::Out && txn.requested > 0 {
            self.pending_out = Some(PendingOut { txn, words: Vec::new() });
        } else {
            self.execute(txn);
        }
    }

    fn push_fifo(&mut self, ch: usize, word: u32) {
        let Some(pending) = self.pending_out.as_mut() else {
            return;
        };
        if pending.txn.channel != ch {
            return;
        }
        pending.words.push(word);
        if pending.words.len() < fifo::words_for(pending.txn.requested) {
            return;
        }
        let Some(PendingOut { mut txn, words }) = self.pending_out.take() else {
            return;
        };
        let mut data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        data.truncate(txn.requested);
        txn.data = data;
        self.execute(txn);
    }

    fn execute(&mut self, mut txn: Transaction) {
        let response = self.device.respond(&txn);
        let c = &mut self.channels[txn.channel];
        c.enabled = false;

        let done = ChannelInterrupts::HALTED.bits();
        match &response {
            Response::Ack(data) => {
                c.interrupts |= ChannelInterrupts::TRANSFER_COMPLETE.bits()
                    | ChannelInterrupts::ACK.bits()
                    | done;
                if txn.direction == Direction::In {
                    self.rx_status.push_back(rx_entry(txn.channel, data.len(), RX_IN_DATA));
                    self.rx_fifo.extend(fifo::pack_words(data));
                    // the core reports completion as a second, data-less entry
                    self.rx_status.push_back(rx_entry(txn.channel, 0, RX_IN_COMPLETE));
                    txn.data = data.clone();
                }
            }
            Response::Nak => c.interrupts |= ChannelInterrupts::NAK.bits() | done,
            Response::Stall => c.interrupts |= ChannelInterrupts::STALL.bits() | done,
            Response::Error => c.interrupts |= ChannelInterrupts::TRANSACTION_ERROR.bits() | done,
            Response::Silent => c.enabled = true,
            Response::Halted => c.interrupts |= done,
        }
        self.log.push(txn);
    }

    /// Queues a received packet that no transfer asked for, as if left
    /// behind by an earlier one.
    pub fn queue_stray_packet(&mut self, channel: usize, data: &[u8]) {
        self.rx_status.push_back(rx_entry(channel, data.len(), RX_IN_DATA));
        self.rx_fifo.extend(fifo::pack_words(data));
    }

    /// Queues a completion entry with no packet in front of it.
    pub fn queue_stale_completion(&mut self, channel: usize) {
        self.rx_status.push_back(rx_entry(channel, 0, RX_IN_COMPLETE));
    }

    pub fn rx_status_len(&self) -> usize {
        self.rx_status.len()
    }
}

const RX_IN_DATA: u32 = 2;
const RX_IN_COMPLETE: u32 = 3;

fn rx_entry(channel: usize, byte_count: usize, packet_status: u32) -> u32 {
    (channel as u32 & 0xF) | ((byte_count as u32) << 4) | (packet_status << 17)
}

fn is_channel_reg(o: usize) -> bool {
    (offset::CHANNEL_BASE..offset::CHANNEL_BASE + 8 * offset::CHANNEL_STRIDE).contains(&o)
}

fn channel_reg(o: usize) -> (usize, usize) {
    let rel = o - offset::CHANNEL_BASE;
    (rel / offset::CHANNEL_STRIDE, rel % offset::CHANNEL_STRIDE)
}

fn is_fifo(o: usize) -> bool {
    (offset::FIFO_BASE..offset::FIFO_BASE + 8 * offset::FIFO_STRIDE).contains(&o)
}

pub struct SimController {
    state: RefCell<SimState>,
    now_us: Cell<u64>,
}

impl SimController {
    pub fn new() -> Self {
        Self::with_device(SimDevice::gamepad())
    }

    pub fn with_device(device: SimDevice) -> Self {
        Self {
            state: RefCell::new(SimState {
                core_id: DWC2_CORE_ID,
                port: SimPort {
                    attached: true,
                    enabled: false,
                    enable_changed: false,
                    connect_detected: true,
                    overcurrent_changed: false,
                    resetting: false,
                    powered: false,
                    speed: 1,
                    disabled_by_write: false,
                    stuck: false,
                    writes: 0,
                },
                device,
                log: Vec::new(),
                writes: Vec::new(),
                np_tx_status: 0x0008_0100,
                reset_control: 1 << 31,
                regs: HashMap::new(),
                channels: Default::default(),
                rx_status: VecDeque::new(),
                rx_fifo: VecDeque::new(),
                pending_out: None,
                frame: 0,
            }),
            now_us: Cell::new(0),
        }
    }

    pub fn state(&self) -> RefMut<'_, SimState> {
        self.state.borrow_mut()
    }

    /// Takes the transactions logged so far.
    pub fn take_log(&self) -> Vec<Transaction> {
        core::mem::take(&mut self.state().log)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.now_us.get())
    }
}

impl UsbBus for SimController {
    fn read(&self, offset: usize) -> u32 {
        self.state.borrow_mut().read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.state.borrow_mut().write(offset, value)
    }

    fn barrier(&self) {}
}

impl MonotonicClock for SimController {
    fn now(&self) -> Duration {
        let now = self.now_us.get().saturating_add(1);
        self.now_us.set(now);
        Duration::from_micros(now)
    }

    fn delay(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.now_us.set(self.now_us.get().saturating_add(micros));
    }
}
