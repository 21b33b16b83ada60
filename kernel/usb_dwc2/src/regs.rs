//! DWC2 register layout and typed access.
//!
//! Offsets are relative to the base of the controller's register block.
//! Multi-field registers are modeled as `bilge` bitfields, status and mask
//! registers as `bitflags` sets.

use bilge::prelude::*;
use bitflags::bitflags;

use crate::channel::Channel;
use crate::hal::UsbBus;
use crate::request::Direction;

pub mod offset {
    pub const GOTGCTL: usize = 0x000;
    pub const GAHBCFG: usize = 0x008;
    pub const GUSBCFG: usize = 0x00C;
    pub const GRSTCTL: usize = 0x010;
    pub const GINTSTS: usize = 0x014;
    pub const GINTMSK: usize = 0x018;
    pub const GRXSTSR: usize = 0x01C;
    pub const GRXSTSP: usize = 0x020;
    pub const GRXFSIZ: usize = 0x024;
    pub const GNPTXFSIZ: usize = 0x028;
    pub const GNPTXSTS: usize = 0x02C;
    pub const GSNPSID: usize = 0x040;
    pub const HPTXFSIZ: usize = 0x100;

    pub const HCFG: usize = 0x400;
    pub const HFIR: usize = 0x404;
    pub const HFNUM: usize = 0x408;
    pub const HAINT: usize = 0x414;
    pub const HAINTMSK: usize = 0x418;
    pub const HPRT: usize = 0x440;

    pub const CHANNEL_BASE: usize = 0x500;
    pub const CHANNEL_STRIDE: usize = 0x20;
    pub const HCCHAR: usize = 0x00;
    pub const HCSPLT: usize = 0x04;
    pub const HCINT: usize = 0x08;
    pub const HCINTMSK: usize = 0x0C;
    pub const HCTSIZ: usize = 0x10;

    pub const PCGCCTL: usize = 0xE00;

    pub const FIFO_BASE: usize = 0x1000;
    pub const FIFO_STRIDE: usize = 0x1000;
}

/// Upper 20 bits of GSNPSID on every DWC2 core.
pub const CORE_ID_SIGNATURE: u32 = 0x4F54_2000;
pub const CORE_ID_MASK: u32 = 0xFFFF_F000;

/// TX FIFO number that selects all TX FIFOs in a flush.
pub const FLUSH_ALL_TX_FIFOS: u8 = 0x10;

bitflags! {
    /// GAHBCFG
    pub struct AhbConfig: u32 {
        const GLOBAL_INTERRUPT_ENABLE = 1 << 0;
        const DMA_ENABLE = 1 << 5;
    }
}

bitflags! {
    /// GINTSTS and GINTMSK
    pub struct CoreInterrupts: u32 {
        const CURRENT_MODE_HOST = 1 << 0;
        const MODE_MISMATCH = 1 << 1;
        const START_OF_FRAME = 1 << 3;
        const RX_FIFO_LEVEL = 1 << 4;
        const NP_TX_FIFO_EMPTY = 1 << 5;
        const PORT = 1 << 24;
        const CHANNEL = 1 << 25;
        const P_TX_FIFO_EMPTY = 1 << 26;
        const DISCONNECT = 1 << 29;
    }
}

bitflags! {
    /// HCINT and HCINTMSK
    pub struct ChannelInterrupts: u32 {
        const TRANSFER_COMPLETE = 1 << 0;
        const HALTED = 1 << 1;
        const AHB_ERROR = 1 << 2;
        const STALL = 1 << 3;
        const NAK = 1 << 4;
        const ACK = 1 << 5;
        const NYET = 1 << 6;
        const TRANSACTION_ERROR = 1 << 7;
        const BABBLE = 1 << 8;
        const FRAME_OVERRUN = 1 << 9;
        const TOGGLE_ERROR = 1 << 10;

        /// Conditions that end a transfer as a plain error.
        const ERRORS = Self::AHB_ERROR.bits
            | Self::STALL.bits
            | Self::TRANSACTION_ERROR.bits
            | Self::BABBLE.bits;

        /// Conditions armed on every channel during init.
        const ARMED = Self::TRANSFER_COMPLETE.bits
            | Self::HALTED.bits
            | Self::STALL.bits
            | Self::NAK.bits
            | Self::ACK.bits
            | Self::TRANSACTION_ERROR.bits
            | Self::BABBLE.bits
            | Self::TOGGLE_ERROR.bits;
    }
}

bitflags! {
    /// The write-one-to-clear change bits of HPRT.
    pub struct PortChanges: u32 {
        const CONNECT_DETECTED = 1 << 1;
        const ENABLE_CHANGED = 1 << 3;
        const OVERCURRENT_CHANGED = 1 << 5;
    }
}

/// Every HPRT bit that changes state when written as one.
///
/// Bit 2 (port enable) is in here: writing it back as one disables the port.
const PORT_WRITE_ONE_TO_CLEAR: u32 = (1 << 1) | (1 << 2) | (1 << 3) | (1 << 5);

/// GUSBCFG
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct UsbConfig {
    pub timeout_calibration: u3,
    reserved: u3,
    pub full_speed_phy: bool,
    reserved: u22,
    pub force_host: bool,
    pub force_device: bool,
    pub corrupt_tx: bool,
}

/// GRSTCTL
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct ResetControl {
    pub core_soft_reset: bool,
    pub hclk_soft_reset: bool,
    pub frame_counter_reset: bool,
    reserved: bool,
    pub rx_fifo_flush: bool,
    pub tx_fifo_flush: bool,
    pub tx_fifo_number: u5,
    reserved: u19,
    pub dma_request: bool,
    pub ahb_idle: bool,
}

/// GNPTXFSIZ and HPTXFSIZ, both in 32-bit words.
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct FifoSize {
    pub start_address: u16,
    pub depth: u16,
}

/// GNPTXSTS
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct NpTxStatus {
    pub space_available: u16,
    pub queue_space: u8,
    pub queue_top: u7,
    reserved: bool,
}

/// GRXSTSR / GRXSTSP in host mode.
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct RxStatus {
    pub channel: u4,
    pub byte_count: u11,
    pub data_pid: u2,
    pub packet_status: RxPacketStatus,
    reserved: u11,
}

#[bitsize(4)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum RxPacketStatus {
    InData = 2,
    InTransferComplete = 3,
    ToggleError = 5,
    ChannelHalted = 7,
    #[fallback]
    Reserved = 0xf,
}

/// HCFG
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct HostConfig {
    /// 1 selects the 48 MHz full/low-speed PHY clock.
    pub phy_clock: u2,
    pub full_speed_only: bool,
    reserved: u29,
}

/// HPRT
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct HostPort {
    pub connected: bool,
    pub connect_detected: bool,
    pub enabled: bool,
    pub enable_changed: bool,
    pub overcurrent: bool,
    pub overcurrent_changed: bool,
    pub resume: bool,
    pub suspend: bool,
    pub reset: bool,
    reserved: bool,
    pub line_status: u2,
    pub power: bool,
    pub test_control: u4,
    pub speed: u2,
    reserved: u13,
}

/// A copy of HPRT with every write-one-to-clear bit zeroed, so that
/// writing it back only changes the control bits set through it.
#[derive(Debug, Copy, Clone)]
pub struct PortControl(HostPort);

impl PortControl {
    fn from_current(current: u32) -> Self {
        Self(HostPort::from(current & !PORT_WRITE_ONE_TO_CLEAR))
    }

    pub fn set_power(&mut self, on: bool) {
        self.0.set_power(on);
    }

    pub fn set_reset(&mut self, asserted: bool) {
        self.0.set_reset(asserted);
    }
}

/// HCCHAR
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct ChannelCharacteristics {
    pub max_packet_size: u11,
    pub endpoint: u4,
    pub direction: Direction,
    reserved: bool,
    pub low_speed: bool,
    pub transfer_type: TransferType,
    pub multi_count: u2,
    pub device_address: u7,
    pub odd_frame: bool,
    pub disable: bool,
    pub enable: bool,
}

/// HCTSIZ
#[bitsize(32)]
#[derive(DebugBits, Copy, Clone, PartialEq, FromBits)]
pub struct TransferSize {
    pub bytes: u19,
    pub packet_count: u10,
    pub pid: Pid,
    pub do_ping: bool,
}

/// Endpoint transfer type, as encoded in both endpoint descriptors and
/// HCCHAR.
#[bitsize(2)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum TransferType {
    Control = 0x0,
    Isochronous = 0x1,
    Bulk = 0x2,
    Interrupt = 0x3,
}

/// Packet identifier programmed into HCTSIZ.
#[bitsize(2)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBits)]
pub enum Pid {
    Data0 = 0,
    MData = 1,
    Data1 = 2,
    Setup = 3,
}

impl Pid {
    /// The next data toggle. SETUP and MDATA are not part of the toggle
    /// sequence and map to DATA0.
    pub fn toggled(self) -> Self {
        match self {
            Self::Data0 => Self::Data1,
            _ => Self::Data0,
        }
    }

    pub fn from_toggle(data1: bool) -> Self {
        if data1 {
            Self::Data1
        } else {
            Self::Data0
        }
    }
}

/// The controller's register block behind a [`UsbBus`].
pub struct Dwc2Registers<B> {
    bus: B,
}

impl<B: UsbBus> Dwc2Registers<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn read(&self, offset: usize) -> u32 {
        self.bus.read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.bus.write(offset, value)
    }

    pub fn barrier(&self) {
        self.bus.barrier()
    }

    pub fn core_id(&self) -> u32 {
        self.read(offset::GSNPSID)
    }

    pub fn set_ahb_config(&self, config: AhbConfig) {
        self.write(offset::GAHBCFG, config.bits())
    }

    pub fn usb_config(&self) -> UsbConfig {
        UsbConfig::from(self.read(offset::GUSBCFG))
    }

    pub fn set_usb_config(&self, config: UsbConfig) {
        self.write(offset::GUSBCFG, config.into())
    }

    pub fn reset_control(&self) -> ResetControl {
        ResetControl::from(self.read(offset::GRSTCTL))
    }

    pub fn set_reset_control(&self, control: ResetControl) {
        self.write(offset::GRSTCTL, control.into())
    }

    pub fn interrupt_status(&self) -> CoreInterrupts {
        CoreInterrupts::from_bits_truncate(self.read(offset::GINTSTS))
    }

    pub fn clear_interrupt_status(&self, which: CoreInterrupts) {
        self.write(offset::GINTSTS, which.bits())
    }

    pub fn clear_all_interrupt_status(&self) {
        self.write(offset::GINTSTS, u32::MAX)
    }

    pub fn set_interrupt_mask(&self, mask: CoreInterrupts) {
        self.write(offset::GINTMSK, mask.bits())
    }

    /// Pops the status entry at the head of the RX FIFO.
    pub fn pop_rx_status(&self) -> RxStatus {
        RxStatus::from(self.read(offset::GRXSTSP))
    }

    pub fn set_rx_fifo_size(&self, words: u16) {
        self.write(offset::GRXFSIZ, words as u32)
    }

    pub fn set_np_tx_fifo_size(&self, size: FifoSize) {
        self.write(offset::GNPTXFSIZ, size.into())
    }

    pub fn set_periodic_tx_fifo_size(&self, size: FifoSize) {
        self.write(offset::HPTXFSIZ, size.into())
    }

    pub fn np_tx_status(&self) -> NpTxStatus {
        NpTxStatus::from(self.read(offset::GNPTXSTS))
    }

    pub fn set_host_config(&self, config: HostConfig) {
        self.write(offset::HCFG, config.into())
    }

    /// HFIR, in PHY clocks per frame.
    pub fn set_frame_interval(&self, clocks: u16) {
        self.write(offset::HFIR, clocks as u32)
    }

    pub fn frame_number(&self) -> u16 {
        self.read(offset::HFNUM) as u16
    }

    /// HAINTMSK, one bit per channel.
    pub fn set_channel_interrupt_mask(&self, channels: u32) {
        self.write(offset::HAINTMSK, channels)
    }

    pub fn set_power_clock_gating(&self, value: u32) {
        self.write(offset::PCGCCTL, value)
    }

    pub fn host_port(&self) -> HostPort {
        HostPort::from(self.read(offset::HPRT))
    }

    /// Acknowledges the given change bits and nothing else.
    pub fn clear_port_changes(&self, changes: PortChanges) {
        let current = self.read(offset::HPRT);
        self.write(
            offset::HPRT,
            (current & !PORT_WRITE_ONE_TO_CLEAR) | changes.bits(),
        )
    }

    /// Read-modify-write of the port's control bits. Status bits are never
    /// acknowledged and the port is never disabled by this.
    pub fn update_port_control(&self, f: impl FnOnce(&mut PortControl)) {
        let mut control = PortControl::from_current(self.read(offset::HPRT));
        f(&mut control);
        self.write(offset::HPRT, control.0.into())
    }

    pub fn channel(&self, channel: Channel) -> ChannelRegisters<'_, B> {
        let index = channel.index();
        ChannelRegisters {
            regs: self,
            base: offset::CHANNEL_BASE + index * offset::CHANNEL_STRIDE,
            fifo: offset::FIFO_BASE + index * offset::FIFO_STRIDE,
        }
    }
}

/// The registers and FIFO of one host channel.
pub struct ChannelRegisters<'r, B> {
    regs: &'r Dwc2Registers<B>,
    base: usize,
    fifo: usize,
}

impl<'r, B: UsbBus> ChannelRegisters<'r, B> {
    pub fn characteristics(&self) -> ChannelCharacteristics {
        ChannelCharacteristics::from(self.regs.read(self.base + offset::HCCHAR))
    }

    pub fn set_characteristics(&self, value: ChannelCharacteristics) {
        self.regs.write(self.base + offset::HCCHAR, value.into())
    }

    pub fn set_split_control(&self, value: u32) {
        self.regs.write(self.base + offset::HCSPLT, value)
    }

    pub fn interrupts(&self) -> ChannelInterrupts {
        ChannelInterrupts::from_bits_truncate(self.regs.read(self.base + offset::HCINT))
    }

    pub fn clear_interrupts(&self, which: ChannelInterrupts) {
        self.regs.write(self.base + offset::HCINT, which.bits())
    }

    pub fn clear_all_interrupts(&self) {
        self.regs.write(self.base + offset::HCINT, u32::MAX)
    }

    pub fn set_interrupt_mask(&self, mask: ChannelInterrupts) {
        self.regs.write(self.base + offset::HCINTMSK, mask.bits())
    }

    pub fn set_transfer_size(&self, value: TransferSize) {
        self.regs.write(self.base + offset::HCTSIZ, value.into())
    }

    pub fn push_fifo(&self, word: u32) {
        self.regs.write(self.fifo, word)
    }

    pub fn pop_fifo(&self) -> u32 {
        self.regs.read(self.fifo)
    }
}
