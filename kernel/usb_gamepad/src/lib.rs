//! Xbox 360 style gamepads on top of the DWC2 host driver.
//!
//! The pad sends a 20-byte input report on its interrupt-IN endpoint
//! whenever something changes. Other message types on that endpoint
//! (LED state, rumble acks, headset status) are ignored.

#![no_std]

use bitflags::bitflags;
use zerocopy::byteorder::{LittleEndian, I16};
use zerocopy::{FromBytes, FromZeroes, Unaligned};

use usb_dwc2::{Dwc2Host, HostControllerState, MonotonicClock, TransferError, UsbBus, UsbError};

/// Message type of an input report.
pub const INPUT_REPORT_ID: u8 = 0x00;

#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct InputReport {
    pub report_id: u8,
    pub report_length: u8,
    pub buttons_low: u8,
    pub buttons_high: u8,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_x: I16<LittleEndian>,
    pub left_y: I16<LittleEndian>,
    pub right_x: I16<LittleEndian>,
    pub right_y: I16<LittleEndian>,
    reserved: [u8; 6],
}

pub const REPORT_LEN: usize = core::mem::size_of::<InputReport>();

bitflags! {
    /// Buttons, low report byte first.
    pub struct Buttons: u16 {
        const DPAD_UP = 1 << 0;
        const DPAD_DOWN = 1 << 1;
        const DPAD_LEFT = 1 << 2;
        const DPAD_RIGHT = 1 << 3;
        const START = 1 << 4;
        const BACK = 1 << 5;
        const LEFT_STICK = 1 << 6;
        const RIGHT_STICK = 1 << 7;
        const LB = 1 << 8;
        const RB = 1 << 9;
        const GUIDE = 1 << 10;
        const A = 1 << 12;
        const B = 1 << 13;
        const X = 1 << 14;
        const Y = 1 << 15;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    pub buttons: Buttons,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_stick: (i16, i16),
    pub right_stick: (i16, i16),
}

impl GamepadState {
    /// Decodes an input report. Anything that is not a complete input
    /// report yields `None`.
    pub fn from_report(bytes: &[u8]) -> Option<Self> {
        let report = InputReport::read_from_prefix(bytes)?;
        if report.report_id != INPUT_REPORT_ID || (report.report_length as usize) < REPORT_LEN {
            return None;
        }
        Some(Self {
            buttons: Buttons::from_bits_truncate(u16::from_le_bytes([report.buttons_low, report.buttons_high])),
            left_trigger: report.left_trigger,
            right_trigger: report.right_trigger,
            left_stick: (report.left_x.get(), report.left_y.get()),
            right_stick: (report.right_x.get(), report.right_y.get()),
        })
    }
}

/// A new report along with the buttons that changed since the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub state: GamepadState,
    pub pressed: Buttons,
    pub released: Buttons,
}

#[derive(Debug, Default)]
pub struct Gamepad {
    current: GamepadState,
}

impl Gamepad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GamepadState {
        &self.current
    }

    /// Polls the pad once.
    ///
    /// `Ok(None)` means nothing new arrived: the pad NAKed, timed out or
    /// sent a message that is not an input report.
    pub fn poll<B: UsbBus, C: MonotonicClock>(
        &mut self,
        host: &Dwc2Host<B, C>,
        state: &mut HostControllerState,
    ) -> Result<Option<Update>, UsbError> {
        let mut report = [0u8; REPORT_LEN];
        match host.read_input(state, &mut report) {
            Ok(n) => Ok(self.update(&report[..n])),
            Err(e) => match e.transfer_cause() {
                Some(TransferError::Nak | TransferError::Timeout) => Ok(None),
                _ => Err(e),
            },
        }
    }

    fn update(&mut self, bytes: &[u8]) -> Option<Update> {
        let Some(state) = GamepadState::from_report(bytes) else {
            log::trace!("[USB-GAMEPAD] ignoring {} byte message", bytes.len());
            return None;
        };
        let previous = core::mem::replace(&mut self.current, state);
        Some(Update {
            state,
            pressed: state.buttons - previous.buttons,
            released: previous.buttons - state.buttons,
        })
    }
}
