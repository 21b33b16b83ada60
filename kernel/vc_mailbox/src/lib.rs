//! The VideoCore mailbox property interface of the Raspberry Pi firmware.
//!
//! Only the power management tags are implemented, which is all the USB
//! host driver needs: the DWC2 block stays unpowered until the firmware is
//! asked to switch it on.

#![no_std]

#[cfg(test)]
extern crate std;

use core::fmt;
use core::sync::atomic::{fence, Ordering};
use core::time::Duration;

use volatile::{ReadOnly, Volatile, WriteOnly};

use usb_dwc2::{Deadline, MonotonicClock, PowerController, UsbError};

/// The ARM-to-VideoCore property tag channel.
pub const PROPERTY_CHANNEL: u8 = 8;

pub mod tags {
    pub const GET_POWER_STATE: u32 = 0x0002_0001;
    pub const SET_POWER_STATE: u32 = 0x0002_8001;
    pub const END: u32 = 0;
}

/// Firmware device ids for the power tags.
pub mod device {
    pub const SD_CARD: u32 = 0;
    pub const UART0: u32 = 1;
    pub const UART1: u32 = 2;
    pub const USB_HCD: u32 = 3;
}

const REQUEST: u32 = 0;
const RESPONSE_SUCCESS: u32 = 0x8000_0000;
/// Set by the firmware in a tag's size word once it has filled in the tag.
const TAG_RESPONSE: u32 = 1 << 31;

const POWER_ON: u32 = 1 << 0;
const POWER_WAIT: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// The mailbox stayed full or empty for too long.
    Timeout,
    /// The firmware answered with something other than success, or left
    /// the tag unanswered. Carries the offending response word.
    Rejected(u32),
}

impl From<MailboxError> for &'static str {
    fn from(value: MailboxError) -> Self {
        match value {
            MailboxError::Timeout => "mailbox timed out",
            MailboxError::Rejected(_) => "mailbox request rejected by firmware",
        }
    }
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(code) => write!(f, "mailbox request rejected ({:#010x})", code),
            other => f.write_str((*other).into()),
        }
    }
}

/// One property message: size, request code, a single tag and the end tag.
///
/// The firmware only sees the upper 28 bits of the buffer's address, hence
/// the alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct PropertyBuffer {
    pub words: [u32; 8],
}

impl PropertyBuffer {
    pub const fn new() -> Self {
        Self { words: [0; 8] }
    }

    /// A SET_POWER_STATE request for `device`.
    pub fn set_power_state(device: u32, on: bool) -> Self {
        let state = if on { POWER_ON | POWER_WAIT } else { POWER_WAIT };
        Self {
            words: [32, REQUEST, tags::SET_POWER_STATE, 8, 8, device, state, tags::END],
        }
    }

    pub fn response_code(&self) -> u32 {
        self.words[1]
    }

    /// Whether the firmware processed the power tag.
    pub fn tag_answered(&self) -> bool {
        self.words[4] & TAG_RESPONSE != 0
    }

    /// The power state the firmware reported back.
    pub fn powered(&self) -> bool {
        self.words[6] & POWER_ON != 0
    }
}

impl Default for PropertyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// A mailbox that the firmware answers through.
pub trait Mailbox {
    /// Hands `buffer` to the firmware on `channel` and waits for the reply,
    /// which is written back into `buffer`.
    fn call(&mut self, channel: u8, buffer: &mut PropertyBuffer) -> Result<(), MailboxError>;
}

const MBOX_READ: usize = 0x00;
const MBOX_STATUS: usize = 0x18;
const MBOX_WRITE: usize = 0x20;

const MBOX_FULL: u32 = 1 << 31;
const MBOX_EMPTY: u32 = 1 << 30;

/// The memory-mapped ARM side of mailbox 0/1.
pub struct MmioMailbox<C> {
    base: usize,
    clock: C,
    timeout: Duration,
}

impl<C: MonotonicClock> MmioMailbox<C> {
    /// # Safety
    ///
    /// `base` must be the address of the mapped mailbox registers.
    pub unsafe fn new(base: usize, clock: C) -> Self {
        Self {
            base,
            clock,
            timeout: Duration::from_millis(100),
        }
    }

    /// # Safety
    ///
    /// See [`MmioMailbox::new`].
    pub unsafe fn for_current_board(clock: C) -> Self {
        Self::new(usb_dwc2::boards::CURRENT.mailbox_base, clock)
    }

    fn status(&self) -> u32 {
        // SAFETY: `new` guarantees the registers are mapped.
        unsafe { (*((self.base + MBOX_STATUS) as *const ReadOnly<u32>)).read() }
    }

    fn wait_while(&self, busy: u32) -> Result<(), MailboxError> {
        let deadline = Deadline::after(&self.clock, self.timeout);
        while self.status() & busy != 0 {
            if deadline.expired() {
                log::error!("[VC-MAILBOX] status {:#010x} did not change", self.status());
                return Err(MailboxError::Timeout);
            }
            core::hint::spin_loop();
        }
        Ok(())
    }
}

impl<C: MonotonicClock> Mailbox for MmioMailbox<C> {
    fn call(&mut self, channel: u8, buffer: &mut PropertyBuffer) -> Result<(), MailboxError> {
        let message = (buffer.words.as_ptr() as usize as u32 & !0xF) | (channel as u32 & 0xF);

        fence(Ordering::SeqCst);
        self.wait_while(MBOX_FULL)?;
        // SAFETY: `new` guarantees the registers are mapped.
        unsafe { (*((self.base + MBOX_WRITE) as *mut WriteOnly<u32>)).write(message) };

        loop {
            self.wait_while(MBOX_EMPTY)?;
            // SAFETY: as above.
            let reply = unsafe { (*((self.base + MBOX_READ) as *mut Volatile<u32>)).read() };
            if reply == message {
                break;
            }
            log::warn!("[VC-MAILBOX] dropping reply {:#010x} for another request", reply);
        }
        fence(Ordering::SeqCst);
        Ok(())
    }
}

/// Asks the firmware to switch `device` on or off and reports the state it
/// ended up in.
pub fn set_power_state<M: Mailbox + ?Sized>(mailbox: &mut M, device: u32, on: bool) -> Result<bool, MailboxError> {
    let mut buffer = PropertyBuffer::set_power_state(device, on);
    mailbox.call(PROPERTY_CHANNEL, &mut buffer)?;
    match buffer.response_code() {
        RESPONSE_SUCCESS if buffer.tag_answered() => Ok(buffer.powered()),
        RESPONSE_SUCCESS => {
            log::warn!("[VC-MAILBOX] power tag for device {} left unanswered", device);
            Err(MailboxError::Rejected(buffer.words[4]))
        }
        code => Err(MailboxError::Rejected(code)),
    }
}

/// Powers the USB host block through the firmware.
pub struct VcPowerController<M> {
    mailbox: M,
}

impl<M: Mailbox> VcPowerController<M> {
    pub fn new(mailbox: M) -> Self {
        Self { mailbox }
    }

    pub fn into_inner(self) -> M {
        self.mailbox
    }
}

impl<M: Mailbox> PowerController for VcPowerController<M> {
    fn power_on_usb(&mut self) -> usb_dwc2::Result<()> {
        match set_power_state(&mut self.mailbox, device::USB_HCD, true) {
            Ok(true) => {
                log::info!("[VC-MAILBOX] USB HCD powered on");
                Ok(())
            }
            Ok(false) => {
                log::error!("[VC-MAILBOX] firmware left the USB HCD off");
                Err(UsbError::PowerOnFailed)
            }
            Err(e) => {
                log::error!("[VC-MAILBOX] USB power request failed: {}", e);
                Err(UsbError::PowerOnFailed)
            }
        }
    }
}

#[cfg(test)]
mod test;
