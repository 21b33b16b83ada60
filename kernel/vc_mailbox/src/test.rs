use super::*;
use std::vec::Vec;

/// Answers every call the way the firmware would, optionally refusing.
struct FakeFirmware {
    calls: Vec<(u8, PropertyBuffer)>,
    response: u32,
    grant_power: bool,
    answer_tag: bool,
}

impl FakeFirmware {
    fn new() -> Self {
        Self { calls: Vec::new(), response: RESPONSE_SUCCESS, grant_power: true, answer_tag: true }
    }
}

impl Mailbox for FakeFirmware {
    fn call(&mut self, channel: u8, buffer: &mut PropertyBuffer) -> Result<(), MailboxError> {
        self.calls.push((channel, buffer.clone()));
        buffer.words[1] = self.response;
        if self.answer_tag {
            buffer.words[4] = 0x8000_0008;
        }
        if !self.grant_power {
            buffer.words[6] &= !POWER_ON;
        }
        Ok(())
    }
}

struct DeadMailbox;

impl Mailbox for DeadMailbox {
    fn call(&mut self, _: u8, _: &mut PropertyBuffer) -> Result<(), MailboxError> {
        Err(MailboxError::Timeout)
    }
}

#[test]
fn test_power_message_layout() {
    let buffer = PropertyBuffer::set_power_state(device::USB_HCD, true);
    assert_eq!(buffer.words, [32, 0, 0x0002_8001, 8, 8, 3, 3, 0]);
    assert_eq!(core::mem::align_of::<PropertyBuffer>(), 16);
    assert_eq!(core::mem::size_of::<PropertyBuffer>(), 32);
}

#[test]
fn test_power_off_message() {
    let buffer = PropertyBuffer::set_power_state(device::USB_HCD, false);
    assert_eq!(buffer.words[6], POWER_WAIT);
}

#[test]
fn test_usb_power_on() {
    let mut power = VcPowerController::new(FakeFirmware::new());
    assert_eq!(power.power_on_usb(), Ok(()));

    let firmware = power.into_inner();
    assert_eq!(firmware.calls.len(), 1);
    assert_eq!(firmware.calls[0].0, PROPERTY_CHANNEL);
    assert_eq!(firmware.calls[0].1.words[5], device::USB_HCD);
}

#[test]
fn test_firmware_leaves_block_off() {
    let mut firmware = FakeFirmware::new();
    firmware.grant_power = false;
    assert_eq!(set_power_state(&mut firmware, device::USB_HCD, true), Ok(false));

    let mut power = VcPowerController::new(firmware);
    assert_eq!(power.power_on_usb(), Err(UsbError::PowerOnFailed));
}

#[test]
fn test_rejected_request() {
    let mut firmware = FakeFirmware::new();
    firmware.response = 0x8000_0001;
    assert_eq!(
        set_power_state(&mut firmware, device::USB_HCD, true),
        Err(MailboxError::Rejected(0x8000_0001))
    );
}

#[test]
fn test_mailbox_timeout() {
    assert_eq!(set_power_state(&mut DeadMailbox, device::USB_HCD, true), Err(MailboxError::Timeout));
    let mut power = VcPowerController::new(DeadMailbox);
    assert_eq!(power.power_on_usb(), Err(UsbError::PowerOnFailed));
}

#[test]
fn test_unanswered_tag() {
    let mut firmware = FakeFirmware::new();
    firmware.answer_tag = false;
    assert_eq!(set_power_state(&mut firmware, device::USB_HCD, true), Err(MailboxError::Rejected(8)));

    let mut power = VcPowerController::new(firmware);
    assert_eq!(power.power_on_usb(), Err(UsbError::PowerOnFailed));
}
