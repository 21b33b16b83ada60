use crate::channel::Channel;
use crate::error::{Result, Stage, UsbError};
use crate::hal::{MonotonicClock, UsbBus};
use crate::regs::TransferType;
use crate::request::Direction;
use crate::state::HostControllerState;
use crate::Dwc2Host;

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    /// Polls the HID endpoint once for an input report.
    ///
    /// Returns the number of report bytes stored in `report`. A NAK means
    /// the device has nothing new and comes back as
    /// `UsbError::Transfer { stage: Stage::Interrupt, cause: TransferError::Nak }`.
    /// The data toggle only advances when a report was received.
    pub fn read_input(&self, state: &mut HostControllerState, report: &mut [u8]) -> Result<usize> {
        let hid = match state.hid_endpoint {
            Some(hid) if state.enumerated && hid.number != 0 => hid,
            _ => return Err(UsbError::NotEnumerated),
        };

        let length = report.len().min(hid.max_packet_size as usize);
        let received = self
            .transfer(
                state,
                Channel::INTERRUPT,
                hid.number,
                Direction::In,
                TransferType::Interrupt,
                state.hid_pid(),
                report,
                length,
            )
            .map_err(|cause| UsbError::Transfer {
                stage: Stage::Interrupt,
                cause,
            })?;

        state.hid_toggle = !state.hid_toggle;
        Ok(received)
    }
}
