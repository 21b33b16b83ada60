//! Control transfers on endpoint 0.

use crate::channel::Channel;
use crate::error::{Result, Stage, TransferError, TransferResult, UsbError};
use crate::hal::{MonotonicClock, UsbBus};
use crate::regs::{Pid, TransferType};
use crate::request::{Direction, SetupPacket};
use crate::state::HostControllerState;
use crate::Dwc2Host;

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    /// Repeats `attempt` while the device NAKs, up to the configured limit.
    fn retry_on_nak(&self, stage: Stage, mut attempt: impl FnMut() -> TransferResult) -> Result<usize> {
        for n in 1..=self.config.nak_retry_limit {
            match attempt() {
                Ok(bytes) => return Ok(bytes),
                Err(TransferError::Nak) if n < self.config.nak_retry_limit => {
                    log::trace!("[USB-DWC2] {:?} stage NAK, attempt {}", stage, n);
                    self.delay(self.config.nak_retry_delay);
                }
                Err(cause) => return Err(UsbError::Transfer { stage, cause }),
            }
        }
        log::debug!("[USB-DWC2] no attempts allowed for {:?} stage", stage);
        Err(UsbError::Transfer { stage, cause: TransferError::Nak })
    }

    /// Runs a complete control transfer against the attached device.
    ///
    /// `data` is the buffer for the DATA stage; it is skipped when the
    /// request carries no data or no buffer is given. Returns the number of
    /// bytes moved in the DATA stage.
    pub fn control_transfer(
        &self,
        state: &HostControllerState,
        setup: &SetupPacket,
        data: Option<&mut [u8]>,
    ) -> Result<usize> {
        let mut packet = setup.to_bytes();
        let packet_len = packet.len();
        log::trace!("[USB-DWC2] SETUP {:02x?}", packet);

        self.retry_on_nak(Stage::Setup, || {
            self.transfer(
                state,
                Channel::CONTROL,
                0,
                Direction::Out,
                TransferType::Control,
                Pid::Setup,
                &mut packet,
                packet_len,
            )
        })?;

        let direction = setup.direction();
        let mut transferred = 0;
        let mut data_stage = false;

        if let Some(buffer) = data.filter(|b| setup.w_length() > 0 && !b.is_empty()) {
            data_stage = true;
            let total = (setup.w_length() as usize).min(buffer.len());
            let max_packet = state.ep0_max_packet as usize;
            let mut pid = Pid::Data1;

            while transferred < total {
                let chunk_len = (total - transferred).min(max_packet);
                let chunk = &mut buffer[transferred..transferred + chunk_len];
                let n = self.retry_on_nak(Stage::Data, || {
                    self.transfer(
                        state,
                        Channel::CONTROL,
                        0,
                        direction,
                        TransferType::Control,
                        pid,
                        &mut *chunk,
                        chunk_len,
                    )
                })?;

                transferred += n;
                pid = pid.toggled();

                if direction == Direction::In && n < max_packet {
                    break;
                }
            }
        }

        let status_direction = if data_stage {
            direction.opposite()
        } else {
            Direction::In
        };

        self.retry_on_nak(Stage::Status, || {
            self.transfer(
                state,
                Channel::CONTROL,
                0,
                status_direction,
                TransferType::Control,
                Pid::Data1,
                &mut [],
                0,
            )
        })?;

        Ok(transferred)
    }
}
