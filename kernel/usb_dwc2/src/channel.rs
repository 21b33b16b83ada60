//! One packet exchange on one host channel.

use bilge::prelude::*;

use crate::error::{TransferError, TransferResult};
use crate::fifo;
use crate::hal::{MonotonicClock, UsbBus};
use crate::regs::{
    ChannelCharacteristics, ChannelInterrupts, CoreInterrupts, Pid, RxPacketStatus, TransferSize,
    TransferType,
};
use crate::request::Direction;
use crate::state::{HostControllerState, PortSpeed};
use crate::Dwc2Host;

/// A hardware host channel, 0 through 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel(u8);

impl Channel {
    pub const COUNT: u8 = 8;
    /// Used for every control transfer.
    pub const CONTROL: Self = Self(0);
    /// Used for polling the HID endpoint.
    pub const INTERRUPT: Self = Self(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    /// Disables `channel` if it is running and acknowledges all of its
    /// interrupts.
    pub(crate) fn halt_channel(&self, channel: Channel) {
        let regs = self.regs.channel(channel);
        let mut chars = regs.characteristics();
        if chars.enable() {
            chars.set_disable(true);
            regs.set_characteristics(chars);
            let halted = try_wait_until!(
                &self.clock,
                self.config.channel_halt_timeout,
                "channel halt",
                regs.interrupts().contains(ChannelInterrupts::HALTED)
            );
            if halted.is_err() {
                log::warn!("[USB-DWC2] channel {} did not halt", channel.index());
            }
        }
        regs.clear_all_interrupts();
    }

    /// Waits for the next start of frame, so a control packet is not
    /// scheduled at the very end of one.
    fn wait_for_frame(&self) {
        self.regs.clear_interrupt_status(CoreInterrupts::START_OF_FRAME);
        let _ = try_wait_until!(
            &self.clock,
            self.config.sof_timeout,
            "start of frame",
            self.regs.interrupt_status().contains(CoreInterrupts::START_OF_FRAME)
        );
        self.regs.clear_interrupt_status(CoreInterrupts::START_OF_FRAME);
    }

    fn wait_for_tx_space(&self, words: usize) -> core::result::Result<(), &'static str> {
        try_wait_until!(
            &self.clock,
            self.config.tx_fifo_timeout,
            "TX FIFO space",
            self.regs.np_tx_status().space_available() as usize >= words
        )
    }

    /// Executes a single packet exchange.
    ///
    /// IN transfers ask the device for a full max-size packet and store at
    /// most `length` bytes of what arrives into `buffer`. OUT transfers send
    /// at most one max-size packet from the front of `buffer[..length]`.
    /// On success the number of bytes stored or sent is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        state: &HostControllerState,
        channel: Channel,
        endpoint: u8,
        direction: Direction,
        transfer_type: TransferType,
        pid: Pid,
        buffer: &mut [u8],
        length: usize,
    ) -> TransferResult {
        let length = length.min(buffer.len());
        let regs = self.regs.channel(channel);
        let max_packet = state.max_packet_for(endpoint);

        self.halt_channel(channel);
        if transfer_type == TransferType::Control {
            self.wait_for_frame();
        }
        regs.set_split_control(0);

        let request_len = match direction {
            Direction::In => max_packet as usize,
            Direction::Out => length.min(max_packet as usize),
        };

        let mut chars = ChannelCharacteristics::from(0u32);
        chars.set_max_packet_size(u11::new(max_packet & 0x7FF));
        chars.set_endpoint(u4::new(endpoint & 0xF));
        chars.set_direction(direction);
        chars.set_low_speed(state.speed == PortSpeed::Low);
        chars.set_transfer_type(transfer_type);
        chars.set_multi_count(u2::new(1));
        chars.set_device_address(u7::new(state.device_address & 0x7F));
        chars.set_odd_frame(self.regs.frame_number() & 1 == 1);

        regs.clear_all_interrupts();

        if direction == Direction::Out
            && request_len > 0
            && self.wait_for_tx_space(fifo::words_for(request_len)).is_err()
        {
            log::error!("[USB-DWC2] channel {}: no room in TX FIFO", channel.index());
            return Err(TransferError::Error);
        }

        let mut size = TransferSize::from(0u32);
        size.set_bytes(u19::new(request_len as u32));
        size.set_packet_count(u10::new(1));
        size.set_pid(pid);
        regs.set_transfer_size(size);

        self.regs.barrier();
        chars.set_enable(true);
        regs.set_characteristics(chars);
        self.regs.barrier();

        if direction == Direction::Out {
            for word in fifo::pack_words(&buffer[..request_len]) {
                regs.push_fifo(word);
            }
        }

        let deadline = crate::Deadline::after(&self.clock, self.config.transfer_timeout);
        loop {
            let status = regs.interrupts();

            if status.contains(ChannelInterrupts::TRANSFER_COMPLETE) {
                let moved = match direction {
                    Direction::In => self.drain_rx_packet(channel, &mut buffer[..length]),
                    Direction::Out => request_len,
                };
                regs.clear_all_interrupts();
                log::trace!("[USB-DWC2] ch{} ep{} {:?} {:?}: {} bytes", channel.index(), endpoint, direction, pid, moved);
                return Ok(moved);
            }

            let failure = if status.contains(ChannelInterrupts::NAK) {
                Some(TransferError::Nak)
            } else if status.contains(ChannelInterrupts::STALL) {
                Some(TransferError::Stall)
            } else if status.intersects(ChannelInterrupts::ERRORS) {
                Some(TransferError::Error)
            } else if status.contains(ChannelInterrupts::HALTED) {
                Some(TransferError::Error)
            } else {
                None
            };

            if let Some(failure) = failure {
                regs.clear_all_interrupts();
                if failure != TransferError::Nak {
                    log::debug!("[USB-DWC2] ch{} ep{} {:?}: {} ({:?})", channel.index(), endpoint, direction, failure, status);
                }
                return Err(failure);
            }

            if deadline.expired() {
                self.halt_channel(channel);
                log::debug!("[USB-DWC2] ch{} ep{} {:?}: timeout", channel.index(), endpoint, direction);
                return Err(TransferError::Timeout);
            }
        }
    }

    /// Empties the RX FIFO, keeping as many bytes of this channel's data
    /// packet as fit in `out`.
    ///
    /// Completion and halt entries carry no data and are skipped, as are
    /// packets left behind for other channels, whose words are discarded.
    fn drain_rx_packet(&self, channel: Channel, out: &mut [u8]) -> usize {
        let regs = self.regs.channel(channel);
        let mut stored = 0;

        while self.regs.interrupt_status().contains(CoreInterrupts::RX_FIFO_LEVEL) {
            let status = self.regs.pop_rx_status();
            let count = status.byte_count().value() as usize;
            let ours = status.channel().value() as usize == channel.index();

            if status.packet_status() != RxPacketStatus::InData {
                if !ours {
                    log::trace!("[USB-DWC2] ch{}: skipping {:?} of ch{}", channel.index(), status.packet_status(), status.channel().value());
                }
                continue;
            }

            if !ours {
                log::warn!("[USB-DWC2] ch{}: dropping {} stray bytes of ch{}", channel.index(), count, status.channel().value());
            }
            let keep = if ours { (stored + count).min(out.len()) } else { stored };
            for _ in 0..fifo::words_for(count) {
                let word = regs.pop_fifo();
                if stored < keep {
                    stored += fifo::unpack_word(word, &mut out[stored..keep]);
                }
            }
        }
        stored
    }
}
