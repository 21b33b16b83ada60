//! Bringing the core from power-on into polled host mode.

use bilge::prelude::*;

use crate::channel::Channel;
use crate::error::{Result, UsbError};
use crate::hal::{MonotonicClock, PowerController, UsbBus};
use crate::regs::{
    AhbConfig, ChannelInterrupts, CoreInterrupts, FifoSize, HostConfig, ResetControl,
    CORE_ID_MASK, CORE_ID_SIGNATURE, FLUSH_ALL_TX_FIFOS,
};
use crate::Dwc2Host;

impl<B: UsbBus, C: MonotonicClock> Dwc2Host<B, C> {
    /// Powers, resets and configures the core as a host and powers the port.
    ///
    /// Only a refused power request or a foreign identity register are
    /// fatal. Waits that expire after that point are logged and init
    /// carries on, since the core usually works regardless.
    pub fn init<P: PowerController + ?Sized>(&self, power: &mut P) -> Result<()> {
        if let Err(e) = power.power_on_usb() {
            log::error!("[USB-DWC2] failed to power on the USB block: {}", e);
            return Err(UsbError::PowerOnFailed);
        }
        self.delay(self.config.power_settle);

        let id = self.regs.core_id();
        if id & CORE_ID_MASK != CORE_ID_SIGNATURE {
            log::error!("[USB-DWC2] unexpected core id {:#010x}", id);
            return Err(UsbError::UnknownController(id));
        }
        log::info!("[USB-DWC2] core id {:#010x}", id);

        self.regs.set_interrupt_mask(CoreInterrupts::empty());
        self.regs.set_ahb_config(AhbConfig::empty());

        self.soft_reset();

        self.regs.set_power_clock_gating(0);
        self.delay(self.config.clock_ungate_settle);

        let mut usb_config = self.regs.usb_config();
        usb_config.set_force_device(false);
        usb_config.set_force_host(true);
        usb_config.set_full_speed_phy(true);
        self.regs.set_usb_config(usb_config);
        self.delay(self.config.force_host_settle);

        let host_mode = try_wait_until!(
            &self.clock,
            self.config.host_mode_timeout,
            "host mode",
            self.regs.interrupt_status().contains(CoreInterrupts::CURRENT_MODE_HOST)
        );
        if host_mode.is_err() {
            log::warn!("[USB-DWC2] core did not report host mode");
        }

        self.size_fifos();
        self.flush_fifos();

        let mut host_config = HostConfig::from(0u32);
        host_config.set_phy_clock(u2::new(1));
        self.regs.set_host_config(host_config);
        self.regs.set_frame_interval(self.config.frame_interval);

        for channel in Channel::all() {
            self.halt_channel(channel);
            self.regs.channel(channel).set_interrupt_mask(ChannelInterrupts::ARMED);
        }
        self.regs.set_channel_interrupt_mask(0xFF);

        // Interrupts are latched for polling only, nothing is routed to the CPU.
        self.regs.clear_all_interrupt_status();
        self.regs.set_interrupt_mask(
            CoreInterrupts::START_OF_FRAME
                | CoreInterrupts::RX_FIFO_LEVEL
                | CoreInterrupts::PORT
                | CoreInterrupts::CHANNEL,
        );
        self.regs.set_ahb_config(AhbConfig::GLOBAL_INTERRUPT_ENABLE);

        self.regs.update_port_control(|port| port.set_power(true));
        self.delay(self.config.port_power_settle);

        log::info!("[USB-DWC2] host controller initialized");
        Ok(())
    }

    fn soft_reset(&self) {
        let idle = try_wait_until!(
            &self.clock,
            self.config.ahb_idle_timeout,
            "AHB idle",
            self.regs.reset_control().ahb_idle()
        );
        if idle.is_err() {
            log::warn!("[USB-DWC2] AHB master never went idle");
        }

        let mut reset = ResetControl::from(0u32);
        reset.set_core_soft_reset(true);
        self.regs.set_reset_control(reset);

        let done = try_wait_until!(
            &self.clock,
            self.config.core_reset_timeout,
            "core soft reset",
            !self.regs.reset_control().core_soft_reset()
        );
        if done.is_err() {
            log::warn!("[USB-DWC2] core soft reset did not complete");
        }
        self.delay(self.config.core_reset_settle);
    }

    fn size_fifos(&self) {
        let rx = self.config.rx_fifo_words;
        let np_tx = self.config.np_tx_fifo_words;
        let periodic = self.config.periodic_tx_fifo_words;

        self.regs.set_rx_fifo_size(rx);
        self.regs.set_np_tx_fifo_size(FifoSize::new(rx, np_tx));
        self.regs.set_periodic_tx_fifo_size(FifoSize::new(rx + np_tx, periodic));
    }

    fn flush_fifos(&self) {
        let mut flush = ResetControl::from(0u32);
        flush.set_tx_fifo_flush(true);
        flush.set_tx_fifo_number(u5::new(FLUSH_ALL_TX_FIFOS));
        self.regs.set_reset_control(flush);
        let tx = try_wait_until!(
            &self.clock,
            self.config.fifo_flush_timeout,
            "TX FIFO flush",
            !self.regs.reset_control().tx_fifo_flush()
        );
        if tx.is_err() {
            log::warn!("[USB-DWC2] TX FIFO flush did not complete");
        }

        let mut flush = ResetControl::from(0u32);
        flush.set_rx_fifo_flush(true);
        self.regs.set_reset_control(flush);
        let rx = try_wait_until!(
            &self.clock,
            self.config.fifo_flush_timeout,
            "RX FIFO flush",
            !self.regs.reset_control().rx_fifo_flush()
        );
        if rx.is_err() {
            log::warn!("[USB-DWC2] RX FIFO flush did not complete");
        }
    }
}
