use core::time::Duration;

/// Tunables of the driver. The defaults work for full- and low-speed HID
/// devices on the Raspberry Pi.
#[derive(Debug, Clone)]
pub struct Dwc2Config {
    /// Budget for a single packet exchange on a channel.
    pub transfer_timeout: Duration,
    /// Attempts per control stage before a NAK is reported upward.
    pub nak_retry_limit: u32,
    pub nak_retry_delay: Duration,

    pub reset_hold: Duration,
    pub reset_settle: Duration,
    pub port_enable_timeout: Duration,
    pub port_poll_interval: Duration,
    pub address_settle: Duration,

    pub power_settle: Duration,
    pub ahb_idle_timeout: Duration,
    pub core_reset_timeout: Duration,
    pub core_reset_settle: Duration,
    pub clock_ungate_settle: Duration,
    pub force_host_settle: Duration,
    pub host_mode_timeout: Duration,
    pub fifo_flush_timeout: Duration,
    pub port_power_settle: Duration,

    pub sof_timeout: Duration,
    pub tx_fifo_timeout: Duration,
    pub channel_halt_timeout: Duration,

    /// FIFO partition, in 32-bit words. The TX FIFOs follow the RX FIFO.
    pub rx_fifo_words: u16,
    pub np_tx_fifo_words: u16,
    pub periodic_tx_fifo_words: u16,
    /// PHY clocks per 1 ms frame.
    pub frame_interval: u16,
}

impl Default for Dwc2Config {
    fn default() -> Self {
        Self {
            transfer_timeout: Duration::from_millis(50),
            nak_retry_limit: 100,
            nak_retry_delay: Duration::from_millis(1),

            reset_hold: Duration::from_millis(60),
            reset_settle: Duration::from_millis(20),
            port_enable_timeout: Duration::from_millis(500),
            port_poll_interval: Duration::from_millis(10),
            address_settle: Duration::from_millis(10),

            power_settle: Duration::from_millis(50),
            ahb_idle_timeout: Duration::from_millis(100),
            core_reset_timeout: Duration::from_millis(100),
            core_reset_settle: Duration::from_millis(100),
            clock_ungate_settle: Duration::from_millis(10),
            force_host_settle: Duration::from_millis(50),
            host_mode_timeout: Duration::from_millis(100),
            fifo_flush_timeout: Duration::from_millis(10),
            port_power_settle: Duration::from_millis(100),

            sof_timeout: Duration::from_millis(3),
            tx_fifo_timeout: Duration::from_millis(10),
            channel_halt_timeout: Duration::from_millis(10),

            rx_fifo_words: 512,
            np_tx_fifo_words: 256,
            periodic_tx_fifo_words: 256,
            frame_interval: 48_000,
        }
    }
}
