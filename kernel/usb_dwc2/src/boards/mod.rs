//! Per-board peripheral addresses.
//!
//! | Feature | SoC | Peripheral base |
//! | --- | --- | --- |
//! | rpi3 (default) | BCM2837 (Pi Zero 2 W, Pi 3) | 0x3F00_0000 |
//! | rpi4 | BCM2711 | 0xFE00_0000 |

#[derive(Debug, Copy, Clone)]
pub struct BoardConfig {
    pub name: &'static str,
    pub peripheral_base: usize,
    pub usb_base: usize,
    pub mailbox_base: usize,
    pub system_timer_base: usize,
}

impl BoardConfig {
    const fn broadcom(name: &'static str, peripheral_base: usize) -> Self {
        Self {
            name,
            peripheral_base,
            usb_base: peripheral_base + 0x98_0000,
            mailbox_base: peripheral_base + 0xB880,
            system_timer_base: peripheral_base + 0x3000,
        }
    }
}

#[cfg_attr(feature = "rpi4", path = "rpi4.rs")]
#[cfg_attr(not(feature = "rpi4"), path = "rpi3.rs")]
mod board;

pub use board::CURRENT;
