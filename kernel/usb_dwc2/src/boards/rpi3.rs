//! Raspberry Pi Zero 2 W and Raspberry Pi 3.

use super::BoardConfig;

pub const CURRENT: BoardConfig = BoardConfig::broadcom("Raspberry Pi Zero 2 W", 0x3F00_0000);
