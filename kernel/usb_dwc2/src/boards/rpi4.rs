//! Raspberry Pi 4, low peripheral mode.

use super::BoardConfig;

pub const CURRENT: BoardConfig = BoardConfig::broadcom("Raspberry Pi 4", 0xFE00_0000);
