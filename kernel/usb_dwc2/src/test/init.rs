use std::time::Duration;

use super::sim::{SimController, DWC2_CORE_ID};
use super::*;
use crate::regs::{offset, ChannelInterrupts};
use crate::{AlwaysPowered, PowerController, UsbError};

struct RefusingPower;

impl PowerController for RefusingPower {
    fn power_on_usb(&mut self) -> crate::Result<()> {
        Err(UsbError::PowerOnFailed)
    }
}

#[test]
fn test_init_configures_host_mode() {
    let sim = SimController::new();
    // left in device mode by the firmware
    sim.state().preset(offset::GUSBCFG, 1 << 30);
    let host = host(&sim);

    assert_eq!(host.init(&mut AlwaysPowered), Ok(()));
    assert_eq!(host.version(), DWC2_CORE_ID);

    let s = sim.state();
    let usb_config = s.reg(offset::GUSBCFG);
    assert_ne!(usb_config & (1 << 29), 0, "force host");
    assert_ne!(usb_config & (1 << 6), 0, "full-speed PHY");
    assert_eq!(usb_config & (1 << 30), 0, "force device cleared");

    assert_eq!(s.reg(offset::GRXFSIZ), 512);
    assert_eq!(s.reg(offset::GNPTXFSIZ), (256 << 16) | 512);
    assert_eq!(s.reg(offset::HPTXFSIZ), (256 << 16) | 768);
    assert_eq!(s.reg(offset::HCFG), 1);
    assert_eq!(s.reg(offset::HFIR), 48_000);
    assert_eq!(s.reg(offset::HAINTMSK), 0xFF);
    assert_eq!(s.reg(offset::GINTMSK), (1 << 3) | (1 << 4) | (1 << 24) | (1 << 25));
    assert_eq!(s.reg(offset::GAHBCFG), 1);
    assert_eq!(s.reg(offset::PCGCCTL), 0);
    assert!(s.wrote(offset::PCGCCTL));
    for channel in 0..8 {
        assert_eq!(s.channel_mask(channel), ChannelInterrupts::ARMED.bits());
    }
    assert!(s.port.powered);
    assert!(!s.port.disabled_by_write);
}

/// Core reset comes first, then a flush of all TX FIFOs, then the RX FIFO.
#[test]
fn test_init_reset_sequence() {
    let sim = SimController::new();
    let host = host(&sim);
    host.init(&mut AlwaysPowered).unwrap();

    let resets: Vec<u32> = sim
        .state()
        .writes
        .iter()
        .filter(|(o, _)| *o == offset::GRSTCTL)
        .map(|(_, v)| *v)
        .collect();
    assert_eq!(resets, [1, (1 << 5) | (0x10 << 6), 1 << 4]);
}

/// Reset and flush bits that never clear only cost time, init still
/// completes.
#[test]
fn test_init_survives_stuck_reset_control() {
    let sim = SimController::new();
    // AHB busy, soft reset and both flushes stuck
    sim.state().reset_control = (1 << 0) | (1 << 4) | (1 << 5);
    let host = host(&sim);

    assert_eq!(host.init(&mut AlwaysPowered), Ok(()));
    let config = host.config();
    assert!(
        sim.elapsed()
            >= config.ahb_idle_timeout + config.core_reset_timeout + config.fifo_flush_timeout * 2
    );

    let s = sim.state();
    assert_eq!(s.reg(offset::GAHBCFG), 1);
    assert!(s.port.powered);
}

#[test]
fn test_init_rejects_other_cores() {
    let sim = SimController::new();
    sim.state().core_id = 0x1234_5000;
    let host = host(&sim);

    assert_eq!(host.init(&mut AlwaysPowered), Err(UsbError::UnknownController(0x1234_5000)));
    assert!(sim.state().writes.is_empty());
}

#[test]
fn test_init_needs_power() {
    let sim = SimController::new();
    let host = host(&sim);

    assert_eq!(host.init(&mut RefusingPower), Err(UsbError::PowerOnFailed));
    assert!(sim.state().writes.is_empty());
}

#[test]
fn test_start_brings_up_gamepad() {
    let sim = SimController::new();
    let host = host(&sim);
    let mut state = HostControllerState::new();

    assert_eq!(host.start(&mut state, &mut AlwaysPowered, Duration::from_millis(500)), Ok(()));
    assert!(state.is_enumerated());
    assert_eq!(sim.state().device.idle_rate, Some(0));
}

#[test]
fn test_start_without_device() {
    let sim = SimController::new();
    sim.state().port.attached = false;
    let host = host(&sim);
    let mut state = HostControllerState::new();

    assert_eq!(host.start(&mut state, &mut AlwaysPowered, Duration::from_millis(50)), Err(UsbError::NoDevice));
    assert!(!state.is_enumerated());
}

#[test]
fn test_start_waits_without_limit() {
    let sim = SimController::new();
    let host = host(&sim);
    let mut state = HostControllerState::new();

    assert_eq!(host.start(&mut state, &mut AlwaysPowered, Duration::MAX), Ok(()));
    assert!(state.is_enumerated());
}
