//! Scenario tests that run the driver against [`sim::SimController`].

mod sim;

mod init;

use std::vec::Vec;

use crate::regs::Pid;
use crate::request::Direction;
use crate::{Dwc2Host, HostControllerState};
use sim::{SimController, Transaction};

type SimHost<'s> = Dwc2Host<&'s SimController, &'s SimController>;

fn host(sim: &SimController) -> SimHost<'_> {
    Dwc2Host::new(sim, sim)
}

/// A reset port with a device that has not been addressed yet.
fn reset(host: &SimHost<'_>) -> HostControllerState {
    let mut state = HostControllerState::new();
    host.reset_port(&mut state).unwrap();
    state
}

/// A fully enumerated gamepad.
fn enumerated(host: &SimHost<'_>) -> HostControllerState {
    let mut state = reset(host);
    host.enumerate(&mut state).unwrap();
    state
}

/// Direction and PID of each logged transaction.
fn shape(log: &[Transaction]) -> Vec<(Direction, Pid)> {
    log.iter().map(|t| (t.direction, t.pid)).collect()
}
