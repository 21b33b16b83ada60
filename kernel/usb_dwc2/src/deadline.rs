use core::time::Duration;

use crate::hal::MonotonicClock;

/// A point in time after which a bounded wait gives up.
///
/// A timeout too large to be represented, such as `Duration::MAX`, never
/// expires.
pub struct Deadline<'c, C: MonotonicClock + ?Sized> {
    clock: &'c C,
    expires_at: Option<Duration>,
}

impl<'c, C: MonotonicClock + ?Sized> Deadline<'c, C> {
    pub fn after(clock: &'c C, timeout: Duration) -> Self {
        Self {
            expires_at: clock.now().checked_add(timeout),
            clock,
        }
    }

    pub fn expired(&self) -> bool {
        self.expires_at.map_or(false, |end| self.clock.now() >= end)
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at
            .map_or(Duration::MAX, |end| end.saturating_sub(self.clock.now()))
    }
}

/// Spins until `$cond` holds or `$timeout` elapses on `$clock`.
///
/// Evaluates to `Ok(())` if the condition was met, or to an error naming the
/// wait otherwise. The condition is always checked once more after expiry.
macro_rules! try_wait_until {
    ($clock:expr, $timeout:expr, $what:literal, $cond:expr) => {{
        let deadline = $crate::deadline::Deadline::after($clock, $timeout);
        loop {
            if $cond {
                break Ok(());
            }
            if deadline.expired() {
                break if $cond {
                    Ok(())
                } else {
                    log::debug!("[USB-DWC2] line {}: {} timed out", line!(), $what);
                    Err(concat!("[USB-DWC2] timed out waiting for ", $what))
                };
            }
            core::hint::spin_loop();
        }
    }};
}
