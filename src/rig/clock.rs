//! Injectable clock and sleep.
//!
//! Hold durations and the camera-settle delay are timing contracts, so they
//! go through this seam instead of bare `thread::sleep`. Tests swap in a
//! fake that advances virtually and records every sleep.

use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);
}

/// Wall-clock implementation used by the running rig.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}
