//! Time source abstraction so the coordinator's backoff sequence can be tested deterministically
//! without sleeping in real time.

use std::time::Duration;

pub trait Clock {
    fn sleep(&mut self, d: Duration);
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Records requested sleeps instead of actually sleeping, for exercising backoff growth in tests.
#[derive(Default)]
pub struct FakeClock {
    pub sleeps: Vec<Duration>,
}

impl Clock for FakeClock {
    fn sleep(&mut self, d: Duration) {
        self.sleeps.push(d);
    }
}
