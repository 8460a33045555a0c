//! Time sources used to measure the cost of each training phase.

use std::{cell::Cell, time::Instant};

/// A monotonic source of time, in seconds.
pub trait Clock {
    fn now(&self) -> f64;

    /// Returns the seconds elapsed since `start`, a previous reading of this clock.
    fn since(&self, start: f64) -> f64 {
        self.now() - start
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// The real, wall clock time.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A fake clock that advances a fixed `tick` every time it's read.
///
/// Makes every measured duration a multiple of `tick`, so runs are reproducible.
#[derive(Debug, Clone)]
pub struct StepClock {
    tick: f64,
    time: Cell<f64>,
}

impl StepClock {
    pub fn new(tick: f64) -> Self {
        Self {
            tick,
            time: Cell::new(0.0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> f64 {
        let now = self.time.get();
        self.time.set(now + self.tick);
        now
    }
}
