use chrono::{Duration, NaiveDateTime};

use crate::config::TimeConfig;

/// A simulation clock that counts ticks over a fixed duration.
///
/// The `Clock` provides methods to advance tick-by-tick or run
/// a function at each tick until completion.
///
/// # Examples
///
/// ```
/// use hess_dispatch::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut ticks = Vec::new();
///
/// clock.run(|tick| ticks.push(tick));
/// assert_eq!(ticks, vec![0, 1, 2]);
/// ```
pub struct Clock {
    current: u64,
    total: u64,
}

impl Clock {
    /// Creates a new clock with a specified total number of ticks.
    pub fn new(total: u64) -> Self {
        Self { current: 0, total }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The current tick (starting from 0) before advancing
    /// * `None` - If the clock has reached its total ticks
    pub fn tick(&mut self) -> Option<u64> {
        if self.current < self.total {
            let tick = self.current;
            self.current += 1;
            Some(tick)
        } else {
            None
        }
    }

    /// Runs a function for each remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(u64)) {
        while let Some(tick) = self.tick() {
            f(tick);
        }
    }

    /// Runs a fallible function for each remaining tick, stopping at the first error.
    pub fn try_run<E>(&mut self, mut f: impl FnMut(u64) -> Result<(), E>) -> Result<(), E> {
        while let Some(tick) = self.tick() {
            f(tick)?;
        }
        Ok(())
    }
}

/// Maps scheduler time to wall-clock instants.
///
/// Scheduler time counts `time_resolution`-second units from `start`; one
/// controller tick spans `time_step_size` units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    start: NaiveDateTime,
    time_resolution: f64,
    time_step_size: u64,
}

impl SimClock {
    pub fn new(cfg: &TimeConfig) -> Self {
        Self {
            start: cfg.start,
            time_resolution: cfg.time_resolution,
            time_step_size: cfg.time_step_size,
        }
    }

    /// Wall-clock instant for scheduler time `time`.
    ///
    /// Saturates at `NaiveDateTime::MAX` instead of overflowing.
    pub fn instant_at(&self, time: u64) -> NaiveDateTime {
        let millis = (time as f64 * self.time_resolution * 1000.0).round();
        if !millis.is_finite() || millis >= i64::MAX as f64 {
            return NaiveDateTime::MAX;
        }
        self.start
            .checked_add_signed(Duration::milliseconds(millis as i64))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Wall-clock instant of controller tick `tick`.
    pub fn instant_of_tick(&self, tick: u64) -> NaiveDateTime {
        self.instant_at(tick.saturating_mul(self.time_step_size))
    }

    /// Seconds spanned by one tick.
    pub fn tick_seconds(&self) -> f64 {
        self.time_step_size as f64 * self.time_resolution
    }

    /// Scheduler time of the next invocation after `time`.
    pub fn next_time(&self, time: u64) -> u64 {
        time.saturating_add(self.time_step_size)
    }

    pub fn time_step_size(&self) -> u64 {
        self.time_step_size
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }
}
