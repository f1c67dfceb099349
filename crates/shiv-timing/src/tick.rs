//! Fixed-rate tick accumulation for the host loop.

use std::time::Duration;

/// Default tick rate in Hz for the authority loop.
pub const TICK_RATE: u32 = 60;

/// Accumulates real elapsed time and yields discrete ticks at a fixed rate.
pub struct TickSchedule {
    accumulator: Duration,
    tick_duration: Duration,
    total_ticks: u64,
}

impl TickSchedule {
    /// Creates a schedule at the default [`TICK_RATE`].
    pub fn new() -> Self {
        Self::with_tick_rate(TICK_RATE)
    }

    /// Creates a schedule with a custom tick rate.
    pub fn with_tick_rate(hz: u32) -> Self {
        Self {
            accumulator: Duration::ZERO,
            tick_duration: Duration::from_nanos(1_000_000_000 / hz.max(1) as u64),
            total_ticks: 0,
        }
    }

    /// Accumulates elapsed time and returns the number of ticks to process.
    pub fn accumulate(&mut self, dt: Duration) -> u32 {
        self.accumulator += dt;
        let mut ticks = 0u32;
        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.total_ticks += 1;
            ticks += 1;
        }
        ticks
    }

    /// Total ticks processed since creation.
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// The duration of one tick.
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_whole_ticks() {
        let mut schedule = TickSchedule::new();
        let tick = schedule.tick_duration();

        for _ in 0..60 {
            assert_eq!(schedule.accumulate(tick), 1);
        }
        assert_eq!(schedule.total_ticks(), 60);
    }

    #[test]
    fn test_fractional_ticks_carry_over() {
        let mut schedule = TickSchedule::with_tick_rate(10);
        assert_eq!(schedule.accumulate(Duration::from_millis(40)), 0);
        assert_eq!(schedule.accumulate(Duration::from_millis(70)), 1);
        assert_eq!(schedule.total_ticks(), 1);
    }

    #[test]
    fn test_large_step_yields_multiple_ticks() {
        let mut schedule = TickSchedule::with_tick_rate(100);
        assert_eq!(schedule.accumulate(Duration::from_millis(35)), 3);
    }
}
