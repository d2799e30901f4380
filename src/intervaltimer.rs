use std::thread;
use std::time::{Duration, Instant};

/// Paces the caller-owned main loop
pub struct IntervalTimer {
    interval: Duration,
    last_tick: Instant,
    measure_rate: bool,
    last_rate_print: Instant,
    ticks: u32,
}

impl IntervalTimer {
    pub fn new(interval: Duration, measure_rate: bool) -> IntervalTimer {
        IntervalTimer {
            interval,
            last_tick: Instant::now(),
            measure_rate,
            last_rate_print: Instant::now(),
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps until the next tick is due and returns the time that passed
    /// since the previous one
    pub fn sleep_until_next_tick(&mut self) -> Duration {
        if self.measure_rate {
            self.update_rate();
        }

        let now = Instant::now();
        let next_tick = if self.last_tick + self.interval > now {
            self.last_tick + self.interval
        } else {
            log::debug!("Main loop skipped a tick");
            now + self.interval
        };

        thread::sleep(next_tick.saturating_duration_since(Instant::now()));
        let elapsed = next_tick.saturating_duration_since(self.last_tick);
        self.last_tick = next_tick;
        elapsed
    }

    fn update_rate(&mut self) {
        self.ticks += 1;

        if Instant::now() - self.last_rate_print > Duration::from_secs(1) {
            log::trace!("Ticks per second: {}", self.ticks);
            self.ticks = 0;
            self.last_rate_print = Instant::now();
        }
    }
}
