//! Frame pacing on a coarse tick grid.
//!
//! Deadlines are computed in 10 ms ticks, but the requested frame rate
//! rarely divides into whole ticks. The pacer carries the fractional
//! milliseconds across frames, so a 30 Hz target alternates 3- and 4-tick
//! sleeps and stays at 30 Hz in the mean. Every deadline advances from
//! the previous one, never from "now": a late frame does not shift the
//! whole schedule.

/// Scheduler tick length in milliseconds.
pub const TICK_MS: u64 = 10;

/// How a frame met its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    OnTime,
    /// More than two ticks behind schedule; skip rendering and re-arm.
    Late,
}

#[derive(Debug)]
pub struct Pacer {
    carry_ms: f64,
    deadline: u64,
    last_interval: u64,
}

impl Pacer {
    /// `now` is the current tick count.
    pub fn new(now: u64) -> Self {
        Pacer { carry_ms: 0.0, deadline: now, last_interval: 0 }
    }

    /// Compute the next deadline tick for a frame interval in
    /// milliseconds. Always at least one tick after the previous
    /// deadline.
    pub fn schedule(&mut self, interval_ms: f64) -> u64 {
        self.carry_ms += interval_ms;
        let mut ticks = (self.carry_ms / TICK_MS as f64) as u64;
        self.carry_ms -= (ticks * TICK_MS) as f64;
        if ticks < 1 {
            ticks = 1;
        }
        self.deadline += ticks;
        self.last_interval = ticks;
        self.deadline
    }

    /// Classify the wakeup at tick `now` against the current deadline.
    pub fn classify(&self, now: u64) -> Pace {
        if self.deadline + self.last_interval < now {
            return Pace::Late;
        }
        if now > self.deadline && now - self.deadline > 2 {
            return Pace::Late;
        }
        Pace::OnTime
    }

    /// Re-anchor after a stall so the backlog is not replayed.
    pub fn reanchor(&mut self, now: u64) {
        self.deadline = now;
        self.carry_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_rates_use_whole_ticks() {
        let mut pacer = Pacer::new(0);
        // 50 Hz = 20 ms = 2 ticks.
        assert_eq!(pacer.schedule(20.0), 2);
        assert_eq!(pacer.schedule(20.0), 4);
        assert_eq!(pacer.schedule(20.0), 6);
    }

    #[test]
    fn fractional_rates_average_out() {
        let mut pacer = Pacer::new(0);
        // 30 Hz = 33.33 ms: sleeps of 3 and 4 ticks mixing to 10/3.
        let mut last = 0;
        let mut total = 0;
        for _ in 0..30 {
            let d = pacer.schedule(1000.0 / 30.0);
            total += d - last;
            last = d;
        }
        // 30 frames in one second, within one tick of slack.
        assert!((99..=101).contains(&total), "total {total}");
    }

    #[test]
    fn interval_is_at_least_one_tick() {
        let mut pacer = Pacer::new(5);
        // 500 Hz asks for 2 ms, below the grid.
        assert_eq!(pacer.schedule(2.0), 6);
        assert_eq!(pacer.schedule(2.0), 7);
    }

    #[test]
    fn lateness_classification() {
        let mut pacer = Pacer::new(0);
        let deadline = pacer.schedule(20.0);

        assert_eq!(pacer.classify(deadline), Pace::OnTime);
        assert_eq!(pacer.classify(deadline + 2), Pace::OnTime);
        assert_eq!(pacer.classify(deadline + 3), Pace::Late);
    }

    #[test]
    fn reanchor_forgets_the_backlog() {
        let mut pacer = Pacer::new(0);
        pacer.schedule(20.0);
        pacer.reanchor(100);
        assert_eq!(pacer.schedule(20.0), 102);
        assert_eq!(pacer.classify(102), Pace::OnTime);
    }
}
