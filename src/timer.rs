/// A periodic task driven by the simulation clock. It fires at most once per poll and is
/// rescheduled relative to the time it fired, like a loop that waits between iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicTimer {
    interval: f64,
    next_fire: f64,
}

// Absorbs accumulated floating point error in the clock.
const EPSILON: f64 = 1e-9;

impl PeriodicTimer {
    /// A timer whose first firing happens at `now`.
    pub fn immediate(interval: f32, now: f64) -> Self {
        Self { interval: interval as f64, next_fire: now }
    }

    /// A timer whose first firing happens one interval after `now`.
    pub fn delayed(interval: f32, now: f64) -> Self {
        Self { interval: interval as f64, next_fire: now + interval as f64 }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn next_fire(&self) -> f64 {
        self.next_fire
    }

    pub fn is_due(&self, now: f64) -> bool {
        now + EPSILON >= self.next_fire
    }

    /// Returns true and reschedules if the timer is due.
    pub fn poll(&mut self, now: f64) -> bool {
        if self.is_due(now) {
            self.next_fire = now + self.interval;
            true
        } else {
            false
        }
    }

    /// Changes the interval and schedules the next firing one new interval after `now`.
    pub fn reschedule(&mut self, interval: f32, now: f64) {
        self.interval = interval as f64;
        self.next_fire = now + self.interval;
    }

    /// Makes the timer due on the next poll.
    pub fn expedite(&mut self) {
        self.next_fire = f64::NEG_INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut timer = PeriodicTimer::immediate(0.1, 0.0);
        let dt = 0.02;
        let mut fired = 0;
        for step in 0..50 {
            if timer.poll(step as f64 * dt) {
                fired += 1;
            }
        }
        // t = 0.0, 0.1, ..., 0.9
        assert_eq!(fired, 10);
    }

    #[test]
    fn delayed_timer_waits_one_interval() {
        let mut timer = PeriodicTimer::delayed(1.0, 0.0);
        assert!(!timer.poll(0.5));
        assert!(timer.poll(1.0));
        assert!(!timer.poll(1.5));
    }

    #[test]
    fn expedite_forces_next_poll() {
        let mut timer = PeriodicTimer::delayed(3.0, 0.0);
        timer.expedite();
        assert!(timer.poll(0.02));
        assert!((timer.next_fire() - 3.02).abs() < 1e-9);
    }
}
