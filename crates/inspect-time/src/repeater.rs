use std::time::{Duration, Instant};

/// Fires at most once per `interval`, gating the caller from acting again
/// until enough wall-clock time has elapsed since the last fire.
///
/// `std::time::Instant` has no zero sentinel, so "never fired" is tracked
/// with `None` and treated as infinitely overdue.
#[derive(Clone, Copy, Debug)]
pub struct Repeater {
    interval: Duration,
    last_acted: Option<Instant>,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Duration) -> Self {
        Self { interval, last_acted: None }
    }

    #[inline]
    pub fn maybe<F>(&mut self, mut f: F)
    where
        F: FnMut(Duration),
    {
        let Some(elapsed) = self.elapsed_since_last() else {
            f(Duration::MAX);
            self.last_acted = Some(Instant::now());
            return;
        };
        if elapsed >= self.interval {
            f(elapsed);
            self.last_acted = Some(Instant::now());
        }
    }

    /// Read-only check: would `fired()` return `true` right now? Does not
    /// arm or otherwise mutate the gate, so a caller can test elapsed time
    /// without committing to a fire.
    #[inline]
    pub fn is_due(&self) -> bool {
        match self.elapsed_since_last() {
            None => true,
            Some(elapsed) => elapsed >= self.interval,
        }
    }

    #[inline]
    pub fn fired(&mut self) -> bool {
        match self.elapsed_since_last() {
            None => {
                self.last_acted = Some(Instant::now());
                true
            }
            Some(elapsed) if elapsed >= self.interval => {
                self.last_acted = Some(Instant::now());
                true
            }
            Some(_) => false,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn reset(&mut self) {
        self.last_acted = Some(Instant::now());
    }

    pub fn force_fire(&mut self) {
        self.last_acted = None;
    }

    fn elapsed_since_last(&self) -> Option<Duration> {
        self.last_acted.map(|t| t.elapsed())
    }
}

impl Default for Repeater {
    fn default() -> Self {
        Self::every(Duration::ZERO)
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use super::Repeater;

    #[test]
    fn fires_immediately_before_first_act() {
        let mut r = Repeater::every(Duration::from_secs(3600));
        assert!(r.fired());
    }

    #[test]
    fn does_not_refire_inside_interval() {
        let mut r = Repeater::every(Duration::from_millis(500));
        assert!(r.fired());
        assert!(!r.fired());
    }

    #[test]
    fn refires_after_interval_elapses() {
        let mut r = Repeater::every(Duration::from_millis(10));
        assert!(r.fired());
        thread::sleep(Duration::from_millis(20));
        assert!(r.fired());
    }

    #[test]
    fn force_fire_resets_gate() {
        let mut r = Repeater::every(Duration::from_secs(3600));
        assert!(r.fired());
        assert!(!r.fired());
        r.force_fire();
        assert!(r.fired());
    }

    #[test]
    fn is_due_does_not_mutate_the_gate() {
        let r = Repeater::every(Duration::from_secs(3600));
        assert!(r.is_due());
        assert!(r.is_due());
    }
}
