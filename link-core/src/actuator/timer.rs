//! Deadline-driven timers owned by the actuator controller.

use core::time::Duration;

use crate::time::LinkInstant;

/// One-shot timer that returns the actuator to neutral.
///
/// Re-arming replaces the deadline; cancelling is idempotent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NeutralTimer<I> {
    deadline: Option<I>,
}

impl<I: LinkInstant> NeutralTimer<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    pub fn arm(&mut self, now: I, after: Duration) {
        self.deadline = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<I> {
        self.deadline
    }

    #[must_use]
    pub fn remaining(&self, now: I) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Disarms and returns `true` when the deadline has passed.
    pub fn expire(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl<I: LinkInstant> Default for NeutralTimer<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking flash sequence for the trigger indicator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorBlink<I> {
    flashes: u8,
    on: Duration,
    off: Duration,
    lit: bool,
    edges_left: u8,
    next_edge: Option<I>,
}

impl<I: LinkInstant> IndicatorBlink<I> {
    #[must_use]
    pub const fn new(flashes: u8, on: Duration, off: Duration) -> Self {
        Self {
            flashes,
            on,
            off,
            lit: false,
            edges_left: 0,
            next_edge: None,
        }
    }

    /// Restarts the sequence at `now` and returns the level to apply
    /// immediately.
    pub fn start(&mut self, now: I) -> bool {
        if self.flashes == 0 {
            self.next_edge = None;
            self.edges_left = 0;
            self.lit = false;
            return false;
        }

        self.lit = true;
        self.edges_left = self.flashes.saturating_mul(2).saturating_sub(1);
        self.next_edge = Some(now + self.on);
        true
    }

    /// Returns the new level when an edge is due.
    pub fn poll(&mut self, now: I) -> Option<bool> {
        let due = self.next_edge?;
        if now < due {
            return None;
        }

        self.lit = !self.lit;
        self.edges_left = self.edges_left.saturating_sub(1);
        self.next_edge = if self.edges_left == 0 {
            None
        } else {
            Some(now + if self.lit { self.on } else { self.off })
        };
        Some(self.lit)
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<I> {
        self.next_edge
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.next_edge.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ops::Add;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + rhs.as_micros() as u64)
        }
    }

    impl LinkInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn neutral_timer_fires_once() {
        let mut timer = NeutralTimer::new();
        timer.arm(MockInstant(0), Duration::from_millis(2));

        assert_eq!(
            timer.remaining(MockInstant(500)),
            Some(Duration::from_micros(1_500))
        );
        assert!(!timer.expire(MockInstant(1_999)));
        assert!(timer.expire(MockInstant(2_000)));
        assert!(!timer.expire(MockInstant(3_000)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut timer = NeutralTimer::new();
        timer.cancel();
        timer.arm(MockInstant(0), Duration::from_millis(1));
        timer.cancel();
        timer.cancel();
        assert!(!timer.expire(MockInstant(10_000)));
    }

    #[test]
    fn late_poll_still_completes_sequence() {
        let mut blink = IndicatorBlink::new(2, Duration::from_millis(100), Duration::from_millis(50));
        assert!(blink.start(MockInstant(0)));

        assert_eq!(blink.poll(MockInstant(99_000)), None);
        assert_eq!(blink.poll(MockInstant(250_000)), Some(false));
        assert_eq!(blink.deadline(), Some(MockInstant(300_000)));
        assert_eq!(blink.poll(MockInstant(300_000)), Some(true));
        assert_eq!(blink.poll(MockInstant(400_000)), Some(false));
        assert!(!blink.is_active());
        assert_eq!(blink.poll(MockInstant(900_000)), None);
    }

    #[test]
    fn zero_flashes_never_lights() {
        let mut blink = IndicatorBlink::new(0, Duration::from_millis(100), Duration::from_millis(100));
        assert!(!blink.start(MockInstant(0)));
        assert_eq!(blink.poll(MockInstant(1_000_000)), None);
    }
}
