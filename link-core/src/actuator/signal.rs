//! Servo pulse-train generation.
//!
//! The controller publishes the commanded width into a [`CommandedPulse`];
//! the signal task reads it once per frame through a [`PulseTrain`]. The
//! width is a single atomic so a frame never observes a torn update.

use core::time::Duration;

use portable_atomic::{AtomicU16, Ordering};

use super::{PulseWidth, ServoOutput};
use crate::config::ActuatorConfig;

/// Frames between pulse-width diagnostics (one second at 50 Hz).
pub const DIAGNOSTIC_FRAME_INTERVAL: u32 = 50;

/// Pulse width shared between the controller and the signal generator.
#[derive(Debug)]
pub struct CommandedPulse {
    micros: AtomicU16,
}

impl CommandedPulse {
    #[must_use]
    pub const fn new(initial: PulseWidth) -> Self {
        Self {
            micros: AtomicU16::new(initial.as_micros()),
        }
    }

    pub fn store(&self, pulse: PulseWidth) {
        self.micros.store(pulse.as_micros(), Ordering::Release);
    }

    #[must_use]
    pub fn load(&self) -> PulseWidth {
        PulseWidth::from_micros(self.micros.load(Ordering::Acquire))
    }
}

impl ServoOutput for &CommandedPulse {
    fn drive_signal(&mut self, pulse: PulseWidth) {
        self.store(pulse);
    }
}

/// High and low phases of one servo frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseFrame {
    pub high: Duration,
    pub low: Duration,
}

/// Produces frame timings from the commanded pulse width.
pub struct PulseTrain<'a> {
    commanded: &'a CommandedPulse,
    config: ActuatorConfig,
    frames: u32,
}

impl<'a> PulseTrain<'a> {
    #[must_use]
    pub const fn new(commanded: &'a CommandedPulse, config: ActuatorConfig) -> Self {
        Self {
            commanded,
            config,
            frames: 0,
        }
    }

    /// Timings for the next frame. The width is clamped to the signal limits.
    pub fn next_frame(&mut self) -> PulseFrame {
        let pulse = self.config.clamp(self.commanded.load());
        let high = pulse.as_duration();
        let low = self.config.frame.saturating_sub(high);

        self.frames = self.frames.wrapping_add(1);
        if self.frames % DIAGNOSTIC_FRAME_INTERVAL == 0 {
            log_debug!(
                "servo: pulse {} us (frame {})",
                pulse.as_micros(),
                self.frames
            );
        }

        PulseFrame { high, low }
    }

    /// Frames generated so far.
    #[must_use]
    pub const fn frames(&self) -> u32 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_splits_period_around_pulse() {
        let commanded = CommandedPulse::new(PulseWidth::from_micros(1_500));
        let mut train = PulseTrain::new(&commanded, ActuatorConfig::new());

        let frame = train.next_frame();
        assert_eq!(frame.high, Duration::from_micros(1_500));
        assert_eq!(frame.low, Duration::from_micros(18_500));
        assert_eq!(frame.high + frame.low, Duration::from_millis(20));
    }

    #[test]
    fn frame_follows_latest_command_and_clamps() {
        let commanded = CommandedPulse::new(PulseWidth::from_micros(1_500));
        let mut train = PulseTrain::new(&commanded, ActuatorConfig::new());
        let mut output = &commanded;

        output.drive_signal(PulseWidth::from_micros(1_100));
        assert_eq!(train.next_frame().high, Duration::from_micros(1_100));

        commanded.store(PulseWidth::from_micros(2_600));
        assert_eq!(train.next_frame().high, Duration::from_micros(2_000));
        assert_eq!(train.frames(), 2);
    }
}
