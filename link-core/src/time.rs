//! Monotonic time abstraction used by the timed components.

use core::ops::Add;
use core::time::Duration;

/// Monotonic timestamp accepted by the debouncer-free timed components
/// (admission cooldown, neutral timer, indicator blink).
///
/// Firmware wraps `embassy_time::Instant`; tests and the emulator use a
/// plain microsecond counter.
pub trait LinkInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}
