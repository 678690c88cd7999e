//! Compile-time tunables grouped per component.
//!
//! Every component takes its configuration by value at construction so the
//! firmware can keep the defaults while tests and the emulator override
//! individual fields.

use core::time::Duration;

use crate::actuator::PulseWidth;
pub use crate::gate::AdmissionPolicy;

/// Period between debounce scans.
pub const DEBOUNCE_SCAN_PERIOD: Duration = Duration::from_millis(5);
/// Consecutive disagreeing scans required before a level change is accepted.
pub const DEBOUNCE_THRESHOLD: u8 = 10;

/// Pulse width that swings the actuator to its minimum position.
pub const PULSE_MIN: PulseWidth = PulseWidth::from_micros(1_100);
/// Pulse width that holds the actuator at neutral.
pub const PULSE_CENTER: PulseWidth = PulseWidth::from_micros(1_500);
/// Pulse width that swings the actuator to its maximum position.
pub const PULSE_MAX: PulseWidth = PulseWidth::from_micros(1_650);
/// Lowest pulse width the signal generator will emit.
pub const PULSE_LIMIT_LOW: PulseWidth = PulseWidth::from_micros(1_000);
/// Highest pulse width the signal generator will emit.
pub const PULSE_LIMIT_HIGH: PulseWidth = PulseWidth::from_micros(2_000);
/// Servo frame period.
pub const SERVO_FRAME: Duration = Duration::from_millis(20);
/// Delay before a commanded position decays back to neutral.
pub const NEUTRAL_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Indicator flashes shown on each admitted trigger.
pub const INDICATOR_FLASHES: u8 = 3;
/// Indicator on-time per flash.
pub const INDICATOR_ON: Duration = Duration::from_millis(100);
/// Indicator off-time per flash.
pub const INDICATOR_OFF: Duration = Duration::from_millis(100);

/// Cooldown window used by the cooldown admission policies.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1_500);

/// Length of the ranging burst opened by each transmitted press.
pub const RANGING_BURST_WINDOW: Duration = Duration::from_secs(5);

/// Debounce parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceConfig {
    pub scan_period: Duration,
    pub threshold: u8,
}

impl DebounceConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scan_period: DEBOUNCE_SCAN_PERIOD,
            threshold: DEBOUNCE_THRESHOLD,
        }
    }

    /// Minimum time a level must hold before it is reported.
    #[must_use]
    pub fn settle_time(&self) -> Duration {
        self.scan_period * u32::from(self.threshold)
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Actuator positions, limits and timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorConfig {
    pub min: PulseWidth,
    pub center: PulseWidth,
    pub max: PulseWidth,
    pub limit_low: PulseWidth,
    pub limit_high: PulseWidth,
    pub frame: Duration,
    pub neutral_timeout: Duration,
    pub indicator_flashes: u8,
    pub indicator_on: Duration,
    pub indicator_off: Duration,
}

impl ActuatorConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min: PULSE_MIN,
            center: PULSE_CENTER,
            max: PULSE_MAX,
            limit_low: PULSE_LIMIT_LOW,
            limit_high: PULSE_LIMIT_HIGH,
            frame: SERVO_FRAME,
            neutral_timeout: NEUTRAL_TIMEOUT,
            indicator_flashes: INDICATOR_FLASHES,
            indicator_on: INDICATOR_ON,
            indicator_off: INDICATOR_OFF,
        }
    }

    /// Restricts `pulse` to the configured signal limits.
    #[must_use]
    pub fn clamp(&self, pulse: PulseWidth) -> PulseWidth {
        pulse.clamp(self.limit_low, self.limit_high)
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level configuration bundle for a device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkConfig {
    pub debounce: DebounceConfig,
    pub actuator: ActuatorConfig,
    pub admission: AdmissionPolicy,
    pub burst_window: Duration,
}

impl LinkConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            debounce: DebounceConfig::new(),
            actuator: ActuatorConfig::new(),
            admission: AdmissionPolicy::Dedup,
            burst_window: RANGING_BURST_WINDOW,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_settles_after_fifty_milliseconds() {
        assert_eq!(DebounceConfig::new().settle_time(), Duration::from_millis(50));
    }

    #[test]
    fn clamp_limits_pulse_to_signal_range() {
        let config = ActuatorConfig::new();
        assert_eq!(config.clamp(PulseWidth::from_micros(500)), PULSE_LIMIT_LOW);
        assert_eq!(config.clamp(PulseWidth::from_micros(2_400)), PULSE_LIMIT_HIGH);
        assert_eq!(config.clamp(PULSE_MAX), PULSE_MAX);
    }

    #[test]
    fn positions_sit_inside_limits() {
        let config = ActuatorConfig::new();
        for pulse in [config.min, config.center, config.max] {
            assert!(pulse >= config.limit_low && pulse <= config.limit_high);
        }
        assert_eq!(LinkConfig::new().admission, AdmissionPolicy::Dedup);
    }
}
