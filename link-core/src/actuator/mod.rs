//! Two-position actuator with automatic return to neutral.
//!
//! Admitted triggers alternate the actuator between its minimum and maximum
//! positions; a toggled position is held until the next trigger. Explicit
//! position commands are clamped to the signal limits and decay back to
//! neutral after [`ActuatorConfig::neutral_timeout`] unless superseded.
//! Each admitted trigger also flashes the indicator.
//!
//! The controller is driven from a single task: commands arrive through an
//! [`ActuationSource`], timer expiry is checked with
//! [`ActuatorController::poll`], and [`ActuatorController::next_deadline`]
//! tells the runtime when to wake up next.

pub mod signal;
pub mod timer;

use core::fmt;
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};

use crate::config::ActuatorConfig;
use crate::time::LinkInstant;

use self::timer::{IndicatorBlink, NeutralTimer};

/// Servo pulse width in microseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseWidth(u16);

impl PulseWidth {
    #[must_use]
    pub const fn from_micros(micros: u16) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn as_micros(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_micros(u64::from(self.0))
    }
}

impl fmt::Display for PulseWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Logical actuator position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorState {
    Neutral,
    AtMin,
    AtMax,
    /// Explicit position that matches none of the named ones.
    Holding(PulseWidth),
}

impl ActuatorState {
    /// Names the position `pulse` corresponds to under `config`.
    #[must_use]
    pub fn classify(pulse: PulseWidth, config: &ActuatorConfig) -> Self {
        if pulse == config.center {
            Self::Neutral
        } else if pulse == config.min {
            Self::AtMin
        } else if pulse == config.max {
            Self::AtMax
        } else {
            Self::Holding(pulse)
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::AtMin => "at-min",
            Self::AtMax => "at-max",
            Self::Holding(_) => "holding",
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Holding(pulse) => write!(f, "holding {pulse}"),
            other => f.write_str(other.label()),
        }
    }
}

/// End of travel targeted by the next toggle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    Min,
    Max,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Min => Side::Max,
            Side::Max => Side::Min,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Side::Min => "min",
            Side::Max => "max",
        }
    }

    const fn pulse(self, config: &ActuatorConfig) -> PulseWidth {
        match self {
            Side::Min => config.min,
            Side::Max => config.max,
        }
    }
}

/// Work items accepted by the actuator task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorCommand {
    /// Admitted press; swings to the other end of travel.
    Toggle { counter: u8 },
    /// Direct position request, clamped and timed back to neutral.
    SetPosition(PulseWidth),
    /// Immediate return to neutral.
    ReturnToNeutral,
}

/// Depth of the queue between the receive gate and the actuator task.
pub const ACTUATION_QUEUE_DEPTH: usize = 4;

/// Bounded FIFO carrying actuator commands.
pub type ActuationQueue<M> = Channel<M, ActuatorCommand, ACTUATION_QUEUE_DEPTH>;

/// Error surfaced when a command cannot be queued.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnqueueError {
    /// Queue has reached its maximum capacity.
    QueueFull,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::QueueFull => f.write_str("actuation queue full"),
        }
    }
}

/// Producer side of the actuation queue.
pub trait ActuationSink {
    /// Attempts to enqueue a command without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::QueueFull`] when no slot is free.
    fn try_enqueue(&mut self, command: ActuatorCommand) -> Result<(), EnqueueError>;
}

impl<M: RawMutex, const N: usize> ActuationSink for Sender<'_, M, ActuatorCommand, N> {
    fn try_enqueue(&mut self, command: ActuatorCommand) -> Result<(), EnqueueError> {
        self.try_send(command)
            .map_err(|TrySendError::Full(_)| EnqueueError::QueueFull)
    }
}

/// Consumer side of the actuation queue.
pub trait ActuationSource {
    /// Returns the next queued command, if any.
    fn try_dequeue(&mut self) -> Option<ActuatorCommand>;
}

impl<M: RawMutex, const N: usize> ActuationSource for Receiver<'_, M, ActuatorCommand, N> {
    fn try_dequeue(&mut self) -> Option<ActuatorCommand> {
        self.try_receive().ok()
    }
}

/// Failure to bring up the servo output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    OutputUnavailable,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::OutputUnavailable => f.write_str("servo output unavailable"),
        }
    }
}

/// Hardware seam for the servo control signal.
pub trait ServoOutput {
    /// Prepares the output. Called once from [`ActuatorController::init`].
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError`] when the output cannot be driven.
    fn enable(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }

    /// Starts emitting `pulse` on every subsequent frame.
    fn drive_signal(&mut self, pulse: PulseWidth);
}

/// Hardware seam for the trigger indicator.
pub trait Indicator {
    fn set_indicator(&mut self, lit: bool);
}

/// Indicator used when the board has none.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set_indicator(&mut self, _lit: bool) {}
}

/// Read-only view of the controller for status reporting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorStatus {
    pub ready: bool,
    pub state: ActuatorState,
    pub pulse: PulseWidth,
    pub next_side: Side,
    pub neutral_in: Option<Duration>,
    pub indicator_active: bool,
}

/// Owns the servo output and indicator and applies actuator commands.
pub struct ActuatorController<S, D, I> {
    servo: S,
    indicator: D,
    config: ActuatorConfig,
    ready: bool,
    state: ActuatorState,
    pulse: PulseWidth,
    next_side: Side,
    neutral: NeutralTimer<I>,
    blink: IndicatorBlink<I>,
}

impl<S, D, I> ActuatorController<S, D, I>
where
    S: ServoOutput,
    D: Indicator,
    I: LinkInstant,
{
    /// Creates an uninitialised controller; commands are ignored until
    /// [`init`](Self::init) succeeds.
    #[must_use]
    pub fn new(servo: S, indicator: D, config: ActuatorConfig) -> Self {
        Self {
            servo,
            indicator,
            ready: false,
            state: ActuatorState::Neutral,
            pulse: config.center,
            next_side: Side::Min,
            neutral: NeutralTimer::new(),
            blink: IndicatorBlink::new(
                config.indicator_flashes,
                config.indicator_on,
                config.indicator_off,
            ),
            config,
        }
    }

    /// Enables the servo output and parks it at neutral.
    ///
    /// # Errors
    ///
    /// Propagates the output failure; the controller then stays inert.
    pub fn init(&mut self) -> Result<(), ActuatorError> {
        if let Err(err) = self.servo.enable() {
            log_warn!("servo: output unavailable, actuator inert");
            return Err(err);
        }

        self.ready = true;
        self.indicator.set_indicator(false);
        self.move_to(self.config.center);
        log_info!("servo: ready at {} us", self.config.center.as_micros());
        Ok(())
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub const fn state(&self) -> ActuatorState {
        self.state
    }

    #[must_use]
    pub const fn pulse(&self) -> PulseWidth {
        self.pulse
    }

    #[must_use]
    pub const fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    /// Applies `command`, returning the resulting state when it took effect.
    pub fn handle(&mut self, command: ActuatorCommand, now: I) -> Option<ActuatorState> {
        match command {
            ActuatorCommand::Toggle { counter } => {
                log_debug!("servo: toggle for press {}", counter);
                self.admitted_trigger(now)
            }
            ActuatorCommand::SetPosition(pulse) => self.set_position(pulse, now),
            ActuatorCommand::ReturnToNeutral => self.return_to_neutral(),
        }
    }

    /// Swings to the other end of travel and holds there.
    pub fn admitted_trigger(&mut self, now: I) -> Option<ActuatorState> {
        if !self.ready {
            log_debug!("servo: trigger ignored, not ready");
            return None;
        }

        let side = self.next_side;
        self.next_side = side.opposite();
        self.neutral.cancel();
        self.move_to(side.pulse(&self.config));

        let lit = self.blink.start(now);
        self.indicator.set_indicator(lit);

        Some(self.state)
    }

    /// Moves to `pulse` (clamped) and arms the return to neutral.
    pub fn set_position(&mut self, pulse: PulseWidth, now: I) -> Option<ActuatorState> {
        if !self.ready {
            log_debug!("servo: position ignored, not ready");
            return None;
        }

        let clamped = self.config.clamp(pulse);
        if clamped != pulse {
            log_warn!(
                "servo: {} us clamped to {} us",
                pulse.as_micros(),
                clamped.as_micros()
            );
        }
        self.move_to(clamped);
        self.neutral.arm(now, self.config.neutral_timeout);

        Some(self.state)
    }

    /// Moves to neutral and cancels any pending return.
    pub fn return_to_neutral(&mut self) -> Option<ActuatorState> {
        if !self.ready {
            return None;
        }

        self.neutral.cancel();
        self.move_to(self.config.center);
        Some(self.state)
    }

    /// Fires expired timers. Returns `true` when the neutral timer fired.
    pub fn poll(&mut self, now: I) -> bool {
        let fired = self.neutral.expire(now);
        if fired {
            log_info!("servo: neutral timeout");
            self.move_to(self.config.center);
        }

        if let Some(lit) = self.blink.poll(now) {
            self.indicator.set_indicator(lit);
        }

        fired
    }

    /// Applies every queued command, then fires expired timers.
    ///
    /// A toggle that arrives in the same step as the neutral deadline cancels
    /// the return. Returns the number of commands applied.
    pub fn service<Q: ActuationSource>(&mut self, source: &mut Q, now: I) -> usize {
        let mut applied = 0;
        while let Some(command) = source.try_dequeue() {
            self.handle(command, now);
            applied += 1;
        }

        self.poll(now);
        applied
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<I> {
        match (self.neutral.deadline(), self.blink.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    #[must_use]
    pub fn status(&self, now: I) -> ActuatorStatus {
        ActuatorStatus {
            ready: self.ready,
            state: self.state,
            pulse: self.pulse,
            next_side: self.next_side,
            neutral_in: self.neutral.remaining(now),
            indicator_active: self.blink.is_active(),
        }
    }

    fn move_to(&mut self, pulse: PulseWidth) {
        self.servo.drive_signal(pulse);
        self.pulse = pulse;
        self.state = ActuatorState::classify(pulse, &self.config);
        log_info!("servo: moved to {} us", pulse.as_micros());
    }
}
