//! Counter-based button debouncing.
//!
//! Buttons are sampled on a fixed scan period. A button's reported level
//! only flips after [`DebounceConfig::threshold`] consecutive scans disagree
//! with it. Edge interrupts call [`ButtonBank::note_edge`], which restarts
//! the count for that button so a bouncing contact must go quiet before its
//! new level is accepted.
//!
//! [`ButtonBank`] holds the per-button state in atomics so the edge path and
//! status readers only need a shared reference while the scanning
//! [`InputDebouncer`] owns the input hardware.

use core::fmt;

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::config::DebounceConfig;

/// Number of buttons wired to the initiator.
pub const BUTTON_COUNT: usize = 2;

/// Physical button identifiers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonId {
    Sw1,
    Sw2,
}

/// Buttons in scan order.
pub const ALL_BUTTONS: [ButtonId; BUTTON_COUNT] = [ButtonId::Sw1, ButtonId::Sw2];

impl ButtonId {
    /// Zero-based index used for state tables.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ButtonId::Sw1 => 0,
            ButtonId::Sw2 => 1,
        }
    }

    /// Maps an index back to a button.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ButtonId::Sw1),
            1 => Some(ButtonId::Sw2),
            _ => None,
        }
    }

    /// Board silkscreen label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ButtonId::Sw1 => "SW1",
            ButtonId::Sw2 => "SW2",
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input pin configuration failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// The pin could not be configured as a pulled-up input.
    PinConfig(ButtonId),
    /// Edge detection could not be armed for the pin.
    EdgeDetect(ButtonId),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::PinConfig(button) => write!(f, "{button} pin configuration failed"),
            InputError::EdgeDetect(button) => write!(f, "{button} edge detection unavailable"),
        }
    }
}

/// Hardware seam for sampling the button pins.
pub trait DigitalInput {
    /// Prepares the pins for sampling. Called once by [`InputDebouncer::new`].
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] when any pin cannot be configured; the
    /// debouncer then stays inert.
    fn configure(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    /// Returns `true` when `button` is physically pressed.
    ///
    /// Implementations translate the electrical level; active-low buttons
    /// with pull-ups report `true` for a low pin.
    fn read_digital(&mut self, button: ButtonId) -> bool;
}

/// Receives debounced level changes.
pub trait ButtonObserver {
    fn on_button_event(&mut self, button: ButtonId, is_pressed: bool);
}

impl<F> ButtonObserver for F
where
    F: FnMut(ButtonId, bool),
{
    fn on_button_event(&mut self, button: ButtonId, is_pressed: bool) {
        self(button, is_pressed);
    }
}

/// Debounced state of a single button.
#[derive(Debug)]
pub struct ButtonState {
    pressed: AtomicBool,
    unstable_ticks: AtomicU8,
}

impl ButtonState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pressed: AtomicBool::new(false),
            unstable_ticks: AtomicU8::new(0),
        }
    }

    /// Last confirmed level.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }

    /// Scans observed disagreeing with the confirmed level since the last
    /// reset.
    #[must_use]
    pub fn unstable_ticks(&self) -> u8 {
        self.unstable_ticks.load(Ordering::Relaxed)
    }
}

impl Default for ButtonState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared per-button debounce state.
#[derive(Debug)]
pub struct ButtonBank {
    states: [ButtonState; BUTTON_COUNT],
}

impl ButtonBank {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            states: [ButtonState::new(), ButtonState::new()],
        }
    }

    /// Returns the state slot for `button`.
    #[must_use]
    pub fn state(&self, button: ButtonId) -> &ButtonState {
        &self.states[button.as_index()]
    }

    /// Confirmed level of `button`.
    #[must_use]
    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.state(button).is_pressed()
    }

    /// Restarts the stability count for `button`.
    ///
    /// Safe to call from the edge interrupt path; only touches one atomic.
    pub fn note_edge(&self, button: ButtonId) {
        self.state(button).unstable_ticks.store(0, Ordering::Relaxed);
    }
}

impl Default for ButtonBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Scans the button inputs and reports debounced level changes.
pub struct InputDebouncer<'a, P, O> {
    bank: &'a ButtonBank,
    input: P,
    observer: Option<O>,
    config: DebounceConfig,
    init_error: Option<InputError>,
}

impl<'a, P, O> InputDebouncer<'a, P, O>
where
    P: DigitalInput,
    O: ButtonObserver,
{
    /// Configures `input` and binds it to `bank`.
    ///
    /// A configuration failure is logged and leaves the debouncer inert:
    /// scans become no-ops and no events are ever reported.
    pub fn new(bank: &'a ButtonBank, mut input: P, config: DebounceConfig) -> Self {
        let init_error = match input.configure() {
            Ok(()) => None,
            Err(err) => {
                log_warn!("btn: input configuration failed, debouncer inert ({})", err.code());
                Some(err)
            }
        };

        Self {
            bank,
            input,
            observer: None,
            config,
            init_error,
        }
    }

    /// Installs the single observer, replacing any previous one.
    pub fn register_observer(&mut self, observer: O) {
        self.observer = Some(observer);
    }

    /// Returns the configuration error when the debouncer is inert.
    #[must_use]
    pub fn init_error(&self) -> Option<InputError> {
        self.init_error
    }

    /// Returns `true` when input configuration failed.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.init_error.is_some()
    }

    /// Confirmed level of `button`.
    #[must_use]
    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.bank.is_pressed(button)
    }

    #[must_use]
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Mutable access to the input, used by runtimes that await edges on it.
    pub fn input_mut(&mut self) -> &mut P {
        &mut self.input
    }

    /// Samples every button once and reports confirmed transitions.
    ///
    /// Returns the number of transitions reported during this scan.
    pub fn scan(&mut self) -> usize {
        if self.is_inert() {
            return 0;
        }

        let mut reported = 0;
        for button in ALL_BUTTONS {
            let raw = self.input.read_digital(button);
            let state = self.bank.state(button);

            if raw == state.is_pressed() {
                state.unstable_ticks.store(0, Ordering::Relaxed);
                continue;
            }

            let ticks = state
                .unstable_ticks
                .fetch_add(1, Ordering::Relaxed)
                .saturating_add(1);
            if ticks < self.config.threshold {
                continue;
            }

            state.pressed.store(raw, Ordering::Relaxed);
            state.unstable_ticks.store(0, Ordering::Relaxed);
            reported += 1;

            if raw {
                log_info!("btn: {} PRESS", button.label());
            } else {
                log_info!("btn: {} RELEASE", button.label());
            }

            if let Some(observer) = self.observer.as_mut() {
                observer.on_button_event(button, raw);
            }
        }

        reported
    }
}

impl InputError {
    /// Compact numeric code used in log lines.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            InputError::PinConfig(button) => 0x10 | button.as_index() as u8,
            InputError::EdgeDetect(button) => 0x20 | button.as_index() as u8,
        }
    }
}
