//! Human-readable status snapshot combining the monitor counters with the
//! per-role component state.

use core::fmt;
use core::time::Duration;

use super::{SignalCounters, write_report};
use crate::actuator::ActuatorStatus;
use crate::debounce::{ALL_BUTTONS, BUTTON_COUNT};
use crate::gate::AdmissionPolicy;
use crate::session::Role;

/// Initiator-side component state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InitiatorStatus {
    pub input_inert: bool,
    pub pressed: [bool; BUTTON_COUNT],
    pub press_counter: u8,
    /// Time left in the current ranging burst, `None` when idle.
    pub burst_remaining: Option<Duration>,
}

impl InitiatorStatus {
    #[must_use]
    pub const fn is_ranging(&self) -> bool {
        self.burst_remaining.is_some()
    }
}

/// Responder-side component state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResponderStatus {
    pub actuator: ActuatorStatus,
    pub policy: AdmissionPolicy,
    pub last_counter: Option<u8>,
}

/// Role-specific part of a snapshot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RoleStatus {
    Initiator(InitiatorStatus),
    Responder(ResponderStatus),
}

/// Everything needed to render a status report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub role: Role,
    pub counters: SignalCounters,
    pub detail: Option<RoleStatus>,
}

impl StatusSnapshot {
    #[must_use]
    pub const fn new(role: Role, counters: SignalCounters) -> Self {
        Self {
            role,
            counters,
            detail: None,
        }
    }

    #[must_use]
    pub const fn with_detail(mut self, detail: RoleStatus) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Convenience wrapper around [`StatusFormatter::render`].
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn render<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        StatusFormatter::new(self).render(writer)
    }
}

/// Formats a [`StatusSnapshot`] into line-oriented text.
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Renders the counter block followed by the role lines.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn render<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write_report(writer, self.snapshot.role, &self.snapshot.counters)?;
        match self.snapshot.detail {
            Some(RoleStatus::Initiator(status)) => {
                Self::write_buttons_line(writer, &status)?;
                writer.write_char('\n')?;
                Self::write_burst_line(writer, &status)?;
                writer.write_char('\n')
            }
            Some(RoleStatus::Responder(status)) => {
                Self::write_servo_line(writer, &status.actuator)?;
                writer.write_char('\n')?;
                Self::write_gate_line(writer, &status)?;
                writer.write_char('\n')
            }
            None => Ok(()),
        }
    }

    /// Writes `buttons SW1=released SW2=pressed input=ok`.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_buttons_line<W: fmt::Write>(
        writer: &mut W,
        status: &InitiatorStatus,
    ) -> fmt::Result {
        writer.write_str("buttons")?;
        for button in ALL_BUTTONS {
            let state = if status.pressed[button.as_index()] {
                "pressed"
            } else {
                "released"
            };
            write!(writer, " {}={}", button.label(), state)?;
        }
        writer.write_str(" input=")?;
        writer.write_str(if status.input_inert { "inert" } else { "ok" })
    }

    /// Writes `press counter=N ranging=active(+T)|idle`.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_burst_line<W: fmt::Write>(writer: &mut W, status: &InitiatorStatus) -> fmt::Result {
        write!(writer, "press counter={} ranging=", status.press_counter)?;
        match status.burst_remaining {
            Some(remaining) => {
                writer.write_str("active(")?;
                write_duration(writer, Some(remaining))?;
                writer.write_char(')')
            }
            None => writer.write_str("idle"),
        }
    }

    /// Writes the actuator line.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_servo_line<W: fmt::Write>(writer: &mut W, status: &ActuatorStatus) -> fmt::Result {
        if !status.ready {
            return writer.write_str("servo not-ready");
        }

        write!(
            writer,
            "servo state={} pulse={} next={} neutral=",
            status.state.label(),
            status.pulse,
            status.next_side.label()
        )?;
        write_duration(writer, status.neutral_in)?;
        writer.write_str(" indicator=")?;
        writer.write_str(if status.indicator_active { "flashing" } else { "idle" })
    }

    /// Writes `gate policy=P last=N`.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_gate_line<W: fmt::Write>(writer: &mut W, status: &ResponderStatus) -> fmt::Result {
        write!(writer, "gate policy={} last=", status.policy.name())?;
        match status.last_counter {
            Some(counter) => write!(writer, "{counter}"),
            None => writer.write_str("n/a"),
        }
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            write!(writer, "+{}.{}s", millis / 1_000, (millis % 1_000) / 100)
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
