#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Tasks publish the state the status report needs into lightweight atomics
//! so the status task can assemble a `StatusSnapshot` without touching the
//! components each task owns.

use core::time::Duration;

use link_core::actuator::{ActuatorState, ActuatorStatus, PulseWidth, Side};
use link_core::config::{ActuatorConfig, AdmissionPolicy};
use link_core::debounce::{ALL_BUTTONS, BUTTON_COUNT, ButtonBank};
use link_core::monitor::SignalMonitor;
use link_core::monitor::status::{
    InitiatorStatus, ResponderStatus, RoleStatus, StatusSnapshot,
};
use link_core::session::Role;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU64, Ordering};

use crate::link::FirmwareInstant;

const STATE_NEUTRAL: u8 = 0;
const STATE_AT_MIN: u8 = 1;
const STATE_AT_MAX: u8 = 2;
const STATE_HOLDING: u8 = 3;

/// Set when the button inputs failed to configure.
static INPUT_INERT: AtomicBool = AtomicBool::new(false);
/// Counter carried by the most recent press.
static PRESS_COUNTER: AtomicU8 = AtomicU8::new(0);
/// Burst window deadline (µs, +1; 0 == idle).
static BURST_UNTIL_MICROS: AtomicU64 = AtomicU64::new(0);

static ACTUATOR_READY: AtomicBool = AtomicBool::new(false);
static ACTUATOR_STATE: AtomicU8 = AtomicU8::new(STATE_NEUTRAL);
static ACTUATOR_PULSE: AtomicU16 = AtomicU16::new(0);
static NEXT_SIDE_MAX: AtomicBool = AtomicBool::new(false);
static INDICATOR_ACTIVE: AtomicBool = AtomicBool::new(false);
/// Pending neutral return deadline (µs, +1; 0 == none).
static NEUTRAL_AT_MICROS: AtomicU64 = AtomicU64::new(0);
/// Last admitted counter (+1; 0 == none).
static GATE_LAST_COUNTER: AtomicU16 = AtomicU16::new(0);

fn encode_micros(instant: Option<FirmwareInstant>) -> u64 {
    instant.map_or(0, |at| at.as_micros().saturating_add(1))
}

fn remaining_until(now: FirmwareInstant, raw: u64) -> Option<Duration> {
    if raw == 0 {
        return None;
    }
    let deadline = raw - 1;
    let now = now.as_micros();
    (deadline > now).then(|| Duration::from_micros(deadline - now))
}

fn encode_state(state: ActuatorState) -> u8 {
    match state {
        ActuatorState::Neutral => STATE_NEUTRAL,
        ActuatorState::AtMin => STATE_AT_MIN,
        ActuatorState::AtMax => STATE_AT_MAX,
        ActuatorState::Holding(_) => STATE_HOLDING,
    }
}

fn decode_state(raw: u8, pulse: PulseWidth) -> ActuatorState {
    match raw {
        STATE_AT_MIN => ActuatorState::AtMin,
        STATE_AT_MAX => ActuatorState::AtMax,
        STATE_HOLDING => ActuatorState::Holding(pulse),
        _ => ActuatorState::Neutral,
    }
}

/// Marks the button inputs as unusable.
pub fn record_input_inert(inert: bool) {
    INPUT_INERT.store(inert, Ordering::Relaxed);
}

/// Records a transmitted press and the end of its ranging burst.
pub fn record_press(counter: u8, burst_until: Option<FirmwareInstant>) {
    PRESS_COUNTER.store(counter, Ordering::Relaxed);
    BURST_UNTIL_MICROS.store(encode_micros(burst_until), Ordering::Relaxed);
}

/// Mirrors the actuator controller state.
pub fn record_actuator(status: &ActuatorStatus, now: FirmwareInstant) {
    ACTUATOR_READY.store(status.ready, Ordering::Relaxed);
    ACTUATOR_STATE.store(encode_state(status.state), Ordering::Relaxed);
    ACTUATOR_PULSE.store(status.pulse.as_micros(), Ordering::Relaxed);
    NEXT_SIDE_MAX.store(status.next_side == Side::Max, Ordering::Relaxed);
    INDICATOR_ACTIVE.store(status.indicator_active, Ordering::Relaxed);
    let neutral_at = status.neutral_in.map(|remaining| now + remaining);
    NEUTRAL_AT_MICROS.store(encode_micros(neutral_at), Ordering::Relaxed);
}

/// Records the counter most recently admitted by the receive gate.
pub fn record_gate_counter(counter: Option<u8>) {
    GATE_LAST_COUNTER.store(counter.map_or(0, |value| u16::from(value) + 1), Ordering::Relaxed);
}

fn initiator_status(now: FirmwareInstant, buttons: &ButtonBank) -> InitiatorStatus {
    let mut pressed = [false; BUTTON_COUNT];
    for button in ALL_BUTTONS {
        pressed[button.as_index()] = buttons.is_pressed(button);
    }

    InitiatorStatus {
        input_inert: INPUT_INERT.load(Ordering::Relaxed),
        pressed,
        press_counter: PRESS_COUNTER.load(Ordering::Relaxed),
        burst_remaining: remaining_until(now, BURST_UNTIL_MICROS.load(Ordering::Relaxed)),
    }
}

fn responder_status(now: FirmwareInstant, policy: AdmissionPolicy) -> ResponderStatus {
    let raw_pulse = ACTUATOR_PULSE.load(Ordering::Relaxed);
    let pulse = if raw_pulse == 0 {
        ActuatorConfig::new().center
    } else {
        PulseWidth::from_micros(raw_pulse)
    };

    let actuator = ActuatorStatus {
        ready: ACTUATOR_READY.load(Ordering::Relaxed),
        state: decode_state(ACTUATOR_STATE.load(Ordering::Relaxed), pulse),
        pulse,
        next_side: if NEXT_SIDE_MAX.load(Ordering::Relaxed) {
            Side::Max
        } else {
            Side::Min
        },
        neutral_in: remaining_until(now, NEUTRAL_AT_MICROS.load(Ordering::Relaxed)),
        indicator_active: INDICATOR_ACTIVE.load(Ordering::Relaxed),
    };

    let last_counter = match GATE_LAST_COUNTER.load(Ordering::Relaxed) {
        0 => None,
        raw => u8::try_from(raw - 1).ok(),
    };

    ResponderStatus {
        actuator,
        policy,
        last_counter,
    }
}

/// Assembles the status snapshot for this device.
pub fn snapshot(
    now: FirmwareInstant,
    monitor: &SignalMonitor,
    buttons: &ButtonBank,
    policy: AdmissionPolicy,
) -> StatusSnapshot {
    let snapshot = StatusSnapshot::new(monitor.role(), monitor.counters());
    let detail = match monitor.role() {
        Role::Initiator => RoleStatus::Initiator(initiator_status(now, buttons)),
        Role::Responder => RoleStatus::Responder(responder_status(now, policy)),
    };
    snapshot.with_detail(detail)
}
