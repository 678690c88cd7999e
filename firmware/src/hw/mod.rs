//! Board wiring for the STM32G0 target.
//!
//! Buttons are active-low with internal pull-ups; the indicator LEDs are
//! active-low as well. The servo signal is bit-banged on a push-pull output
//! by the servo task.

#![cfg(target_os = "none")]

pub mod buttons;
pub mod indicator;
