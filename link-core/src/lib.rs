#![no_std]

//! Button-to-servo link logic shared by the firmware and host emulator.
//!
//! The initiator side debounces button inputs, hands confirmed presses to a
//! transmit worker through a coalescing dispatcher, and piggybacks a small
//! marker payload on the next ranging exchange. The responder side filters
//! ranging results through an admission gate and drives a two-position
//! actuator with an automatic return to neutral. A signal monitor counts
//! link events on both sides.

#[macro_use]
mod log;

pub mod actuator;
pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod gate;
pub mod monitor;
pub mod payload;
pub mod ranging;
pub mod session;
pub mod time;
pub mod transmit;
