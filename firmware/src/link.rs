//! Firmware bindings for the `link-core` components.
//!
//! Fixes the mutex flavour and instant type used by the embassy runtime and
//! provides the channel-backed boundary to the external UWB session driver.
//! Everything here builds on the host so the adapters can be unit tested.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::ops::Add;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use embassy_time::Instant;
use heapless::Vec;

use link_core::actuator::{ACTUATION_QUEUE_DEPTH, ActuationQueue, ActuatorCommand};
use link_core::dispatch::EventDispatcher;
use link_core::ranging::{MAX_OPPORTUNISTIC_PAYLOAD, RangingLink, RangingReport, SendError};
use link_core::session::Role;
use link_core::time::LinkInstant;

#[cfg(all(feature = "initiator", feature = "responder"))]
compile_error!("enable only one of the `initiator` and `responder` features");

#[cfg(not(any(feature = "initiator", feature = "responder")))]
compile_error!("enable one of the `initiator` or `responder` features");

/// Role this image was built for.
#[cfg(feature = "responder")]
pub const ROLE: Role = Role::Responder;
/// Role this image was built for.
#[cfg(not(feature = "responder"))]
pub const ROLE: Role = Role::Initiator;

/// Payloads waiting for the session driver to pick them up.
pub const OUTBOUND_QUEUE_DEPTH: usize = 2;
/// Ranging reports waiting for the receive gate.
pub const INBOUND_QUEUE_DEPTH: usize = 2;

#[cfg(target_os = "none")]
pub type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type LinkMutex = NoopRawMutex;

/// Press dispatcher shared by the button and transmit tasks.
pub type Dispatcher = EventDispatcher<LinkMutex>;

/// Actuation queue between the ranging and actuator tasks.
pub type ActuationChannel = ActuationQueue<LinkMutex>;
pub type ActuationSender<'a> = Sender<'a, LinkMutex, ActuatorCommand, ACTUATION_QUEUE_DEPTH>;
pub type ActuationReceiver<'a> = Receiver<'a, LinkMutex, ActuatorCommand, ACTUATION_QUEUE_DEPTH>;

/// Opportunistic payload handed to the session driver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundPayload {
    pub session_id: u32,
    pub bytes: Vec<u8, MAX_OPPORTUNISTIC_PAYLOAD>,
}

pub type OutboundQueue = Channel<LinkMutex, OutboundPayload, OUTBOUND_QUEUE_DEPTH>;
pub type InboundQueue = Channel<LinkMutex, RangingReport, INBOUND_QUEUE_DEPTH>;
pub type InboundReceiver<'a> = Receiver<'a, LinkMutex, RangingReport, INBOUND_QUEUE_DEPTH>;

/// Monotonic instant backed by the embassy time driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    #[must_use]
    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(
            self.0
                .checked_add(embassy_time::Duration::from_micros(micros))
                .unwrap_or(Instant::MAX),
        )
    }
}

impl LinkInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let micros = self
            .0
            .checked_duration_since(earlier.0)
            .map_or(0, |elapsed| elapsed.as_micros());
        core::time::Duration::from_micros(micros)
    }
}

/// Converts a core duration into the embassy representation.
#[must_use]
pub fn to_embassy(duration: core::time::Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

/// [`RangingLink`] that hands payloads to the session driver through a
/// bounded channel.
pub struct ChannelRangingLink<'a> {
    outbound: Sender<'a, LinkMutex, OutboundPayload, OUTBOUND_QUEUE_DEPTH>,
}

impl<'a> ChannelRangingLink<'a> {
    #[must_use]
    pub const fn new(outbound: Sender<'a, LinkMutex, OutboundPayload, OUTBOUND_QUEUE_DEPTH>) -> Self {
        Self { outbound }
    }
}

impl RangingLink for ChannelRangingLink<'_> {
    fn send_opportunistic(&mut self, session_id: u32, payload: &[u8]) -> Result<(), SendError> {
        let bytes = Vec::from_slice(payload)
            .map_err(|_| SendError::PayloadTooLarge { len: payload.len() })?;
        self.outbound
            .try_send(OutboundPayload { session_id, bytes })
            .map_err(|TrySendError::Full(_)| SendError::NoSlot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_link_queues_until_full() {
        let queue: OutboundQueue = Channel::new();
        let mut link = ChannelRangingLink::new(queue.sender());

        assert_eq!(link.send_opportunistic(42, b"BTN\x01"), Ok(()));
        assert_eq!(link.send_opportunistic(42, b"BTN\x02"), Ok(()));
        assert_eq!(link.send_opportunistic(42, b"BTN\x03"), Err(SendError::NoSlot));

        let first = queue.try_receive().expect("queued payload");
        assert_eq!(first.session_id, 42);
        assert_eq!(first.bytes.as_slice(), b"BTN\x01");
    }

    #[test]
    fn channel_link_rejects_oversized_payload() {
        let queue: OutboundQueue = Channel::new();
        let mut link = ChannelRangingLink::new(queue.sender());
        let oversized = [0u8; MAX_OPPORTUNISTIC_PAYLOAD + 1];

        assert_eq!(
            link.send_opportunistic(42, &oversized),
            Err(SendError::PayloadTooLarge {
                len: MAX_OPPORTUNISTIC_PAYLOAD + 1
            })
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn instant_arithmetic_saturates() {
        let start = FirmwareInstant::from(Instant::from_micros(1_000));
        let later = start + core::time::Duration::from_millis(5);

        assert_eq!(later.as_micros(), 6_000);
        assert_eq!(
            later.saturating_duration_since(start),
            core::time::Duration::from_millis(5)
        );
        assert_eq!(
            start.saturating_duration_since(later),
            core::time::Duration::ZERO
        );
        assert_eq!(
            to_embassy(core::time::Duration::from_micros(1_500)),
            embassy_time::Duration::from_micros(1_500)
        );
    }
}
