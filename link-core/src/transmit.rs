//! Initiator-side transmit worker.
//!
//! The worker drains the [`EventDispatcher`] and makes exactly one
//! opportunistic send per consumed press. Failures are recorded and logged;
//! there is no retry, the next press simply carries a newer counter.

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::dispatch::EventDispatcher;
use crate::monitor::{SignalEvent, SignalMonitor};
use crate::payload::PressEvent;
use crate::ranging::{RangingLink, SendError};
use crate::session::SessionContext;
use crate::time::LinkInstant;

/// Consumes dispatched presses and hands their payload to the ranging link.
pub struct TransmitWorker<'a, L, M: RawMutex> {
    session: SessionContext,
    link: L,
    dispatcher: &'a EventDispatcher<M>,
    monitor: &'a SignalMonitor,
    last_sent: Option<u8>,
}

impl<'a, L, M> TransmitWorker<'a, L, M>
where
    L: RangingLink,
    M: RawMutex,
{
    #[must_use]
    pub const fn new(
        session: SessionContext,
        link: L,
        dispatcher: &'a EventDispatcher<M>,
        monitor: &'a SignalMonitor,
    ) -> Self {
        Self {
            session,
            link,
            dispatcher,
            monitor,
            last_sent: None,
        }
    }

    /// Sends the payload for `event` once.
    ///
    /// # Errors
    ///
    /// Returns the link's [`SendError`] after recording the failure.
    pub fn transmit(&mut self, event: PressEvent) -> Result<(), SendError> {
        let peer = self.session.peer_addr;
        let counter = u32::from(event.counter);
        self.monitor.record(SignalEvent::TxStart, peer, counter);

        match self
            .link
            .send_opportunistic(self.session.session_id, &event.payload())
        {
            Ok(()) => {
                self.last_sent = Some(event.counter);
                self.monitor.record(SignalEvent::TxSuccess, peer, counter);
                log_info!(
                    "tx: {} press {} queued on session {}",
                    event.button.label(),
                    event.counter,
                    self.session.session_id
                );
                Ok(())
            }
            Err(err) => {
                self.monitor.record(SignalEvent::TxFailed, peer, err.code());
                log_warn!(
                    "tx: press {} not sent, code {:#x}",
                    event.counter,
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Transmits the pending press, if any, without waiting.
    pub fn poll(&mut self) -> Option<(PressEvent, Result<(), SendError>)> {
        let event = self.dispatcher.try_take()?;
        Some((event, self.transmit(event)))
    }

    /// Waits for the next press and transmits it.
    pub async fn run_once(&mut self) -> (PressEvent, Result<(), SendError>) {
        let event = self.dispatcher.consume().await;
        (event, self.transmit(event))
    }

    /// Counter carried by the last successful send.
    #[must_use]
    pub const fn last_sent(&self) -> Option<u8> {
        self.last_sent
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

/// Window during which the initiator considers itself actively ranging
/// after a press.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BurstWindow<I> {
    length: Duration,
    closes_at: Option<I>,
}

impl<I: LinkInstant> BurstWindow<I> {
    #[must_use]
    pub const fn new(length: Duration) -> Self {
        Self {
            length,
            closes_at: None,
        }
    }

    /// Opens (or extends) the window starting at `now`.
    pub fn open(&mut self, now: I) {
        self.closes_at = Some(now + self.length);
    }

    /// Returns `true` while the window is open.
    #[must_use]
    pub fn is_open(&self, now: I) -> bool {
        self.closes_at.is_some_and(|deadline| now < deadline)
    }

    /// Time left before the window closes.
    #[must_use]
    pub fn remaining(&self, now: I) -> Option<Duration> {
        self.closes_at
            .filter(|deadline| now < *deadline)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    #[must_use]
    pub const fn closes_at(&self) -> Option<I> {
        self.closes_at
    }
}
