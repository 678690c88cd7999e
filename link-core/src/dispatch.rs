//! Hand-off of confirmed presses from the scan context to the transmit worker.
//!
//! The dispatcher holds at most one pending [`PressEvent`]. A press
//! confirmed while another is still pending replaces it: the transmit worker
//! always sends the newest counter and the replaced press is counted as
//! coalesced. The pending slot is a single atomic word so publishing never
//! blocks; an embassy [`Signal`] wakes the worker.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicU16, AtomicU32, Ordering};

use crate::debounce::{ButtonId, ButtonObserver};
use crate::monitor::{SignalEvent, SignalMonitor};
use crate::payload::{PressCounter, PressEvent};

const PENDING_BIT: u16 = 1 << 15;
const BUTTON_SHIFT: u32 = 8;
const BUTTON_MASK: u16 = 0x7F;

fn pack(event: PressEvent) -> u16 {
    // Button indices are tiny; the mask keeps the pending bit clear.
    let button = (event.button.as_index() as u16) & BUTTON_MASK;
    PENDING_BIT | (button << BUTTON_SHIFT) | u16::from(event.counter)
}

fn unpack(raw: u16) -> Option<PressEvent> {
    if raw & PENDING_BIT == 0 {
        return None;
    }
    let button = ButtonId::from_index(usize::from((raw >> BUTTON_SHIFT) & BUTTON_MASK))?;
    Some(PressEvent::new(button, raw.to_le_bytes()[0]))
}

/// Result of publishing a press.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotifyOutcome {
    /// The slot was empty; the press is now pending.
    Queued,
    /// An unconsumed press was replaced.
    Coalesced { replaced: PressEvent },
}

/// Single-slot, lock-free mailbox for the newest pending press.
#[derive(Debug)]
pub struct PressCell {
    slot: AtomicU16,
}

impl PressCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: AtomicU16::new(0),
        }
    }

    /// Stores `event`, returning the press it replaced, if any.
    pub fn publish(&self, event: PressEvent) -> Option<PressEvent> {
        unpack(self.slot.swap(pack(event), Ordering::AcqRel))
    }

    /// Removes and returns the pending press.
    pub fn take(&self) -> Option<PressEvent> {
        unpack(self.slot.swap(0, Ordering::AcqRel))
    }

    /// Returns the pending press without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<PressEvent> {
        unpack(self.slot.load(Ordering::Acquire))
    }
}

impl Default for PressCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Wakes the transmit worker when a press is confirmed.
pub struct EventDispatcher<M: RawMutex> {
    pending: PressCell,
    wake: Signal<M, ()>,
    coalesced: AtomicU32,
}

impl<M: RawMutex> EventDispatcher<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: PressCell::new(),
            wake: Signal::new(),
            coalesced: AtomicU32::new(0),
        }
    }

    /// Publishes `event` for the worker. Never blocks.
    pub fn notify(&self, event: PressEvent) -> NotifyOutcome {
        let outcome = match self.pending.publish(event) {
            None => NotifyOutcome::Queued,
            Some(replaced) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                log_debug!(
                    "dispatch: press {} superseded by {}",
                    replaced.counter,
                    event.counter
                );
                NotifyOutcome::Coalesced { replaced }
            }
        };
        self.wake.signal(());
        outcome
    }

    /// Takes the pending press without waiting.
    pub fn try_take(&self) -> Option<PressEvent> {
        self.pending.take()
    }

    /// Returns `true` when a press is waiting for the worker.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.peek().is_some()
    }

    /// Waits for the next press. Intended for a single consumer.
    pub async fn consume(&self) -> PressEvent {
        loop {
            if let Some(event) = self.pending.take() {
                self.wake.reset();
                return event;
            }
            self.wake.wait().await;
        }
    }

    /// Presses replaced before the worker consumed them.
    #[must_use]
    pub fn coalesced_count(&self) -> u32 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<M: RawMutex> Default for EventDispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Debouncer observer that turns presses into dispatched [`PressEvent`]s.
///
/// Releases are ignored. Every press on any button advances the shared
/// counter before it is published.
pub struct PressNotifier<'a, M: RawMutex> {
    counter: PressCounter,
    dispatcher: &'a EventDispatcher<M>,
    monitor: &'a SignalMonitor,
}

impl<'a, M: RawMutex> PressNotifier<'a, M> {
    #[must_use]
    pub const fn new(dispatcher: &'a EventDispatcher<M>, monitor: &'a SignalMonitor) -> Self {
        Self {
            counter: PressCounter::new(),
            dispatcher,
            monitor,
        }
    }

    /// Counter value carried by the most recent press.
    #[must_use]
    pub const fn counter(&self) -> u8 {
        self.counter.current()
    }
}

impl<M: RawMutex> ButtonObserver for PressNotifier<'_, M> {
    fn on_button_event(&mut self, button: ButtonId, is_pressed: bool) {
        if !is_pressed {
            return;
        }

        let event = PressEvent::new(button, self.counter.advance());
        if let NotifyOutcome::Coalesced { replaced } = self.dispatcher.notify(event) {
            self.monitor
                .record(SignalEvent::PressCoalesced, 0, u32::from(replaced.counter));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn cell_round_trips_every_button_and_counter_edge() {
        let cell = PressCell::new();
        for event in [
            PressEvent::new(ButtonId::Sw1, 0),
            PressEvent::new(ButtonId::Sw2, 255),
        ] {
            assert_eq!(cell.publish(event), None);
            assert_eq!(cell.peek(), Some(event));
            assert_eq!(cell.take(), Some(event));
            assert_eq!(cell.take(), None);
        }
    }

    #[test]
    fn second_notify_replaces_pending_press() {
        let dispatcher: EventDispatcher<NoopRawMutex> = EventDispatcher::new();
        let first = PressEvent::new(ButtonId::Sw1, 1);
        let second = PressEvent::new(ButtonId::Sw2, 2);

        assert_eq!(dispatcher.notify(first), NotifyOutcome::Queued);
        assert_eq!(
            dispatcher.notify(second),
            NotifyOutcome::Coalesced { replaced: first }
        );
        assert_eq!(dispatcher.coalesced_count(), 1);
        assert_eq!(dispatcher.try_take(), Some(second));
        assert_eq!(dispatcher.try_take(), None);
    }

    #[test]
    fn consume_returns_pending_press() {
        let dispatcher: EventDispatcher<NoopRawMutex> = EventDispatcher::new();
        dispatcher.notify(PressEvent::new(ButtonId::Sw1, 9));

        let event = block_on(dispatcher.consume());
        assert_eq!(event, PressEvent::new(ButtonId::Sw1, 9));
        assert!(!dispatcher.has_pending());
    }

    #[test]
    fn notifier_counts_presses_across_buttons_and_ignores_releases() {
        let dispatcher: EventDispatcher<NoopRawMutex> = EventDispatcher::new();
        let monitor = SignalMonitor::new(Role::Initiator);
        let mut notifier = PressNotifier::new(&dispatcher, &monitor);

        notifier.on_button_event(ButtonId::Sw1, true);
        assert_eq!(dispatcher.try_take(), Some(PressEvent::new(ButtonId::Sw1, 1)));

        notifier.on_button_event(ButtonId::Sw1, false);
        assert_eq!(dispatcher.try_take(), None);

        notifier.on_button_event(ButtonId::Sw2, true);
        notifier.on_button_event(ButtonId::Sw1, true);
        assert_eq!(notifier.counter(), 3);
        assert_eq!(dispatcher.try_take(), Some(PressEvent::new(ButtonId::Sw1, 3)));
        assert_eq!(monitor.counters().press_coalesced, 1);
    }
}
