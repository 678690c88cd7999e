//! Link event counters and the bidirectional status report.
//!
//! Components record [`SignalEvent`]s as they happen; the monitor only
//! counts and logs them. Counters increase monotonically until
//! [`SignalMonitor::reset`] is called.

pub mod status;

use core::fmt;

use portable_atomic::{AtomicU32, Ordering};

use crate::session::Role;

/// Number of distinct [`SignalEvent`] variants.
pub const SIGNAL_EVENT_COUNT: usize = 15;

/// Events observed on the ranging link and along the press pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalEvent {
    TxStart,
    TxSuccess,
    TxFailed,
    RxStart,
    RxSuccess,
    RxTimeout,
    RxError,
    PayloadRx,
    PayloadNoMarker,
    PayloadDuplicate,
    PayloadCoolingDown,
    PeerMismatch,
    TriggerAdmitted,
    ActuationDropped,
    PressCoalesced,
}

/// Every event in counter order.
pub const ALL_SIGNAL_EVENTS: [SignalEvent; SIGNAL_EVENT_COUNT] = [
    SignalEvent::TxStart,
    SignalEvent::TxSuccess,
    SignalEvent::TxFailed,
    SignalEvent::RxStart,
    SignalEvent::RxSuccess,
    SignalEvent::RxTimeout,
    SignalEvent::RxError,
    SignalEvent::PayloadRx,
    SignalEvent::PayloadNoMarker,
    SignalEvent::PayloadDuplicate,
    SignalEvent::PayloadCoolingDown,
    SignalEvent::PeerMismatch,
    SignalEvent::TriggerAdmitted,
    SignalEvent::ActuationDropped,
    SignalEvent::PressCoalesced,
];

impl SignalEvent {
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            SignalEvent::TxStart => 0,
            SignalEvent::TxSuccess => 1,
            SignalEvent::TxFailed => 2,
            SignalEvent::RxStart => 3,
            SignalEvent::RxSuccess => 4,
            SignalEvent::RxTimeout => 5,
            SignalEvent::RxError => 6,
            SignalEvent::PayloadRx => 7,
            SignalEvent::PayloadNoMarker => 8,
            SignalEvent::PayloadDuplicate => 9,
            SignalEvent::PayloadCoolingDown => 10,
            SignalEvent::PeerMismatch => 11,
            SignalEvent::TriggerAdmitted => 12,
            SignalEvent::ActuationDropped => 13,
            SignalEvent::PressCoalesced => 14,
        }
    }

    /// Tag printed between brackets in event lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SignalEvent::TxStart => "TX_START",
            SignalEvent::TxSuccess => "TX_OK",
            SignalEvent::TxFailed => "TX_FAIL",
            SignalEvent::RxStart => "RX_START",
            SignalEvent::RxSuccess => "RX_OK",
            SignalEvent::RxTimeout => "RX_TIMEOUT",
            SignalEvent::RxError => "RX_ERROR",
            SignalEvent::PayloadRx => "PAYLOAD_RX",
            SignalEvent::PayloadNoMarker => "NO_MARKER",
            SignalEvent::PayloadDuplicate => "DUPLICATE",
            SignalEvent::PayloadCoolingDown => "COOLDOWN",
            SignalEvent::PeerMismatch => "PEER_SKIP",
            SignalEvent::TriggerAdmitted => "ADMITTED",
            SignalEvent::ActuationDropped => "ACT_DROP",
            SignalEvent::PressCoalesced => "COALESCED",
        }
    }
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time copy of every counter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SignalCounters {
    pub tx_packets: u32,
    pub tx_success: u32,
    pub tx_failed: u32,
    pub rx_packets: u32,
    pub rx_success: u32,
    pub rx_timeout: u32,
    pub rx_error: u32,
    pub payload_rx: u32,
    pub payload_no_marker: u32,
    pub payload_duplicate: u32,
    pub payload_cooling_down: u32,
    pub peer_mismatch: u32,
    pub trigger_admitted: u32,
    pub actuation_dropped: u32,
    pub press_coalesced: u32,
}

impl SignalCounters {
    fn from_raw(raw: [u32; SIGNAL_EVENT_COUNT]) -> Self {
        Self {
            tx_packets: raw[SignalEvent::TxStart.as_index()],
            tx_success: raw[SignalEvent::TxSuccess.as_index()],
            tx_failed: raw[SignalEvent::TxFailed.as_index()],
            rx_packets: raw[SignalEvent::RxStart.as_index()],
            rx_success: raw[SignalEvent::RxSuccess.as_index()],
            rx_timeout: raw[SignalEvent::RxTimeout.as_index()],
            rx_error: raw[SignalEvent::RxError.as_index()],
            payload_rx: raw[SignalEvent::PayloadRx.as_index()],
            payload_no_marker: raw[SignalEvent::PayloadNoMarker.as_index()],
            payload_duplicate: raw[SignalEvent::PayloadDuplicate.as_index()],
            payload_cooling_down: raw[SignalEvent::PayloadCoolingDown.as_index()],
            peer_mismatch: raw[SignalEvent::PeerMismatch.as_index()],
            trigger_admitted: raw[SignalEvent::TriggerAdmitted.as_index()],
            actuation_dropped: raw[SignalEvent::ActuationDropped.as_index()],
            press_coalesced: raw[SignalEvent::PressCoalesced.as_index()],
        }
    }

    /// The link counts as established once any measurement succeeded.
    #[must_use]
    pub const fn link_established(&self) -> bool {
        self.rx_success > 0
    }
}

/// Passive, interrupt-safe event counter sink.
#[derive(Debug)]
pub struct SignalMonitor {
    role: Role,
    counters: [AtomicU32; SIGNAL_EVENT_COUNT],
}

impl SignalMonitor {
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            counters: [const { AtomicU32::new(0) }; SIGNAL_EVENT_COUNT],
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Counts `event` and logs it with the remote address and event data.
    pub fn record(&self, event: SignalEvent, peer_addr: u16, aux: u32) {
        self.counters[event.as_index()].fetch_add(1, Ordering::Relaxed);
        log_info!(
            "monitor: {} [{}] {:#x} data={:#x}",
            self.role.tag(),
            event.label(),
            peer_addr,
            aux
        );
    }

    /// Current value of the counter backing `event`.
    #[must_use]
    pub fn count(&self, event: SignalEvent) -> u32 {
        self.counters[event.as_index()].load(Ordering::Relaxed)
    }

    /// Copies every counter.
    #[must_use]
    pub fn counters(&self) -> SignalCounters {
        let mut raw = [0; SIGNAL_EVENT_COUNT];
        for (slot, counter) in raw.iter_mut().zip(self.counters.iter()) {
            *slot = counter.load(Ordering::Relaxed);
        }
        SignalCounters::from_raw(raw)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
        log_info!("monitor: stats reset");
    }

    /// Writes the fixed-format status block.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn report<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write_report(writer, self.role, &self.counters())
    }
}

/// Renders `counters` in the status block layout.
///
/// # Errors
///
/// Propagates writer failures.
pub fn write_report<W: fmt::Write>(
    writer: &mut W,
    role: Role,
    counters: &SignalCounters,
) -> fmt::Result {
    writer.write_str("===== UWB BIDIRECTIONAL SIGNAL STATUS =====\n")?;
    writeln!(writer, "{} ROLE STATISTICS:", role.title())?;
    writeln!(
        writer,
        "  TX: packets={} success={} failed={}",
        counters.tx_packets, counters.tx_success, counters.tx_failed
    )?;
    writeln!(
        writer,
        "  RX: packets={} success={} timeout={} error={} payloads={}",
        counters.rx_packets,
        counters.rx_success,
        counters.rx_timeout,
        counters.rx_error,
        counters.payload_rx
    )?;
    writeln!(
        writer,
        "  GATE: admitted={} duplicate={} cooldown={} no-marker={} peer-skip={} dropped={}",
        counters.trigger_admitted,
        counters.payload_duplicate,
        counters.payload_cooling_down,
        counters.payload_no_marker,
        counters.peer_mismatch,
        counters.actuation_dropped
    )?;
    writeln!(writer, "  PRESS: coalesced={}", counters.press_coalesced)?;
    writeln!(
        writer,
        "  LINK: {}",
        if counters.link_established() {
            "BIDIRECTIONAL OK"
        } else {
            "WAITING FOR SIGNALS"
        }
    )?;
    writer.write_str("===========================================\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn record_increments_only_matching_counter() {
        let monitor = SignalMonitor::new(Role::Initiator);
        monitor.record(SignalEvent::TxStart, 0x0002, 1);
        monitor.record(SignalEvent::TxStart, 0x0002, 2);
        monitor.record(SignalEvent::TxFailed, 0x0002, 0xFFFF_FFFF);

        let counters = monitor.counters();
        assert_eq!(counters.tx_packets, 2);
        assert_eq!(counters.tx_failed, 1);
        assert_eq!(counters.tx_success, 0);
        assert_eq!(monitor.count(SignalEvent::RxStart), 0);
    }

    #[test]
    fn reset_zeroes_counters() {
        let monitor = SignalMonitor::new(Role::Responder);
        for event in ALL_SIGNAL_EVENTS {
            monitor.record(event, 0x0001, 0);
        }
        assert!(ALL_SIGNAL_EVENTS.iter().all(|event| monitor.count(*event) == 1));

        monitor.reset();
        assert_eq!(monitor.counters(), SignalCounters::default());
    }

    #[test]
    fn event_indices_are_dense() {
        for (index, event) in ALL_SIGNAL_EVENTS.iter().enumerate() {
            assert_eq!(event.as_index(), index);
        }
    }

    #[test]
    fn report_reflects_link_state() {
        let monitor = SignalMonitor::new(Role::Responder);
        let mut text: String<512> = String::new();
        monitor.report(&mut text).expect("report fits");
        assert!(text.starts_with("===== UWB BIDIRECTIONAL SIGNAL STATUS ====="));
        assert!(text.contains("RESPONDER ROLE STATISTICS:"));
        assert!(text.contains("LINK: WAITING FOR SIGNALS"));

        monitor.record(SignalEvent::RxSuccess, 0x0001, 1_250);
        monitor.record(SignalEvent::PayloadRx, 0x0001, 4);
        text.clear();
        monitor.report(&mut text).expect("report fits");
        assert!(text.contains("  RX: packets=0 success=1 timeout=0 error=0 payloads=1"));
        assert!(text.contains("LINK: BIDIRECTIONAL OK"));
    }
}
