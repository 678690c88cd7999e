//! Responder-side admission of received press payloads.
//!
//! Every measurement of a ranging report is checked against the expected
//! peer, its status is recorded, and any attached data is decoded. A decoded
//! press is admitted according to the [`AdmissionPolicy`]; admitted presses
//! become [`ActuatorCommand::Toggle`] entries on the actuation queue.
//! Processing of a report stops at the first measurement carrying the press
//! marker.

use core::fmt;
use core::time::Duration;

use crate::actuator::{ActuationSink, ActuatorCommand, EnqueueError};
use crate::config::DEFAULT_COOLDOWN;
use crate::monitor::{SignalEvent, SignalMonitor};
use crate::payload::{self, DecodeError, PAYLOAD_LEN};
use crate::ranging::{MeasurementStatus, RangingMeasurement, RangingReport};
use crate::session::SessionContext;
use crate::time::LinkInstant;

/// Rule deciding whether a decoded press may actuate.
///
/// With [`AdmissionPolicy::DedupThenCooldown`] the duplicate check runs
/// first, so a retransmitted counter is always reported as a duplicate even
/// inside the cooldown window.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AdmissionPolicy {
    /// Reject a counter equal to the last admitted one.
    #[default]
    Dedup,
    /// Reject any press within `window` of the last admission.
    Cooldown { window: Duration },
    /// Apply both checks, duplicate first.
    DedupThenCooldown { window: Duration },
}

impl AdmissionPolicy {
    /// Cooldown policy with the default window.
    #[must_use]
    pub const fn cooldown() -> Self {
        Self::Cooldown {
            window: DEFAULT_COOLDOWN,
        }
    }

    #[must_use]
    pub const fn checks_duplicates(self) -> bool {
        matches!(self, Self::Dedup | Self::DedupThenCooldown { .. })
    }

    #[must_use]
    pub const fn cooldown_window(self) -> Option<Duration> {
        match self {
            Self::Dedup => None,
            Self::Cooldown { window } | Self::DedupThenCooldown { window } => Some(window),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dedup => "dedup",
            Self::Cooldown { .. } => "cooldown",
            Self::DedupThenCooldown { .. } => "dedup+cooldown",
        }
    }
}

/// Reason a decoded press was not admitted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateRejection {
    Duplicate { counter: u8 },
    CoolingDown { counter: u8, remaining: Duration },
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRejection::Duplicate { counter } => write!(f, "press {counter} already handled"),
            GateRejection::CoolingDown { counter, remaining } => write!(
                f,
                "press {counter} inside cooldown ({}ms left)",
                remaining.as_millis()
            ),
        }
    }
}

/// Outcome for a single measurement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateVerdict {
    /// Press admitted and queued for the actuator.
    Admitted { counter: u8 },
    /// Press decoded but refused by the admission policy.
    Rejected(GateRejection),
    /// Press admitted but the actuation queue was full.
    Dropped { counter: u8 },
    /// Attached data is not a press payload.
    Discarded(DecodeError),
    /// Measurement carried no data.
    NoPayload,
    /// Measurement came from an unexpected address.
    PeerMismatch { peer_addr: u16 },
}

impl GateVerdict {
    /// Returns `true` when the measurement carried a valid press marker.
    #[must_use]
    pub const fn is_marker_match(self) -> bool {
        matches!(
            self,
            Self::Admitted { .. } | Self::Rejected(_) | Self::Dropped { .. }
        )
    }
}

/// Outcome for a full ranging report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportOutcome {
    /// The session reported a stop; measurements were ignored.
    Stopped { reason: u8 },
    /// Measurements were inspected up to and including `inspected`.
    Processed {
        inspected: usize,
        verdict: Option<GateVerdict>,
    },
}

/// Filters inbound ranging results into actuation commands.
pub struct ReceiveGate<'a, Q, I> {
    session: SessionContext,
    policy: AdmissionPolicy,
    sink: Q,
    monitor: &'a SignalMonitor,
    last_counter: Option<u8>,
    last_admitted_at: Option<I>,
}

impl<'a, Q, I> ReceiveGate<'a, Q, I>
where
    Q: ActuationSink,
    I: LinkInstant,
{
    #[must_use]
    pub const fn new(
        session: SessionContext,
        policy: AdmissionPolicy,
        sink: Q,
        monitor: &'a SignalMonitor,
    ) -> Self {
        Self {
            session,
            policy,
            sink,
            monitor,
            last_counter: None,
            last_admitted_at: None,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Counter of the most recently admitted press.
    #[must_use]
    pub const fn last_counter(&self) -> Option<u8> {
        self.last_counter
    }

    /// Handles one ranging report.
    pub fn on_ranging_report(&mut self, report: &RangingReport, now: I) -> ReportOutcome {
        if let Some(reason) = report.stopped {
            log_warn!(
                "gate: session stopped (reason {}) at block {}",
                reason,
                report.block_index
            );
            return ReportOutcome::Stopped { reason };
        }

        self.monitor
            .record(SignalEvent::RxStart, self.session.peer_addr, report.block_index);

        let mut verdict = None;
        let mut inspected = 0;
        for measurement in &report.measurements {
            inspected += 1;
            let current = self.on_measurement(measurement, now);
            verdict = Some(current);
            if current.is_marker_match() {
                break;
            }
        }

        ReportOutcome::Processed { inspected, verdict }
    }

    /// Handles a single measurement.
    pub fn on_measurement(&mut self, measurement: &RangingMeasurement, now: I) -> GateVerdict {
        let peer = measurement.peer_addr;
        if !self.session.is_peer(peer) {
            log_debug!(
                "gate: skipping {:#x}, expecting {:#x}",
                peer,
                self.session.peer_addr
            );
            self.monitor
                .record(SignalEvent::PeerMismatch, peer, u32::from(self.session.peer_addr));
            return GateVerdict::PeerMismatch { peer_addr: peer };
        }

        self.record_status(peer, measurement);

        match measurement.payload() {
            Some(bytes) => self.inspect_payload(peer, bytes, now),
            None => GateVerdict::NoPayload,
        }
    }

    /// Decodes `bytes` received from `peer` and applies the admission policy.
    pub fn inspect_payload(&mut self, peer: u16, bytes: &[u8], now: I) -> GateVerdict {
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        if bytes.len() >= PAYLOAD_LEN {
            self.monitor.record(SignalEvent::PayloadRx, peer, len);
        }

        let counter = match payload::decode(bytes) {
            Ok(counter) => counter,
            Err(err) => {
                self.monitor.record(SignalEvent::PayloadNoMarker, peer, len);
                log_debug!("gate: discarded {} bytes without marker", bytes.len());
                return GateVerdict::Discarded(err);
            }
        };

        if let Err(rejection) = self.check(counter, now) {
            let event = match rejection {
                GateRejection::Duplicate { .. } => SignalEvent::PayloadDuplicate,
                GateRejection::CoolingDown { .. } => SignalEvent::PayloadCoolingDown,
            };
            self.monitor.record(event, peer, u32::from(counter));
            log_info!("gate: press {} rejected ({})", counter, event.label());
            return GateVerdict::Rejected(rejection);
        }

        self.last_counter = Some(counter);
        self.last_admitted_at = Some(now);

        match self.sink.try_enqueue(ActuatorCommand::Toggle { counter }) {
            Ok(()) => {
                self.monitor
                    .record(SignalEvent::TriggerAdmitted, peer, u32::from(counter));
                log_info!("gate: press {} admitted", counter);
                GateVerdict::Admitted { counter }
            }
            Err(EnqueueError::QueueFull) => {
                self.monitor
                    .record(SignalEvent::ActuationDropped, peer, u32::from(counter));
                log_warn!("gate: actuation queue full, press {} dropped", counter);
                GateVerdict::Dropped { counter }
            }
        }
    }

    fn record_status(&self, peer: u16, measurement: &RangingMeasurement) {
        match measurement.status {
            MeasurementStatus::Ok => {
                // Negative ranging artefacts count as zero distance.
                let distance = measurement.distance_cm.unwrap_or_default().max(0);
                self.monitor
                    .record(SignalEvent::RxSuccess, peer, distance.unsigned_abs());
            }
            MeasurementStatus::RxTimeout => {
                self.monitor
                    .record(SignalEvent::RxTimeout, peer, u32::from(measurement.status.code()));
            }
            status => {
                log_debug!("gate: measurement status {}", status.label());
                self.monitor
                    .record(SignalEvent::RxError, peer, u32::from(status.code()));
            }
        }
    }

    fn check(&self, counter: u8, now: I) -> Result<(), GateRejection> {
        if self.policy.checks_duplicates() && self.last_counter == Some(counter) {
            return Err(GateRejection::Duplicate { counter });
        }

        if let (Some(window), Some(last)) = (self.policy.cooldown_window(), self.last_admitted_at) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < window {
                return Err(GateRejection::CoolingDown {
                    counter,
                    remaining: window - elapsed,
                });
            }
        }

        Ok(())
    }
}
