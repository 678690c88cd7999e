//! Types exchanged with the external ranging session.
//!
//! The session itself (radio driver, FiRa MAC, scheduling) lives outside
//! this crate. The initiator hands payloads to a [`RangingLink`]; the
//! responder receives [`RangingReport`]s, one per ranging block.

use core::fmt;

use heapless::Vec;

/// Largest payload the session can carry on one opportunistic send.
pub const MAX_OPPORTUNISTIC_PAYLOAD: usize = 70;

/// Measurements retained from a single ranging block.
pub const MAX_MEASUREMENTS: usize = 4;

/// Failure reported by the ranging session for an opportunistic send.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// No ranging session is active.
    SessionInactive,
    /// No transmit opportunity is available right now.
    NoSlot,
    /// Payload exceeds [`MAX_OPPORTUNISTIC_PAYLOAD`].
    PayloadTooLarge { len: usize },
    /// Driver-specific status code.
    Stack(i32),
}

impl SendError {
    /// Numeric code recorded as event data by the monitor.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            SendError::SessionInactive => 0xE001,
            SendError::NoSlot => 0xE002,
            SendError::PayloadTooLarge { .. } => 0xE003,
            SendError::Stack(code) => u32::from_ne_bytes(code.to_ne_bytes()),
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::SessionInactive => f.write_str("ranging session inactive"),
            SendError::NoSlot => f.write_str("no transmit opportunity"),
            SendError::PayloadTooLarge { len } => write!(
                f,
                "payload of {len} bytes exceeds {MAX_OPPORTUNISTIC_PAYLOAD}"
            ),
            SendError::Stack(code) => write!(f, "ranging stack error {code}"),
        }
    }
}

/// Outbound side of the ranging session.
pub trait RangingLink {
    /// Queues `payload` for the next transmit opportunity of `session_id`.
    ///
    /// Must not block on the radio; delivery is best-effort.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] when the session refuses the payload.
    fn send_opportunistic(&mut self, session_id: u32, payload: &[u8]) -> Result<(), SendError>;
}

impl<L: RangingLink + ?Sized> RangingLink for &mut L {
    fn send_opportunistic(&mut self, session_id: u32, payload: &[u8]) -> Result<(), SendError> {
        (**self).send_opportunistic(session_id, payload)
    }
}

/// Per-measurement status reported by the ranging session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementStatus {
    Ok,
    TxFailed,
    RxTimeout,
    RxPhyDecode,
    RxToa,
    RxSts,
    RxMacDecode,
    RxMacIeDecode,
    RxMacIeMissing,
    Other(u8),
}

impl MeasurementStatus {
    /// Maps the session's raw status code.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::TxFailed,
            2 => Self::RxTimeout,
            3 => Self::RxPhyDecode,
            4 => Self::RxToa,
            5 => Self::RxSts,
            6 => Self::RxMacDecode,
            7 => Self::RxMacIeDecode,
            8 => Self::RxMacIeMissing,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::TxFailed => 1,
            Self::RxTimeout => 2,
            Self::RxPhyDecode => 3,
            Self::RxToa => 4,
            Self::RxSts => 5,
            Self::RxMacDecode => 6,
            Self::RxMacIeDecode => 7,
            Self::RxMacIeMissing => 8,
            Self::Other(code) => code,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::TxFailed => "TX_FAIL",
            Self::RxTimeout => "RX_TIMEOUT",
            Self::RxPhyDecode => "RX_PHY_DEC",
            Self::RxToa => "RX_TOA",
            Self::RxSts => "RX_STS",
            Self::RxMacDecode => "RX_MAC_DEC",
            Self::RxMacIeDecode => "RX_MAC_IE_DEC",
            Self::RxMacIeMissing => "RX_MAC_IE_MISS",
            Self::Other(_) => "UNKNOWN",
        }
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// One peer measurement within a ranging block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangingMeasurement {
    pub peer_addr: u16,
    pub status: MeasurementStatus,
    pub distance_cm: Option<i32>,
    payload: Vec<u8, MAX_OPPORTUNISTIC_PAYLOAD>,
}

impl RangingMeasurement {
    /// Measurement without piggybacked data.
    #[must_use]
    pub const fn new(peer_addr: u16, status: MeasurementStatus) -> Self {
        Self {
            peer_addr,
            status,
            distance_cm: None,
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_distance(mut self, distance_cm: i32) -> Self {
        self.distance_cm = Some(distance_cm);
        self
    }

    /// Attaches received data, truncated to [`MAX_OPPORTUNISTIC_PAYLOAD`].
    #[must_use]
    pub fn with_payload(mut self, bytes: &[u8]) -> Self {
        if bytes.len() > MAX_OPPORTUNISTIC_PAYLOAD {
            log_warn!(
                "gate: {} byte payload truncated to {}",
                bytes.len(),
                MAX_OPPORTUNISTIC_PAYLOAD
            );
        }
        self.payload.clear();
        self.payload
            .extend(bytes.iter().copied().take(MAX_OPPORTUNISTIC_PAYLOAD));
        self
    }

    /// Received data, if the peer attached any.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        if self.payload.is_empty() {
            None
        } else {
            Some(&self.payload)
        }
    }
}

/// Results delivered by the session for one ranging block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangingReport {
    pub block_index: u32,
    /// Reason code when the session stopped; `None` while ranging.
    pub stopped: Option<u8>,
    pub measurements: Vec<RangingMeasurement, MAX_MEASUREMENTS>,
}

impl RangingReport {
    #[must_use]
    pub const fn new(block_index: u32) -> Self {
        Self {
            block_index,
            stopped: None,
            measurements: Vec::new(),
        }
    }

    /// Report announcing that the session stopped for `reason`.
    #[must_use]
    pub const fn stopped(block_index: u32, reason: u8) -> Self {
        Self {
            block_index,
            stopped: Some(reason),
            measurements: Vec::new(),
        }
    }

    /// Appends a measurement; returns it back when the report is full.
    ///
    /// # Errors
    ///
    /// Returns the measurement when [`MAX_MEASUREMENTS`] is reached.
    pub fn push(&mut self, measurement: RangingMeasurement) -> Result<(), RangingMeasurement> {
        self.measurements.push(measurement)
    }

    /// The validity flag: measurements are only meaningful while ranging.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.stopped.is_none()
    }
}
