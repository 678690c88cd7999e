//! Wire format for the button-press payload.
//!
//! The payload is four bytes: the ASCII marker `BTN` followed by the
//! initiator's press counter. Receivers accept any buffer of at least four
//! bytes whose first three bytes are the marker; trailing bytes are ignored.

use core::fmt;

use crate::debounce::ButtonId;

/// Marker identifying a button-press payload.
pub const PAYLOAD_MARKER: [u8; 3] = *b"BTN";

/// Encoded payload length in bytes.
pub const PAYLOAD_LEN: usize = 4;

/// Encoded button-press payload.
pub type Payload = [u8; PAYLOAD_LEN];

/// Failure to recognise a received buffer as a button-press payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Buffer shorter than [`PAYLOAD_LEN`].
    TooShort { len: usize },
    /// First three bytes are not [`PAYLOAD_MARKER`].
    NoMarker,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort { len } => {
                write!(f, "payload too short ({len} < {PAYLOAD_LEN} bytes)")
            }
            DecodeError::NoMarker => f.write_str("payload marker missing"),
        }
    }
}

/// Encodes `counter` into a marker payload.
#[must_use]
pub const fn encode(counter: u8) -> Payload {
    [PAYLOAD_MARKER[0], PAYLOAD_MARKER[1], PAYLOAD_MARKER[2], counter]
}

/// Extracts the press counter from a received buffer.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] for buffers under four bytes and
/// [`DecodeError::NoMarker`] when the marker bytes do not match.
pub fn decode(bytes: &[u8]) -> Result<u8, DecodeError> {
    match bytes {
        [a, b, c, counter, ..] if [*a, *b, *c] == PAYLOAD_MARKER => Ok(*counter),
        [_, _, _, _, ..] => Err(DecodeError::NoMarker),
        _ => Err(DecodeError::TooShort { len: bytes.len() }),
    }
}

/// Wrapping 8-bit press counter owned by the initiator.
///
/// Every confirmed press on any button advances the shared counter, so the
/// counter identifies a press rather than a button.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PressCounter(u8);

impl PressCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Advances the counter and returns the new value.
    pub fn advance(&mut self) -> u8 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    /// Returns the most recently issued value.
    #[must_use]
    pub const fn current(self) -> u8 {
        self.0
    }
}

/// A confirmed press awaiting transmission.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PressEvent {
    pub button: ButtonId,
    pub counter: u8,
}

impl PressEvent {
    #[must_use]
    pub const fn new(button: ButtonId, counter: u8) -> Self {
        Self { button, counter }
    }

    /// Wire payload announcing this press.
    #[must_use]
    pub const fn payload(&self) -> Payload {
        encode(self.counter)
    }
}
