//! Static ranging session parameters.

use core::fmt;

/// Session identifier configured on both devices.
pub const DEFAULT_SESSION_ID: u32 = 42;

/// Short address used by the initiating (button) device.
pub const INITIATOR_SHORT_ADDR: u16 = 0x0001;

/// Short address used by the responding (servo) device.
pub const RESPONDER_SHORT_ADDR: u16 = 0x0002;

/// Which end of the link this device plays.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Four-letter tag used in per-event monitor lines.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Role::Initiator => "INIT",
            Role::Responder => "RESP",
        }
    }

    /// Upper-case role name used in the status report header.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Role::Initiator => "INITIATOR",
            Role::Responder => "RESPONDER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        })
    }
}

/// Parameters identifying this device within the ranging session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionContext {
    pub session_id: u32,
    pub role: Role,
    pub short_addr: u16,
    pub peer_addr: u16,
}

impl SessionContext {
    /// Session context for the button device.
    #[must_use]
    pub const fn initiator() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID,
            role: Role::Initiator,
            short_addr: INITIATOR_SHORT_ADDR,
            peer_addr: RESPONDER_SHORT_ADDR,
        }
    }

    /// Session context for the servo device.
    #[must_use]
    pub const fn responder() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID,
            role: Role::Responder,
            short_addr: RESPONDER_SHORT_ADDR,
            peer_addr: INITIATOR_SHORT_ADDR,
        }
    }

    /// Session context for the given role with default addressing.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Initiator => Self::initiator(),
            Role::Responder => Self::responder(),
        }
    }

    /// Returns `true` when `addr` identifies the configured peer.
    #[must_use]
    pub const fn is_peer(&self, addr: u16) -> bool {
        self.peer_addr == addr
    }

    /// Emits the startup banner describing the session parameters.
    pub fn log_startup(&self) {
        log_info!(
            "session: id={} role={} addr={:#x} peer={:#x}",
            self.session_id,
            self.role.tag(),
            self.short_addr,
            self.peer_addr
        );
    }
}
