use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::ofp_header::{OfpVersion, Xid};

/// Opaque identifier of one transport session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Bytes and close notifications coming from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionInput {
    Data(Vec<u8>),
    Closed,
}

/// What the core asks of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Write(Vec<u8>),
    Close,
}

/// Position of a connection in the handshake.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    Init,
    VersionSet,
    FeaturesRequested,
    ConfigSent,
    AwaitingPortDesc,
    Established,
    NegotiationFailed,
    Closed,
}

impl HandshakeState {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, HandshakeState::NegotiationFailed | HandshakeState::Closed)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Liveness timeout: {0}")]
    LivenessTimeout(String),
    #[error("Abandoned partial {category} reply xid {xid} after {fragments} fragment(s)")]
    FragmentReassemblyAbandoned {
        category: String,
        xid: Xid,
        fragments: usize,
    },
}

/// Per-connection handshake and liveness bookkeeping.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    version: Option<OfpVersion>,
    state: HandshakeState,
    created_at: Instant,
    last_received: Instant,
    last_probe_sent: Option<Instant>,
    outstanding_probes: u8,
}

impl Connection {
    pub fn new(id: ConnectionId, now: Instant) -> Connection {
        Connection {
            id,
            version: None,
            state: HandshakeState::Init,
            created_at: now,
            last_received: now,
            last_probe_sent: None,
            outstanding_probes: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn version(&self) -> Option<OfpVersion> {
        self.version
    }

    /// Record the negotiated version. It can only be set once.
    pub fn set_version(&mut self, version: OfpVersion) -> bool {
        if self.version.is_some() {
            return false;
        }
        self.version = Some(version);
        true
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Move forward in the handshake. Going back is refused, except into `Closed`.
    pub fn transition(&mut self, next: HandshakeState) -> bool {
        if next == HandshakeState::Closed
            || (next > self.state && !self.state.is_terminal_failure())
        {
            debug!("{}: {:?} -> {:?}", self.id, self.state, next);
            self.state = next;
            true
        } else {
            warn!("{}: refused transition {:?} -> {:?}", self.id, self.state, next);
            false
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn last_received(&self) -> Instant {
        self.last_received
    }

    /// Any inbound message proves liveness and clears the outstanding probe.
    pub fn record_inbound(&mut self, now: Instant) {
        self.last_received = now;
        self.outstanding_probes = 0;
    }

    pub fn probe_outstanding(&self) -> bool {
        self.outstanding_probes > 0
    }

    pub fn record_probe(&mut self, now: Instant) {
        self.last_probe_sent = Some(now);
        self.outstanding_probes = 1;
    }

    /// How long the outstanding probe has gone unanswered.
    pub fn probe_age(&self, now: Instant) -> Option<Duration> {
        if !self.probe_outstanding() {
            return None;
        }
        self.last_probe_sent
            .map(|sent| now.saturating_duration_since(sent))
    }
}
