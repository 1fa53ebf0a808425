//! Network session boundary
//!
//! The transport that negotiates and carries media (the ICE/SDP/SRTP
//! machinery of the reference system) lives behind [`PeerSession`]. The
//! bridge core only sees its outbound primitives and a stream of
//! [`SessionEvent`]s; [`SignalingExchange`] is the out-of-band description
//! swap that pairs two sessions up.

pub mod udp;

pub use udp::{StaticSignaling, UdpSession};

use crossbeam_channel::Receiver;

use crate::error::SessionError;

/// Connectivity states reported by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    /// Terminal states: the session will never carry media again
    pub fn is_terminal(self) -> bool {
        matches!(self, PeerState::Disconnected | PeerState::Failed | PeerState::Closed)
    }
}

/// Events delivered by a peer session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connectivity state changed
    StateChange(PeerState),
    /// Local description is ready for the signaling exchange
    LocalDescription(String),
    /// The peer's data channel became available
    DataChannelOpen,
    /// Inbound data channel message
    DataChannelMessage(Vec<u8>),
    /// Inbound media frame (compressed samples)
    Media(Vec<u8>),
}

/// Bidirectional media session toward one peer
pub trait PeerSession: Send + Sync {
    /// Send one compressed media frame
    fn send_media(&self, data: &[u8]) -> Result<(), SessionError>;

    /// Send a message on the data channel
    fn send_control(&self, data: &[u8]) -> Result<(), SessionError>;

    /// Apply the remote description returned by signaling
    fn set_remote_description(&self, description: &str) -> Result<(), SessionError>;

    /// Start negotiation; the local description surfaces as an event
    fn create_offer(&self) -> Result<(), SessionError>;

    /// Open a named data channel toward the peer
    fn create_data_channel(&self, label: &str) -> Result<(), SessionError>;

    /// Process the session's internal events
    ///
    /// Must be called on a fixed cadence (reference: 15 ms).
    fn pump(&self);

    /// Event stream for the lifecycle controller
    fn events(&self) -> Receiver<SessionEvent>;
}

/// Out-of-band description exchange (HTTP in the reference system)
pub trait SignalingExchange: Send + Sync {
    /// Post the local description, blocking until the peer's arrives
    fn exchange(&self, local_description: &str) -> Result<String, SessionError>;
}
