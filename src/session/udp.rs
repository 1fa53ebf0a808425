//! UDP-backed peer session
//!
//! A single-socket LAN transport implementing [`PeerSession`]: datagrams
//! carry a one-byte kind tag followed by the payload, the "description"
//! exchanged through signaling is the socket's own address, and a
//! hello/ack round trip drives the connectivity state machine. There is no
//! congestion control or jitter handling here; those belong to the full
//! transport this stands in for.

use bytes::{BufMut, BytesMut};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};

use crate::error::SessionError;
use crate::session::{PeerSession, PeerState, SessionEvent, SignalingExchange};

/// Maximum datagram payload (MTU minus IP/UDP headers and the kind tag)
const MAX_PAYLOAD: usize = 1471;

/// Datagram kind tags
mod kind {
    pub const HELLO: u8 = 0;
    pub const ACK: u8 = 1;
    pub const MEDIA: u8 = 2;
    pub const CONTROL: u8 = 3;
    pub const CHANNEL_OPEN: u8 = 4;
    pub const BYE: u8 = 5;
}

/// Description prefix, the SDP-equivalent of this transport
const DESCRIPTION_PREFIX: &str = "udp:";

/// One-socket UDP peer session
pub struct UdpSession {
    socket: UdpSocket,
    state: Mutex<PeerState>,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
}

impl UdpSession {
    /// Bind the media socket
    pub fn bind(addr: &str) -> Result<Self, SessionError> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| SessionError::CreateFailed(format!("invalid bind address: {addr}")))?;

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;
        socket
            .set_recv_buffer_size(256 * 1024)
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;
        socket
            .bind(&addr.into())
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;

        let (event_tx, event_rx) = unbounded();
        Ok(Self {
            socket: socket.into(),
            state: Mutex::new(PeerState::New),
            event_tx,
            event_rx,
        })
    }

    /// Local description string for the signaling exchange
    pub fn local_description(&self) -> Result<String, SessionError> {
        let addr = self
            .socket
            .local_addr()
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;
        Ok(format!("{DESCRIPTION_PREFIX}{addr}"))
    }

    fn transition(&self, next: PeerState) {
        let mut state = self.state.lock();
        if *state == next {
            return;
        }
        *state = next;
        drop(state);
        let _ = self.event_tx.send(SessionEvent::StateChange(next));
        // The data channel rides the connection itself: report it usable as
        // soon as the handshake completes, the way the full transport's
        // onopen callback does
        if next == PeerState::Connected {
            let _ = self.event_tx.send(SessionEvent::DataChannelOpen);
        }
    }

    /// Current connectivity state
    pub fn state(&self) -> PeerState {
        *self.state.lock()
    }

    fn send_datagram(&self, tag: u8, payload: &[u8]) -> Result<(), SessionError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(SessionError::SendFailed(format!(
                "payload of {} bytes exceeds datagram limit",
                payload.len()
            )));
        }

        let mut datagram = BytesMut::with_capacity(1 + payload.len());
        datagram.put_u8(tag);
        datagram.put_slice(payload);

        match self.socket.send(&datagram) {
            Ok(_) => Ok(()),
            Err(e) => {
                // A refused send means the peer is gone
                if e.kind() == std::io::ErrorKind::ConnectionRefused {
                    self.transition(PeerState::Disconnected);
                }
                Err(SessionError::SendFailed(e.to_string()))
            }
        }
    }

    /// Send the goodbye tag and close the session
    pub fn close(&self) {
        let _ = self.send_datagram(kind::BYE, &[]);
        self.transition(PeerState::Closed);
    }
}

impl PeerSession for UdpSession {
    fn send_media(&self, data: &[u8]) -> Result<(), SessionError> {
        if self.state().is_terminal() {
            return Err(SessionError::Closed);
        }
        self.send_datagram(kind::MEDIA, data)
    }

    fn send_control(&self, data: &[u8]) -> Result<(), SessionError> {
        if self.state() != PeerState::Connected {
            return Err(SessionError::NoDataChannel);
        }
        self.send_datagram(kind::CONTROL, data)
    }

    fn set_remote_description(&self, description: &str) -> Result<(), SessionError> {
        let addr = description
            .strip_prefix(DESCRIPTION_PREFIX)
            .ok_or_else(|| SessionError::InvalidDescription(description.to_string()))?;
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| SessionError::InvalidDescription(description.to_string()))?;

        self.socket
            .connect(addr)
            .map_err(|e| SessionError::CreateFailed(e.to_string()))?;
        self.transition(PeerState::Checking);
        self.send_datagram(kind::HELLO, &[])
    }

    fn create_offer(&self) -> Result<(), SessionError> {
        let description = self.local_description()?;
        self.transition(PeerState::Connecting);
        let _ = self
            .event_tx
            .send(SessionEvent::LocalDescription(description));
        Ok(())
    }

    fn create_data_channel(&self, label: &str) -> Result<(), SessionError> {
        if self.state() != PeerState::Connected {
            return Err(SessionError::NoDataChannel);
        }
        self.send_datagram(kind::CHANNEL_OPEN, label.as_bytes())
    }

    fn pump(&self) {
        let mut buf = [0u8; 1500];
        loop {
            let n = match self.socket.recv(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    self.transition(PeerState::Disconnected);
                    break;
                }
                Err(e) => {
                    tracing::warn!("session recv failed: {e}");
                    break;
                }
            };
            if n == 0 {
                continue;
            }

            let payload = buf[1..n].to_vec();
            match buf[0] {
                kind::HELLO => {
                    let _ = self.send_datagram(kind::ACK, &[]);
                    self.transition(PeerState::Connected);
                }
                kind::ACK => {
                    self.transition(PeerState::Connected);
                }
                kind::MEDIA => {
                    let _ = self.event_tx.send(SessionEvent::Media(payload));
                }
                kind::CONTROL => {
                    let _ = self.event_tx.send(SessionEvent::DataChannelMessage(payload));
                }
                kind::CHANNEL_OPEN => {
                    let _ = self.event_tx.send(SessionEvent::DataChannelOpen);
                }
                kind::BYE => {
                    self.transition(PeerState::Closed);
                }
                other => {
                    tracing::debug!("ignoring datagram with unknown tag {other}");
                }
            }
        }
    }

    fn events(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }
}

/// Signaling exchange with a pre-shared peer description
///
/// Stands in for the HTTP description swap when the peer address is already
/// known (LAN deployments, tests).
pub struct StaticSignaling {
    remote_description: String,
}

impl StaticSignaling {
    pub fn new(remote_description: impl Into<String>) -> Self {
        Self {
            remote_description: remote_description.into(),
        }
    }

    /// Build from a bare peer address
    pub fn for_peer(addr: &str) -> Self {
        Self::new(format!("{DESCRIPTION_PREFIX}{addr}"))
    }
}

impl SignalingExchange for StaticSignaling {
    fn exchange(&self, local_description: &str) -> Result<String, SessionError> {
        tracing::info!("signaling: offering {local_description}");
        Ok(self.remote_description.clone())
    }
}
