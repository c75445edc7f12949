//! Socket event monitoring.
//!
//! Provides event streams for tracking socket lifecycle events like
//! connections, disconnections, and errors.

use crate::endpoint::Endpoint;
use std::fmt;

/// Why a socket disconnected, carried on [`SocketEvent::Disconnected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed the connection (clean EOF).
    Closed,
    /// No heartbeat `PONG` arrived within `HEARTBEAT_TIMEOUT` of the last
    /// `PING` (spec.md §4.5).
    Timeout,
    /// Any other I/O failure; carries `io::Error::to_string()`.
    Error(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Sub-reason for a [`SocketEvent::HandshakeFailed`] event (`spec.md` §6.4).
///
/// Two header variants of the source material numbered these differently;
/// this is the canonical, de-duplicated set. `value` on the wire event is
/// the §4.4.2 validation error code for `Protocol`, 0 otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeFailureDetail {
    /// Transport-level handshake (TLS/WS upgrade) failed before any ZMP
    /// traffic was exchanged; no further detail is available.
    NoDetail,
    /// ZMP HELLO/READY validation failed; carries the §4.4.2 error code
    /// (e.g. `2` for socket-type mismatch).
    Protocol(u8),
    /// PLAIN authentication rejected the peer's credentials.
    Auth,
}

impl fmt::Display for HandshakeFailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDetail => write!(f, "no detail"),
            Self::Protocol(code) => write!(f, "protocol error (code {code})"),
            Self::Auth => write!(f, "authentication rejected"),
        }
    }
}

/// Socket lifecycle events, matching the catalogue in `spec.md` §6.4.
///
/// `Connected` fires on a bare transport connect; `ConnectionReady` fires
/// once the ZMP (or raw, for STREAM) handshake completes and the socket is
/// ready to exchange application frames — the canonical name for what one
/// header variant of the source material called `HANDSHAKE_SUCCEEDED`.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Socket successfully connected to a peer (transport level).
    Connected(Endpoint),

    /// Connection attempt is being retried after backoff, and has not yet
    /// succeeded by the time a monitor-visible delay elapsed.
    ConnectDelayed(Endpoint),

    /// A reconnect attempt fired per `RECONNECT_IVL` backoff.
    ConnectRetried { endpoint: Endpoint, attempt: u32 },

    /// Socket disconnected from a peer.
    Disconnected {
        endpoint: Endpoint,
        reason: DisconnectReason,
    },

    /// Socket successfully bound to an endpoint.
    Bound(Endpoint),

    /// Bind operation failed.
    BindFailed { endpoint: Endpoint, reason: String },

    /// Connection attempt failed.
    ConnectFailed { endpoint: Endpoint, reason: String },

    /// Socket is listening for incoming connections.
    Listening(Endpoint),

    /// Socket accepted a new incoming connection.
    Accepted(Endpoint),

    /// Accepting an incoming connection failed (e.g. `accept()` error).
    AcceptFailed { endpoint: Endpoint, reason: String },

    /// The ZMP (or transport) handshake with a peer failed.
    HandshakeFailed {
        endpoint: Endpoint,
        detail: HandshakeFailureDetail,
    },

    /// The handshake completed and the socket is ready for application
    /// traffic. Canonical replacement for the source material's
    /// `HANDSHAKE_SUCCEEDED` synonym.
    ConnectionReady(Endpoint),

    /// Socket (or one of its connections) closed cleanly.
    Closed(Endpoint),

    /// Closing a socket/connection failed.
    CloseFailed { reason: String },

    /// The monitor channel itself was torn down (socket closed, no more
    /// events will follow).
    MonitorStopped,
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(ep) => write!(f, "Connected to {ep}"),
            Self::ConnectDelayed(ep) => write!(f, "Connect delayed for {ep}"),
            Self::ConnectRetried { endpoint, attempt } => {
                write!(f, "Connect retry #{attempt} for {endpoint}")
            }
            Self::Disconnected { endpoint, reason } => {
                write!(f, "Disconnected from {endpoint} ({reason})")
            }
            Self::Bound(ep) => write!(f, "Bound to {ep}"),
            Self::BindFailed { endpoint, reason } => {
                write!(f, "Bind failed for {endpoint}: {reason}")
            }
            Self::ConnectFailed { endpoint, reason } => {
                write!(f, "Connect failed for {endpoint}: {reason}")
            }
            Self::Listening(ep) => write!(f, "Listening on {ep}"),
            Self::Accepted(ep) => write!(f, "Accepted connection from {ep}"),
            Self::AcceptFailed { endpoint, reason } => {
                write!(f, "Accept failed on {endpoint}: {reason}")
            }
            Self::HandshakeFailed { endpoint, detail } => {
                write!(f, "Handshake failed with {endpoint}: {detail}")
            }
            Self::ConnectionReady(ep) => write!(f, "Connection ready with {ep}"),
            Self::Closed(ep) => write!(f, "Closed {ep}"),
            Self::CloseFailed { reason } => write!(f, "Close failed: {reason}"),
            Self::MonitorStopped => write!(f, "Monitor stopped"),
        }
    }
}

/// Handle for receiving socket events.
///
/// This is a channel receiver that provides a stream of socket lifecycle events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Internal sender for socket events.
///
/// This is exposed publicly to allow socket implementations to emit events.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
///
/// This is exposed publicly to allow socket implementations to create monitors.
#[must_use] 
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_socket_event_display() {
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let event = SocketEvent::Connected(Endpoint::Tcp(addr));
        assert_eq!(event.to_string(), "Connected to tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_disconnected_timeout_display() {
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let event = SocketEvent::Disconnected {
            endpoint: Endpoint::Tcp(addr),
            reason: DisconnectReason::Timeout,
        };
        assert_eq!(
            event.to_string(),
            "Disconnected from tcp://127.0.0.1:5555 (timeout)"
        );
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        sender.send(SocketEvent::Connected(Endpoint::Tcp(addr))).unwrap();
        
        let event = receiver.recv().unwrap();
        assert!(matches!(event, SocketEvent::Connected(_)));
    }
}
