//! ZLink error types.
//!
//! Comprehensive, typed error handling for all ZLink operations, covering
//! the error kinds catalogued in `spec.md` §7 plus the I/O-adjacent variants
//! the transport and handshake layers already relied on.

use std::io;
use thiserror::Error;

/// Main error type for ZLink operations.
#[derive(Error, Debug)]
pub enum ZLinkError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A non-blocking operation would have blocked (`EAGAIN`).
    #[error("operation would block")]
    Again,

    /// A blocking call was unblocked by context shutdown.
    #[error("blocking call interrupted by shutdown")]
    Interrupted,

    /// Operation attempted on a socket whose context is terminating.
    #[error("context is terminating")]
    ContextTerminated,

    /// Bad endpoint, bad option value, or unknown option.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bind failed: address already in use.
    #[error("address in use: {0}")]
    AddressInUse(String),

    /// Bind/connect failed: address not available on this host.
    #[error("address not available: {0}")]
    AddressNotAvailable(String),

    /// Connect failed: no route to the network.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Connect failed: no route to the host.
    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    /// Peer actively refused the connection.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Peer reset the connection.
    #[error("connection reset")]
    ConnectionReset,

    /// Connection was aborted locally (e.g. by `term`).
    #[error("connection aborted")]
    ConnectionAborted,

    /// Operation attempted on a socket with no live peer.
    #[error("not connected")]
    NotConnected,

    /// Heartbeat deadline, or a `SNDTIMEO`/`RCVTIMEO` deadline, elapsed.
    #[error("operation timed out")]
    Timeout,

    /// Protocol error during ZMP handshake or framing
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A decoded frame or message exceeded `MAXMSGSIZE`.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// ZMP validation failure (magic/version/flags/body-length/metadata);
    /// carries the error code from `spec.md` §4.4.2.
    #[error("ZMP protocol error (code {code}): {reason}")]
    ProtocolError { code: u8, reason: String },

    /// Operation not valid in the socket's current state (e.g. `send` on a
    /// socket type that never sends).
    #[error("invalid operation for current socket state: {0}")]
    StateMachine(String),

    /// HELLO socket-type compatibility check failed.
    #[error("no compatible protocol: {0}")]
    NoCompatibleProtocol(String),

    /// The buffer pool is exhausted and no further slabs are available.
    #[error("out of memory")]
    OutOfMemory,

    /// Handshake timeout
    #[error("handshake timeout after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// Invalid greeting/HELLO payload received
    #[error("invalid greeting: {0}")]
    InvalidGreeting(String),

    /// Invalid frame format
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Socket closed
    #[error("socket closed")]
    SocketClosed,

    /// Channel send error
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive error
    #[error("channel receive error")]
    ChannelRecv,

    /// Peer disconnected
    #[error("peer disconnected: {0}")]
    PeerDisconnected(String),

    /// Invalid routing ID
    #[error("invalid routing id")]
    InvalidRoutingId,

    /// Subscription error
    #[error("subscription error: {0}")]
    Subscription(String),
}

/// Result type alias for ZLink operations
pub type Result<T> = std::result::Result<T, ZLinkError>;

impl ZLinkError {
    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a ZMP protocol error carrying one of the §4.4.2 error codes.
    pub fn zmp_protocol(code: u8, reason: impl Into<String>) -> Self {
        Self::ProtocolError {
            code,
            reason: reason.into(),
        }
    }

    /// Create an invalid greeting error
    pub fn invalid_greeting(msg: impl Into<String>) -> Self {
        Self::InvalidGreeting(msg.into())
    }

    /// Create an invalid frame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create a peer disconnected error
    pub fn peer_disconnected(peer_id: impl Into<String>) -> Self {
        Self::PeerDisconnected(peer_id.into())
    }

    /// Map a raw OS error (from a transport read/write/connect) onto the
    /// spec's transport-level error kinds.
    #[must_use]
    pub fn from_io_kind(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse => Self::AddressInUse(err.to_string()),
            io::ErrorKind::AddrNotAvailable => Self::AddressNotAvailable(err.to_string()),
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused(err.to_string()),
            io::ErrorKind::ConnectionReset => Self::ConnectionReset,
            io::ErrorKind::ConnectionAborted => Self::ConnectionAborted,
            io::ErrorKind::NotConnected => Self::NotConnected,
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::WouldBlock => Self::Again,
            io::ErrorKind::Interrupted => Self::Interrupted,
            _ => Self::Io(err),
        }
    }

    /// Check if this error is recoverable (worth retrying the same op).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::Again | Self::Interrupted => true,
            _ => false,
        }
    }

    /// Check if this is a connection-level error (candidate for the
    /// session's reconnect-with-backoff path rather than hard termination).
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::SocketClosed
                | Self::PeerDisconnected(_)
                | Self::HandshakeTimeout(_)
                | Self::ConnectionReset
                | Self::ConnectionAborted
                | Self::NotConnected
                | Self::Timeout
        )
    }

    /// Whether this is a fatal protocol violation that must not trigger a
    /// reconnect (spec.md §4.6: "on `ProtocolError` the session terminates
    /// without retry").
    #[must_use]
    pub const fn is_protocol_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProtocolError { .. } | Self::NoCompatibleProtocol(_) | Self::MessageTooLarge { .. }
        )
    }
}
