//! Common utilities for ZeroMQ socket implementations.

use std::io;
use zlink_core::monitor::DisconnectReason;

/// Convert a channel send error to an IO error.
///
/// Used by all socket types to convert flume channel errors
/// into standard IO errors with BrokenPipe kind.
pub fn channel_to_io_error<T, E>(result: Result<T, E>) -> io::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))
}

/// Classify a `recv`/`send` I/O error for a [`zlink_core::monitor::SocketEvent::Disconnected`]
/// report: `TimedOut` maps to a heartbeat timeout (the only source of
/// `recv_timeout`-free timeouts once a socket is past its handshake),
/// everything else carries its message through.
pub fn disconnect_reason_for(err: &io::Error) -> DisconnectReason {
    match err.kind() {
        io::ErrorKind::TimedOut => DisconnectReason::Timeout,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::NotConnected => DisconnectReason::Closed,
        _ => DisconnectReason::Error(err.to_string()),
    }
}
