//! Synchronous driver for the ZMP `HELLO`/`READY`/`ERROR` handshake
//! (`spec.md` §4.5) that completes before a socket hands its stream to
//! `SocketBase`.
//!
//! The state machine itself is sans-IO ([`crate::session::ZmpSession`]);
//! this module just pumps bytes between it and a real stream so every
//! socket type can call one `await` instead of re-deriving the loop.
//! Completing the handshake here (rather than racing it with application
//! traffic inside the engine loop) means a socket is never handed to its
//! caller in a state where `READY` hasn't been exchanged yet.

use bytes::{Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use compio::time::timeout;
use std::io;
use std::time::Duration;
use tracing::debug;

use crate::codec::ZmpError;
use crate::session::{SessionEvent, SocketType, ZmpSession};

/// Outcome of a successful handshake.
#[derive(Debug)]
pub struct HandshakeResult {
    pub peer_identity: Option<Bytes>,
    pub peer_socket_type: SocketType,
}

const READ_CHUNK: usize = 4096;

/// Drive the ZMP handshake to completion on `stream`, blocking until
/// `READY` has been exchanged in both directions or the peer's socket
/// type is incompatible with ours.
///
/// `stream` must already be past any transport-level handshake (TLS
/// `ClientHello`/`ServerHello`, the WebSocket `Upgrade` exchange) — this
/// function only speaks ZMP.
pub async fn perform_handshake<S>(
    stream: &mut S,
    local_socket_type: SocketType,
    identity: Option<&[u8]>,
) -> io::Result<HandshakeResult>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(socket_type = local_socket_type.as_str(), "starting ZMP handshake");

    let mut session =
        ZmpSession::with_identity(local_socket_type, identity.map(Bytes::copy_from_slice));

    if let Some(hello) = session.start() {
        write_all(stream, hello).await?;
    }

    let mut read_buf = vec![0u8; READ_CHUNK];
    loop {
        let BufResult(res, filled) = stream.read(read_buf).await;
        let n = res?;
        read_buf = filled;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed connection during handshake",
            ));
        }

        let chunk = Bytes::copy_from_slice(&read_buf[..n]);
        for event in session.on_bytes(chunk) {
            match event {
                SessionEvent::SendBytes(bytes) => write_all(stream, bytes).await?,
                SessionEvent::HandshakeComplete {
                    peer_identity,
                    peer_socket_type,
                } => {
                    debug!(peer = peer_socket_type.as_str(), "ZMP handshake complete");
                    return Ok(HandshakeResult {
                        peer_identity,
                        peer_socket_type,
                    });
                }
                SessionEvent::Error(e) => return Err(zmp_error_to_io(e)),
                SessionEvent::PeerError { code, reason } => {
                    return Err(io::Error::other(format!(
                        "peer rejected handshake (code {code}): {reason}"
                    )))
                }
                SessionEvent::Frame(_) => {
                    // Data arriving before HandshakeComplete is a protocol
                    // violation; the session itself never emits this prior
                    // to completion, but guard against future states.
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "received data frame before handshake completed",
                    ));
                }
            }
        }
    }
}

/// [`perform_handshake`] bounded by an optional timeout. `None` blocks
/// indefinitely; `Some(Duration::ZERO)` fails immediately unless the first
/// read is already satisfied.
pub async fn perform_handshake_with_timeout<S>(
    stream: &mut S,
    local_socket_type: SocketType,
    identity: Option<&[u8]>,
    duration: Option<Duration>,
) -> io::Result<HandshakeResult>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match duration {
        None => perform_handshake(stream, local_socket_type, identity).await,
        Some(d) => match timeout(d, perform_handshake(stream, local_socket_type, identity)).await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "ZMP handshake timed out",
            )),
        },
    }
}

async fn write_all<S>(stream: &mut S, bytes: Bytes) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let buf = BytesMut::from(&bytes[..]);
    let BufResult(res, _) = stream.write_all(buf).await;
    res
}

fn zmp_error_to_io(e: ZmpError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    // `ZmpSession::full_handshake_between_two_sessions` (in `session.rs`)
    // already exercises the sans-IO state machine end to end; here we only
    // check that a truncated connection during handshake surfaces as an
    // I/O error rather than panicking or hanging.
    #[derive(Default)]
    struct EmptyStream;

    impl compio::io::AsyncRead for EmptyStream {
        async fn read<B: compio::buf::IoBufMut>(
            &mut self,
            buf: B,
        ) -> compio::buf::BufResult<usize, B> {
            compio::buf::BufResult(Ok(0), buf)
        }
    }

    impl compio::io::AsyncWrite for EmptyStream {
        async fn write<B: compio::buf::IoBuf>(&mut self, buf: B) -> compio::buf::BufResult<usize, B> {
            let n = buf.buf_len();
            compio::buf::BufResult(Ok(n), buf)
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        async fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_peer_surfaces_as_eof() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let mut stream = EmptyStream;
            let result = perform_handshake(&mut stream, SocketType::Pair, None).await;
            assert!(result.is_err());
            assert_eq!(result.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        });
    }
}
