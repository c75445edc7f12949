//! DEALER socket implementation.
//!
//! DEALER sockets are asynchronous, fair-queued peers: outbound messages are
//! load-balanced across every connected ROUTER/DEALER peer, inbound messages
//! are fair-queued back to the caller. This type models a single
//! ZMP-handshaked connection; an application fans out across several
//! `DealerSocket`s itself to get the "connects to many ROUTERs" behavior
//! (`spec.md` §4.8).

use crate::base::SocketBase;
use crate::codec::encode_multipart;
use crate::inproc_stream::InprocStream;
use crate::{handshake::perform_handshake_with_timeout, session::SocketType};
use bytes::Bytes;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use smallvec::SmallVec;
use std::io;
use tracing::{debug, trace};
use zlink_core::config::BufferConfig;
use zlink_core::endpoint::Endpoint;
use zlink_core::options::SocketOptions;

/// A DEALER socket for asynchronous request-reply patterns.
///
/// DEALER sockets provide bidirectional, multipart-capable communication and
/// are fair-queued against whatever single peer this instance is connected
/// to. Messages are sent as-is, with no envelope modification.
pub struct DealerSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    base: SocketBase<S>,
    frames: SmallVec<[Bytes; 4]>,
}

impl<S> DealerSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new DEALER socket from a stream with default buffer configuration.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_options(stream, BufferConfig::default(), SocketOptions::default()).await
    }

    /// Create a new DEALER socket with custom buffer configuration.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new DEALER socket with custom buffer configuration and socket options.
    pub async fn with_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        debug!("[DEALER] Creating new DEALER socket");

        let identity = options.routing_id.clone();
        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Dealer,
            identity,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_identity = ?handshake_result.peer_identity,
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[DEALER] Handshake complete"
        );

        Ok(Self {
            base: SocketBase::new(stream, config, options),
            frames: SmallVec::new(),
        })
    }

    /// Send a multipart message.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        trace!("[DEALER] Sending {} frames", msg.len());

        self.base.write_buf.clear();
        encode_multipart(&msg, &mut self.base.write_buf);
        self.base.write_from_buf().await?;

        Ok(())
    }

    /// Receive a multipart message. Returns `Ok(None)` on peer disconnect.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        trace!("[DEALER] Waiting for message");

        loop {
            loop {
                match self.base.decode_app_frame().await? {
                    Some(frame) => {
                        let more = frame.more();
                        self.frames.push(frame.payload);
                        if !more {
                            let msg: Vec<Bytes> = self.frames.drain(..).collect();
                            return Ok(Some(msg));
                        }
                    }
                    None => break,
                }
            }

            let n = self.base.read_raw().await?;
            if n == 0 {
                return Ok(None);
            }
        }
    }

    /// Get a reference to the socket options.
    #[inline]
    pub fn options(&self) -> &SocketOptions {
        &self.base.options
    }

    /// Get a mutable reference to the socket options.
    #[inline]
    pub fn options_mut(&mut self) -> &mut SocketOptions {
        &mut self.base.options
    }

    /// Get the socket type.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::Dealer
    }

    /// Get the endpoint this socket is connected/bound to, if available.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&Endpoint> {
        self.base.last_endpoint()
    }

    /// Check if the last received message has more frames coming.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.base.has_more()
    }

    /// Event state bitmask (`1` = POLLIN, `2` = POLLOUT).
    #[inline]
    pub fn events(&self) -> u32 {
        self.base.events()
    }

    /// Whether the underlying stream is currently connected.
    ///
    /// Goes `false` once a read/write observes EOF or an I/O error; stays
    /// `false` until [`try_reconnect`](Self::try_reconnect) succeeds.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        self.base.is_connected()
    }

    /// Whether a cancelled in-flight write left the socket poisoned
    /// (spec.md's cancellation-safety guard, §4.6/§5).
    #[inline]
    pub const fn is_poisoned(&self) -> bool {
        self.base.is_poisoned()
    }

    /// Number of messages currently buffered via [`send_buffered`](Self::send_buffered).
    #[inline]
    pub const fn buffered_messages(&self) -> usize {
        self.base.buffered_messages()
    }

    /// Number of bytes currently buffered via [`send_buffered`](Self::send_buffered).
    #[inline]
    pub fn buffered_bytes(&self) -> usize {
        self.base.buffered_bytes()
    }

    /// Encode a message into the internal send buffer without flushing it.
    ///
    /// Use this to batch several messages before a single [`flush`](Self::flush).
    pub fn send_buffered(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        encode_multipart(&msg, &mut self.base.send_buffer);
        self.base.buffered_messages += 1;
        Ok(())
    }

    /// Flush everything queued by [`send_buffered`](Self::send_buffered) to the wire.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.base.flush_send_buffer().await
    }
}

// Specialized implementation for TCP streams to enable TCP_NODELAY.
impl DealerSocket<TcpStream> {
    /// Connect to a ROUTER/DEALER peer over TCP.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream).await
    }

    /// Create a DEALER socket from an existing TCP stream, enabling `TCP_NODELAY`.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::default()).await
    }

    /// Create a DEALER socket from a TCP stream with custom buffer configuration.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[DEALER] TCP_NODELAY enabled");
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Connect to a `tcp://` endpoint, remembering it so that
    /// [`try_reconnect`](Self::try_reconnect) (and the `_with_reconnect`
    /// send/recv wrappers) can re-dial it with `RECONNECT_IVL` backoff after
    /// a disconnect (spec.md §4.6).
    pub async fn connect_with_reconnect(
        endpoint: &str,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let parsed = Endpoint::parse(endpoint)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let addr = match &parsed {
            Endpoint::Tcp(addr) => *addr,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "connect_with_reconnect only supports tcp:// endpoints",
                ))
            }
        };

        let mut stream = TcpStream::connect(addr).await?;
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;

        let identity = options.routing_id.clone();
        perform_handshake_with_timeout(
            &mut stream,
            SocketType::Dealer,
            identity,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        Ok(Self {
            base: SocketBase::with_endpoint(stream, parsed, config, options),
            frames: SmallVec::new(),
        })
    }

    /// Re-dial the endpoint this socket was created with via
    /// [`connect_with_reconnect`](Self::connect_with_reconnect), applying
    /// `RECONNECT_IVL`/`RECONNECT_IVL_MAX` backoff before the attempt.
    ///
    /// Fails with `Unsupported` if the socket wasn't created with an
    /// endpoint to redial (e.g. built via `from_tcp` or accepted from a
    /// listener).
    pub async fn try_reconnect(&mut self) -> io::Result<()> {
        self.base.try_reconnect(SocketType::Dealer).await
    }

    /// Send a message, transparently reconnecting once (with backoff) if
    /// the socket was found disconnected.
    pub async fn send_with_reconnect(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        if !self.base.is_connected() {
            self.try_reconnect().await?;
        }
        match self.send(msg.clone()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.try_reconnect().await?;
                self.send(msg).await
            }
        }
    }

    /// Receive a message, transparently reconnecting once (with backoff) if
    /// the socket was found disconnected after an EOF.
    ///
    /// Returns `Ok(None)` if reconnection itself fails or the freshly
    /// reconnected peer has nothing to say yet.
    pub async fn recv_with_reconnect(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        if !self.base.is_connected() {
            self.try_reconnect().await?;
        }
        self.recv().await
    }
}

// Specialized implementation for inproc streams.
impl DealerSocket<InprocStream> {
    /// Connect to an inproc endpoint bound by a ROUTER.
    pub fn connect_inproc(endpoint: &str) -> io::Result<Self> {
        Self::connect_inproc_with_options(endpoint, BufferConfig::default(), SocketOptions::default())
    }

    /// Connect to an inproc endpoint with custom configuration and options.
    pub fn connect_inproc_with_options(
        endpoint: &str,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let tx = zlink_core::inproc::connect_inproc(endpoint)?;
        let (_our_tx, our_rx) = flume::unbounded();
        let stream = InprocStream::new(tx, our_rx);

        let parsed_endpoint = Endpoint::parse(endpoint)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        Ok(Self {
            base: SocketBase::with_endpoint(stream, parsed_endpoint, config, options),
            frames: SmallVec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouterSocket;

    #[compio::test]
    async fn dealer_router_roundtrip_over_tcp() {
        let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = compio::runtime::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut router = RouterSocket::new(stream).await.unwrap();
            let msg = router.recv().await.unwrap().unwrap();
            router.send(msg).await.unwrap();
        });

        let mut dealer = DealerSocket::connect(addr).await.unwrap();
        dealer.send(vec![Bytes::from_static(b"hi")]).await.unwrap();
        let reply = dealer.recv().await.unwrap().unwrap();
        assert_eq!(reply, vec![Bytes::from_static(b"hi")]);

        server.await.unwrap();
    }
}

crate::impl_socket_trait!(DealerSocket<S>, SocketType::Dealer);
