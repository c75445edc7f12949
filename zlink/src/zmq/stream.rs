//! STREAM socket implementation.

use bytes::Bytes;
use compio::net::TcpStream;
use zlink_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use zlink_proto::stream::{ConnectionId, StreamListener as InternalStreamListener, StreamSocket as InternalStream};
use zlink_proto::SocketType;
use std::io;

/// A STREAM socket for exchanging raw, length-prefixed frames with a peer
/// that does not speak ZMP at all — no HELLO/READY handshake runs on this
/// connection.
///
/// STREAM sockets are used for:
///
/// - Bridging ZLink to arbitrary TCP clients (e.g. a raw protocol gateway)
/// - Implementing custom framing on top of a plain byte stream
///
/// A zero-length payload from `recv()` signals that the peer closed its
/// write half; `recv()` returning `None` means the underlying TCP connection
/// itself reached EOF.
///
/// Built in the spirit of libzmq's `STREAM` socket, but speaks ZLink's own
/// raw length-prefixed codec, not ZMTP — it is not wire-compatible with
/// libzmq.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::StreamSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut socket = StreamSocket::connect("127.0.0.1:5555").await?;
/// socket.send(Bytes::from("hello")).await?;
/// if let Some((_, payload)) = socket.recv().await? {
///     println!("received: {:?}", payload);
/// }
/// # Ok(())
/// # }
/// ```
pub struct StreamSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalStream<S>,
    monitor: Option<SocketEventSender>,
}

impl StreamSocket {
    /// Connect to a remote peer speaking the raw length-prefixed codec.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStream::connect(addr).await?,
            monitor: None,
        })
    }

    /// Bind and accept a single connection.
    ///
    /// Use [`StreamListener`] to accept and multiplex many STREAM peers on
    /// one bound address.
    pub async fn bind(
        addr: impl compio::net::ToSocketAddrsAsync,
    ) -> io::Result<(compio::net::TcpListener, Self)> {
        let (listener, inner) = InternalStream::bind(addr).await?;
        Ok((listener, Self { inner, monitor: None }))
    }

    /// Create a STREAM socket from an existing TCP stream with custom
    /// socket options.
    pub async fn from_tcp_with_options(
        stream: TcpStream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStream::with_options(
                stream,
                zlink_core::config::BufferConfig::default(),
                options,
            )
            .await?,
            monitor: None,
        })
    }
}

// Generic impl - works with any stream type
impl<S> StreamSocket<S>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    /// Enable monitoring for this socket.
    pub fn monitor(&mut self) -> SocketMonitor {
        let (sender, receiver) = create_monitor();
        self.monitor = Some(sender);
        receiver
    }

    /// Helper to emit monitoring events (if monitoring is enabled).
    #[allow(dead_code)]
    fn emit_event(&self, event: SocketEvent) {
        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(event);
        }
    }

    /// Local identifier for this connection, stable for its lifetime and
    /// never transmitted on the wire.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection_id()
    }

    /// Send one raw frame.
    pub async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        self.inner.send(payload).await
    }

    /// Receive one raw frame, as `(connection_id, payload)`.
    ///
    /// Returns `Ok(None)` once the underlying stream reaches true EOF.
    pub async fn recv(&mut self) -> io::Result<Option<(ConnectionId, Bytes)>> {
        self.inner.recv().await
    }

    /// Close the connection.
    pub async fn close(self) -> io::Result<()> {
        self.inner.close().await
    }

    /// Get the socket type.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_TYPE` (16) option.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::Stream
    }
}

// Unix-specific impl for IPC support
#[cfg(unix)]
impl StreamSocket<compio::net::UnixStream> {
    /// Create a STREAM socket from an existing Unix domain socket stream (IPC).
    pub async fn from_unix_stream(stream: compio::net::UnixStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStream::new(stream).await?,
            monitor: None,
        })
    }

    /// Create a STREAM socket from an existing Unix stream with custom options.
    pub async fn from_unix_stream_with_options(
        stream: compio::net::UnixStream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStream::with_options(
                stream,
                zlink_core::config::BufferConfig::default(),
                options,
            )
            .await?,
            monitor: None,
        })
    }
}

/// Accepts many peers on one bound TCP address, handing back a fresh
/// [`StreamSocket`] (with its own [`ConnectionId`]) per accepted connection.
pub struct StreamListener {
    inner: InternalStreamListener,
}

impl StreamListener {
    /// Bind to an address and start listening for STREAM peers.
    pub async fn bind(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStreamListener::bind(addr).await?,
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }

    /// Accept the next connection as a new STREAM peer.
    pub async fn accept(&self) -> io::Result<StreamSocket<TcpStream>> {
        Ok(StreamSocket {
            inner: self.inner.accept().await?,
            monitor: None,
        })
    }
}
