//! PAIR socket implementation.

use bytes::Bytes;
use compio::net::TcpStream;
use zlink_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use zlink_proto::pair::PairSocket as InternalPair;
use zlink_proto::SocketType;
use std::io;

/// A PAIR socket for exclusive peer-to-peer communication.
///
/// PAIR sockets connect exactly two endpoints and exchange messages
/// bidirectionally with no routing or filtering. They're used for:
///
/// - Connecting two threads or processes one-to-one
/// - Exclusive control channels between a pair of services
///
/// Built in the spirit of libzmq's `PAIR` socket, but speaks the
/// Zero-Messaging Protocol (ZMP), not ZMTP — it is not wire-compatible with
/// libzmq.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::PairSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (_listener, mut socket) = PairSocket::bind("127.0.0.1:5555").await?;
/// socket.send(vec![Bytes::from("hello")]).await?;
/// # Ok(())
/// # }
/// ```
pub struct PairSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalPair<S>,
    monitor: Option<SocketEventSender>,
}

impl PairSocket {
    /// Bind to an address and accept the one peer PAIR allows.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zlink::zmq::PairSocket;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let (_listener, socket) = PairSocket::bind("127.0.0.1:5555").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(
        addr: impl compio::net::ToSocketAddrsAsync,
    ) -> io::Result<(compio::net::TcpListener, Self)> {
        let (listener, inner) = InternalPair::bind(addr).await?;
        Ok((listener, Self { inner, monitor: None }))
    }

    /// Connect to a remote PAIR peer.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let inner = InternalPair::connect(addr).await?;
        Ok(Self { inner, monitor: None })
    }

    /// Create a PAIR socket from a TCP stream with TCP_NODELAY enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::from_tcp(stream).await?,
            monitor: None,
        })
    }

    /// Create a PAIR socket from a TCP stream with custom options.
    pub async fn from_tcp_with_options(
        stream: TcpStream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::from_tcp_with_options(
                stream,
                zlink_core::config::BufferConfig::default(),
                options,
            )
            .await?,
            monitor: None,
        })
    }

    /// Create a PAIR socket from any stream with custom options.
    pub async fn with_options<Stream>(
        stream: Stream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<PairSocket<Stream>>
    where
        Stream: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
    {
        Ok(PairSocket {
            inner: InternalPair::with_options(
                stream,
                zlink_core::config::BufferConfig::default(),
                options,
            )
            .await?,
            monitor: None,
        })
    }

    /// Bind to an inproc endpoint (same-process pair).
    pub fn bind_inproc(
        endpoint: &str,
    ) -> io::Result<PairSocket<zlink_proto::inproc_stream::InprocStream>> {
        Ok(PairSocket {
            inner: InternalPair::bind_inproc(endpoint)?,
            monitor: None,
        })
    }

    /// Connect to an inproc endpoint (same-process pair).
    pub fn connect_inproc(
        endpoint: &str,
    ) -> io::Result<PairSocket<zlink_proto::inproc_stream::InprocStream>> {
        Ok(PairSocket {
            inner: InternalPair::connect_inproc(endpoint)?,
            monitor: None,
        })
    }
}

// Generic impl - works with any stream type
impl<S> PairSocket<S>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    /// Enable monitoring for this socket.
    ///
    /// Returns a receiver for socket lifecycle events.
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

    /// Send a message to the paired socket.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.inner.send(msg).await
    }

    /// Receive a message from the paired socket.
    ///
    /// Returns `None` if the connection is closed.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        self.inner.recv().await.inspect_err(|e| {
            if let Some(endpoint) = self.inner.last_endpoint().cloned() {
                self.emit_event(SocketEvent::Disconnected {
                    endpoint,
                    reason: super::common::disconnect_reason_for(e),
                });
            }
        })
    }

    /// Get the socket type.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_TYPE` (16) option.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::Pair
    }

    /// Get the endpoint this socket is connected/bound to, if available.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_LAST_ENDPOINT` (32) option.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&zlink_core::endpoint::Endpoint> {
        self.inner.last_endpoint()
    }

    /// Check if the last received message has more frames coming.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_RCVMORE` (13) option.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.inner.has_more()
    }

    /// Get the event state of the socket.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_EVENTS` (15) option.
    #[inline]
    pub fn events(&self) -> u32 {
        self.inner.events()
    }
}

// Unix-specific impl for IPC support
#[cfg(unix)]
impl PairSocket<compio::net::UnixStream> {
    /// Create a PAIR socket from an existing Unix domain socket stream (IPC).
    pub async fn from_unix_stream(stream: compio::net::UnixStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::new(stream).await?,
            monitor: None,
        })
    }

    /// Create a PAIR socket from an existing Unix stream with custom options.
    pub async fn from_unix_stream_with_options(
        stream: compio::net::UnixStream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::with_options(
                stream,
                zlink_core::config::BufferConfig::default(),
                options,
            )
            .await?,
            monitor: None,
        })
    }
}
