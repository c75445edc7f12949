//! DEALER socket implementation.

use super::common::channel_to_io_error;
use bytes::Bytes;
use compio::net::TcpStream;
use zlink_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use zlink_core::options::TlsOptions;
use zlink_proto::dealer::DealerSocket as InternalDealer;
use zlink_proto::transport::{TlsStream, WsStream};
use std::io;

/// A DEALER socket for asynchronous request-reply patterns.
///
/// DEALER sockets are fair-queuing clients that distribute messages
/// across multiple server endpoints. They're used for:
///
/// - Load-balanced request-reply
/// - Async RPC clients
/// - Worker pools
///
/// Built in the spirit of libzmq's `DEALER`/`ROUTER` pattern, but speaks the
/// Zero-Messaging Protocol (ZMP), not ZMTP — it is not wire-compatible with
/// libzmq.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::DealerSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Connect to server
/// let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
///
/// // Send request
/// socket.send(vec![Bytes::from("REQUEST")]).await?;
///
/// // Receive reply
/// if let Some(reply) = socket.recv().await {
///     println!("Got reply: {:?}", reply);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DealerSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalDealer<S>,
    monitor: Option<SocketEventSender>,
}

impl DealerSocket {
    /// Connect to a ZeroMQ peer and create a DEALER socket.
    ///
    /// Supports both TCP and IPC endpoints:
    /// - TCP: `"tcp://127.0.0.1:5555"` or `"127.0.0.1:5555"`
    /// - IPC: `"ipc:///tmp/socket.sock"` (Unix only)
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Endpoint to connect to
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The connection fails (network unreachable, connection refused, etc.)
    /// - DNS resolution fails for TCP endpoints
    /// - Invalid endpoint format
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zlink::zmq::DealerSocket;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// // TCP connection
    /// let socket1 = DealerSocket::connect("tcp://127.0.0.1:5555").await?;
    ///
    /// // IPC connection (Unix only)
    /// #[cfg(unix)]
    /// let socket2 = DealerSocket::connect("ipc:///tmp/socket.sock").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(endpoint: &str) -> io::Result<Self> {
        // Try parsing as endpoint, fall back to raw address
        let addr = if let Ok(zlink_core::endpoint::Endpoint::Tcp(a)) =
            zlink_core::endpoint::Endpoint::parse(endpoint)
        {
            a
        } else {
            endpoint
                .parse::<std::net::SocketAddr>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        };

        let stream = TcpStream::connect(addr).await?;
        let sock = Self::from_stream(stream).await?;
        sock.emit_event(SocketEvent::ConnectionReady(
            zlink_core::endpoint::Endpoint::Tcp(addr),
        ));
        Ok(sock)
    }

    /// Connect to a ZeroMQ peer via IPC (Unix domain sockets).
    ///
    /// Unix-only. Accepts IPC paths with or without `ipc://` prefix.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # #[cfg(unix)]
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use zlink::zmq::DealerSocket;
    ///
    /// let mut socket = DealerSocket::connect_ipc("/tmp/dealer.sock").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(unix)]
    pub async fn connect_ipc(path: &str) -> io::Result<DealerSocket<compio::net::UnixStream>> {
        use std::path::PathBuf;

        let clean_path = path.strip_prefix("ipc://").unwrap_or(path);
        let ipc_path = PathBuf::from(clean_path);

        let stream = zlink_core::ipc::connect(&ipc_path).await?;
        let sock = DealerSocket::from_unix_stream(stream).await?;
        sock.emit_event(SocketEvent::ConnectionReady(
            zlink_core::endpoint::Endpoint::Ipc(ipc_path),
        ));
        Ok(sock)
    }

    /// Create a DEALER socket from an existing TCP stream.
    ///
    /// Use this for advanced scenarios where you need full control over
    /// the TCP connection (e.g., custom socket options, TLS wrapping).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zlink::zmq::DealerSocket;
    /// use compio::net::TcpStream;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let stream = TcpStream::connect("127.0.0.1:5555").await?;
    /// // Configure stream (e.g., set TCP_NODELAY)
    /// let socket = DealerSocket::from_stream(stream).await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_stream(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::new(stream).await?,
            monitor: None,
        })
    }

    /// Create a DEALER socket from an existing TCP stream with custom buffer configuration.
    ///
    /// # Buffer Configuration
    /// - Use `BufferConfig::small()` (4KB) for low-latency with small messages
    /// - Use `BufferConfig::large()` (16KB) for high-throughput with large messages (recommended)
    pub async fn from_stream_with_config(
        stream: TcpStream,
        config: zlink_core::config::BufferConfig,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::with_config(stream, config).await?,
            monitor: None,
        })
    }

    /// Connect to a peer over TLS (`tls://host:port`).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zlink::zmq::DealerSocket;
    /// use zlink_core::options::TlsOptions;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let opts = TlsOptions { trust_system: true, ..Default::default() };
    /// let mut socket = DealerSocket::connect_tls("tls://example.com:5556", &opts).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_tls(
        endpoint: &str,
        opts: &TlsOptions,
    ) -> io::Result<DealerSocket<TlsStream<TcpStream>>> {
        let addr = match zlink_core::endpoint::Endpoint::parse(endpoint) {
            Ok(zlink_core::endpoint::Endpoint::Tls(a)) => a,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "expected a tls:// endpoint",
                ))
            }
        };
        let tcp = TcpStream::connect(addr).await?;
        let tls = TlsStream::connect_client(tcp, opts).await?;
        let sock = DealerSocket::from_generic_stream(tls).await?;
        sock.emit_event(SocketEvent::ConnectionReady(zlink_core::endpoint::Endpoint::Tls(
            addr,
        )));
        Ok(sock)
    }

    /// Connect to a peer over plain WebSocket (`ws://host:port/path`).
    pub async fn connect_ws(endpoint: &str) -> io::Result<DealerSocket<WsStream<TcpStream>>> {
        let (addr, host, path) = match zlink_core::endpoint::Endpoint::parse(endpoint) {
            Ok(zlink_core::endpoint::Endpoint::Ws(a, p)) => (a, a.ip().to_string(), p),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "expected a ws:// endpoint",
                ))
            }
        };
        let tcp = TcpStream::connect(addr).await?;
        let ws = WsStream::connect_client(tcp, &host, &path).await?;
        let sock = DealerSocket::from_generic_stream(ws).await?;
        sock.emit_event(SocketEvent::ConnectionReady(zlink_core::endpoint::Endpoint::Ws(
            addr, path,
        )));
        Ok(sock)
    }

    /// Connect to a peer over WebSocket-over-TLS (`wss://host:port/path`).
    pub async fn connect_wss(
        endpoint: &str,
        opts: &TlsOptions,
    ) -> io::Result<DealerSocket<WsStream<TlsStream<TcpStream>>>> {
        let (addr, host, path) = match zlink_core::endpoint::Endpoint::parse(endpoint) {
            Ok(zlink_core::endpoint::Endpoint::Wss(a, p)) => (a, a.ip().to_string(), p),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "expected a wss:// endpoint",
                ))
            }
        };
        let tcp = TcpStream::connect(addr).await?;
        let tls = TlsStream::connect_client(tcp, opts).await?;
        let ws = WsStream::connect_client(tls, &host, &path).await?;
        let sock = DealerSocket::from_generic_stream(ws).await?;
        sock.emit_event(SocketEvent::ConnectionReady(zlink_core::endpoint::Endpoint::Wss(
            addr, path,
        )));
        Ok(sock)
    }
}

// Generic impl - works with any stream type
impl<S> DealerSocket<S>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    /// Create a DEALER socket from any stream type implementing compio's
    /// `AsyncRead`/`AsyncWrite` — the integration point used by
    /// [`DealerSocket::connect_tls`]/[`DealerSocket::connect_ws`] to layer
    /// TLS and WebSocket framing underneath the ZMP handshake.
    pub async fn from_generic_stream(stream: S) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::new(stream).await?,
            monitor: None,
        })
    }

    /// Enable monitoring for this socket.
    ///
    /// Returns a receiver for socket lifecycle events. Once enabled, the socket
    /// will emit events like Connected, Disconnected, etc.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use zlink::zmq::{DealerSocket, SocketEvent};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
    /// let monitor = socket.monitor();
    ///
    /// // Spawn task to handle events
    /// compio::runtime::spawn(async move {
    ///     while let Ok(event) = monitor.recv_async().await {
    ///         println!("Socket event: {}", event);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn monitor(&mut self) -> SocketMonitor {
        let (sender, receiver) = create_monitor();
        self.monitor = Some(sender);
        receiver
    }

    /// Helper to emit monitoring events (if monitoring is enabled).
    #[allow(dead_code)]
    fn emit_event(&self, event: SocketEvent) {
        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(event); // Ignore errors if receiver dropped
        }
    }

    /// Get a reference to the socket options.
    #[inline]
    pub fn options(&self) -> &zlink_core::options::SocketOptions {
        self.inner.options()
    }

    /// Get a mutable reference to the socket options.
    ///
    /// Use this to tune `heartbeat_ivl`/`heartbeat_timeout`, HWMs, or
    /// timeouts after the socket is already connected.
    #[inline]
    pub fn options_mut(&mut self) -> &mut zlink_core::options::SocketOptions {
        self.inner.options_mut()
    }

    /// Send a multipart message.
    ///
    /// Messages are sent asynchronously - this returns immediately after
    /// queuing the message for transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying connection is closed or broken.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use zlink::zmq::DealerSocket;
    /// # use bytes::Bytes;
    /// # async fn example(mut socket: DealerSocket) -> Result<(), Box<dyn std::error::Error>> {
    /// socket.send(vec![
    ///     Bytes::from("part1"),
    ///     Bytes::from("part2"),
    /// ]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        channel_to_io_error(self.inner.send(msg).await)
    }

    /// Receive a multipart message.
    ///
    /// Returns `None` if the connection is closed.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use zlink::zmq::DealerSocket;
    /// # async fn example(mut socket: DealerSocket) -> Result<(), Box<dyn std::error::Error>> {
    /// while let Some(msg) = socket.recv().await {
    ///     println!("Received {} parts", msg.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn recv(&mut self) -> Option<Vec<Bytes>> {
        match self.inner.recv().await {
            Ok(msg) => msg,
            Err(e) => {
                if let Some(endpoint) = self.inner.last_endpoint().cloned() {
                    self.emit_event(SocketEvent::Disconnected {
                        endpoint,
                        reason: super::common::disconnect_reason_for(&e),
                    });
                }
                None
            }
        }
    }
}

// Unix-specific impl for IPC support
#[cfg(unix)]
impl DealerSocket<compio::net::UnixStream> {
    /// Create a DEALER socket from an existing Unix domain socket stream (IPC).
    pub async fn from_unix_stream(stream: compio::net::UnixStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::new(stream).await?,
            monitor: None,
        })
    }

    /// Create a DEALER socket from an existing Unix stream with custom buffer configuration.
    pub async fn from_unix_stream_with_config(
        stream: compio::net::UnixStream,
        config: zlink_core::config::BufferConfig,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalDealer::with_config(stream, config).await?,
            monitor: None,
        })
    }
}
