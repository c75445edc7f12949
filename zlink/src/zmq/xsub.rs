//! XSUB (Extended Subscriber) socket implementation.

use bytes::Bytes;
use compio::net::TcpStream;
use zlink_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use zlink_core::subscription::{Subscription, SubscriptionEvent};
use zlink_proto::xsub::XSubSocket as InternalXSub;
use zlink_proto::SocketType;
use std::io;

/// An XSUB socket, the extended form of SUB that forwards its own
/// subscribe/unsubscribe traffic upstream to the publisher instead of
/// handling it transparently.
///
/// XSUB sockets are used for:
///
/// - Message brokers that forward subscriptions from a frontend to a backend
/// - Cascading pub/sub trees across network boundaries
/// - Programmatic subscription management
///
/// Built in the spirit of libzmq's `XSUB` socket, but speaks the
/// Zero-Messaging Protocol (ZMP), not ZMTP — it is not wire-compatible with
/// libzmq.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::XSubSocket;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut socket = XSubSocket::connect("127.0.0.1:5555").await?;
/// socket.subscribe(&b"topic."[..]).await?;
///
/// if let Some(msg) = socket.recv().await? {
///     println!("received: {:?}", msg);
/// }
/// # Ok(())
/// # }
/// ```
pub struct XSubSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalXSub<S>,
    monitor: Option<SocketEventSender>,
}

impl XSubSocket {
    /// Connect to a publisher.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXSub::connect(addr).await?,
            monitor: None,
        })
    }

    /// Connect to a publisher with custom socket options.
    pub async fn connect_with_options(
        addr: &str,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXSub::connect_with_options(addr, options).await?,
            monitor: None,
        })
    }

    /// Create an XSUB socket from any stream with custom options.
    pub async fn with_options<Stream>(
        stream: Stream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<XSubSocket<Stream>>
    where
        Stream: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
    {
        Ok(XSubSocket {
            inner: InternalXSub::with_options(
                stream,
                zlink_core::config::BufferConfig::large(),
                options,
            )
            .await?,
            monitor: None,
        })
    }
}

// Generic impl - works with any stream type
impl<S> XSubSocket<S>
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

    /// Subscribe to messages matching the given prefix.
    ///
    /// Sends a subscription message upstream to the publisher.
    pub async fn subscribe(&mut self, prefix: impl Into<Bytes>) -> io::Result<()> {
        self.inner.subscribe(prefix.into()).await
    }

    /// Unsubscribe from messages matching the given prefix.
    pub async fn unsubscribe(&mut self, prefix: impl Into<Bytes>) -> io::Result<()> {
        self.inner.unsubscribe(prefix.into()).await
    }

    /// Forward a raw subscription event upstream (used by proxies).
    pub async fn send_subscription_event(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        self.inner.send_subscription_event(event).await
    }

    /// Receive a data message. Returns `None` once the publisher disconnects.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        self.inner.recv().await
    }

    /// Get the number of active local subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscription_count()
    }

    /// Check if subscribed to a specific topic.
    pub fn is_subscribed(&self, topic: &[u8]) -> bool {
        self.inner.is_subscribed(topic)
    }

    /// Get all active subscriptions.
    pub fn subscriptions(&self) -> &[Subscription] {
        self.inner.subscriptions()
    }

    /// Get the socket type.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_TYPE` (16) option.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::XSub
    }
}

// Unix-specific impl for IPC support
#[cfg(unix)]
impl XSubSocket<compio::net::UnixStream> {
    /// Create an XSUB socket from an existing Unix domain socket stream (IPC).
    pub async fn from_unix_stream(stream: compio::net::UnixStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXSub::new(stream).await?,
            monitor: None,
        })
    }

    /// Create an XSUB socket from an existing Unix stream with custom options.
    pub async fn from_unix_stream_with_options(
        stream: compio::net::UnixStream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXSub::with_options(
                stream,
                zlink_core::config::BufferConfig::large(),
                options,
            )
            .await?,
            monitor: None,
        })
    }
}
