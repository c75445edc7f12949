//! XPUB (Extended Publisher) socket implementation.

use bytes::Bytes;
use zlink_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use zlink_core::subscription::SubscriptionEvent;
use zlink_proto::xpub::XPubSocket as InternalXPub;
use zlink_proto::SocketType;
use std::io;

/// An XPUB socket, the extended form of PUB that surfaces subscriber
/// subscribe/unsubscribe traffic to the application.
///
/// XPUB sockets are used for:
///
/// - Message brokers that forward subscriptions between a frontend and a backend
/// - Last-value-cache (LVC) replay on fresh subscriptions
/// - Auditing which topics subscribers are actually interested in
///
/// Built in the spirit of libzmq's `XPUB` socket, but speaks the
/// Zero-Messaging Protocol (ZMP), not ZMTP — it is not wire-compatible with
/// libzmq.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::XPubSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut socket = XPubSocket::bind("127.0.0.1:5555").await?;
///
/// socket.accept().await?;
/// if let Some(event) = socket.recv_subscription().await? {
///     println!("subscription event: {:?}", event);
/// }
/// socket.send(vec![Bytes::from("topic"), Bytes::from("data")]).await?;
/// # Ok(())
/// # }
/// ```
pub struct XPubSocket {
    inner: InternalXPub,
    monitor: Option<SocketEventSender>,
}

impl XPubSocket {
    /// Bind to an address and start listening for subscribers.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXPub::bind(addr).await?,
            monitor: None,
        })
    }

    /// Bind with custom socket options.
    pub async fn bind_with_options(
        addr: &str,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXPub::bind_with_options(addr, options).await?,
            monitor: None,
        })
    }

    /// Accept a new subscriber connection (non-blocking: returns immediately
    /// with `Ok(())` if none is pending).
    pub async fn accept(&mut self) -> io::Result<()> {
        self.inner.accept().await
    }

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

    /// Receive the next subscription event from any connected subscriber.
    ///
    /// Returns `None` if no event is currently pending.
    pub async fn recv_subscription(&mut self) -> io::Result<Option<SubscriptionEvent>> {
        self.inner.recv_subscription().await
    }

    /// Broadcast a message to all subscribers whose subscriptions match its
    /// first frame.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.inner.send(msg).await
    }

    /// Send a message directly to one subscriber by id, bypassing
    /// subscription matching. Used to reply to a subscription event with a
    /// last-value-cache replay under `XPUB_MANUAL`.
    pub async fn send_to_subscriber(&mut self, id: u64, msg: &[Bytes]) -> io::Result<()> {
        self.inner.send_to_subscriber(id, msg).await
    }

    /// Look up the last message broadcast for a topic prefix (exact match).
    #[must_use]
    pub fn last_value(&self, topic: &[u8]) -> Option<&[Bytes]> {
        self.inner.last_value(topic)
    }

    /// Re-queue a subscription event for delivery on the next
    /// `recv_subscription()` call. Only valid when `XPUB_MANUAL` is enabled.
    pub fn send_subscription(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        self.inner.send_subscription(event)
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Get the local address this socket is bound to.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }

    /// Get the socket type.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_TYPE` (16) option.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::XPub
    }

    /// Check if the last received subscription event has more pending.
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

    /// Enable or disable verbose mode (report every subscribe, including
    /// duplicates, not just first-of-its-kind).
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_XPUB_VERBOSE` (40).
    pub fn set_verbose(&mut self, verbose: bool) {
        self.inner.set_verbose(verbose);
    }

    /// Enable or disable manual mode (subscriptions must be explicitly
    /// re-queued via `send_subscription()`).
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_XPUB_MANUAL` (71).
    pub fn set_manual(&mut self, manual: bool) {
        self.inner.set_manual(manual);
    }
}
