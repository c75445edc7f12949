//! XPUB (Extended Publisher) socket implementation
//!
//! XPUB extends PUB by receiving subscription messages from subscribers,
//! enabling manual subscription control, last value cache patterns, and
//! subscription forwarding in message brokers.
//!
//! # Use Cases
//!
//! - **Message brokers**: Forward subscriptions between frontend and backend
//! - **Last value cache (LVC)**: Track subscriptions and replay latest values
//! - **Subscription auditing**: Monitor what topics subscribers are interested in
//! - **Manual control**: Explicitly approve/deny subscriptions
//!
//! # Pattern
//!
//! ```text
//! Subscriber 1 ──subscribe("topic.a")──> ┐
//! Subscriber 2 ──subscribe("topic.b")──> ├─> XPUB (receives subscription events)
//! Subscriber 3 ──unsubscribe("topic.a")─> ┘        │
//!                                                   │
//!                                      XPUB ────────┴──> Forwards subscriptions
//! ```

use bytes::{Bytes, BytesMut};
use compio::net::{TcpListener, TcpStream};
use zlink_core::alloc::{IoArena, IoBytes};
use zlink_core::buffer::SegmentedBuffer;
use zlink_core::options::SocketOptions;
use zlink_core::subscription::{SubscriptionEvent, SubscriptionTrie};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::io;
use tracing::{debug, trace, warn};

use crate::codec::{encode_multipart, ZmpDecoder};
use crate::handshake::perform_handshake_with_timeout;
use crate::session::SocketType;

/// Unique identifier for each subscriber connection
type SubscriberId = u64;

/// Per-subscriber state managed by XPUB
struct XPubSubscriber {
    id: SubscriberId,
    stream: TcpStream,
    subscriptions: SubscriptionTrie,
    decoder: ZmpDecoder,
    recv: SegmentedBuffer,
    arena: IoArena,
}

impl XPubSubscriber {
    /// Check if message matches subscriber's subscriptions
    fn matches(&self, msg: &[Bytes]) -> bool {
        // Check first frame against subscription prefixes
        if let Some(first_frame) = msg.first() {
            self.subscriptions.matches(first_frame)
        } else {
            false
        }
    }

    /// Non-blocking poll of one subscription command, if a full frame is
    /// already buffered or available without waiting on the wire.
    async fn poll_subscription(&mut self, read_buffer_size: usize) -> io::Result<Option<SubscriptionEvent>> {
        use compio::buf::BufResult;
        use compio::io::AsyncRead;
        use compio::time::timeout;
        use std::time::Duration;

        if let Some(frame) = self.decoder.decode(&mut self.recv).map_err(io::Error::from)? {
            return Ok(Self::frame_to_event(&frame));
        }

        let slab = self.arena.alloc_mut(read_buffer_size);
        match timeout(Duration::from_millis(1), AsyncRead::read(&mut self.stream, slab)).await {
            Ok(BufResult(Ok(0), _)) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "subscriber closed")),
            Ok(BufResult(Ok(_), slab)) => {
                self.recv.push(slab.freeze());
                let frame = self.decoder.decode(&mut self.recv).map_err(io::Error::from)?;
                Ok(frame.and_then(|f| Self::frame_to_event(&f)))
            }
            Ok(BufResult(Err(e), _)) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Ok(BufResult(Err(e), _)) => Err(e),
            Err(_) => Ok(None), // timed out, no data ready
        }
    }

    fn frame_to_event(frame: &crate::codec::ZmpFrame) -> Option<SubscriptionEvent> {
        if frame.is_subscribe() {
            Some(SubscriptionEvent::Subscribe(frame.payload.clone()))
        } else if frame.is_cancel() {
            Some(SubscriptionEvent::Unsubscribe(frame.payload.clone()))
        } else {
            None
        }
    }
}

/// XPUB (Extended Publisher) socket.
///
/// Receives subscription events and broadcasts messages to matching subscribers.
///
/// # Features
///
/// - **Subscription tracking**: Know what topics subscribers want
/// - **Verbose mode**: Report all subscriptions (including duplicates)
/// - **Manual mode**: Explicit subscription control
/// - **Welcome messages**: Send initial message to new subscribers
///
/// # Examples
///
/// ```no_run
/// use zlink_proto::xpub::XPubSocket;
/// use bytes::Bytes;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let mut xpub = XPubSocket::bind("127.0.0.1:5555").await?;
///     
///     loop {
///         // Receive subscription events from subscribers
///         if let Some(event) = xpub.recv_subscription().await? {
///             println!("Subscription event: {:?}", event);
///         }
///         
///         // Broadcast messages to matching subscribers
///         xpub.send(vec![Bytes::from("topic"), Bytes::from("data")]).await?;
///     }
/// }
/// ```
pub struct XPubSocket {
    listener: TcpListener,
    subscribers: HashMap<SubscriberId, XPubSubscriber>,
    next_id: SubscriberId,
    options: SocketOptions,
    /// Pending subscription events to deliver
    pending_events: SmallVec<[SubscriptionEvent; 8]>,
    /// Last message observed per topic prefix, for `XPUB_MANUAL_LAST_VALUE`
    /// replay (spec.md Open Question, resolved in DESIGN.md): manual mode
    /// retains the most recent message per topic and replays it only when
    /// the application calls `send_to_subscriber` explicitly.
    last_values: HashMap<Bytes, Vec<Bytes>>,
    write_buf: BytesMut,
}

impl XPubSocket {
    /// Bind to an address and start listening for subscribers.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use zlink_proto::xpub::XPubSocket;
    /// # async fn example() -> std::io::Result<()> {
    /// let xpub = XPubSocket::bind("127.0.0.1:5555").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Self::bind_with_options(addr, SocketOptions::default()).await
    }

    /// Bind with custom socket options.
    pub async fn bind_with_options(
        addr: &str,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        debug!("[XPUB] Bound to {}", local_addr);

        Ok(Self {
            listener,
            subscribers: HashMap::new(),
            next_id: 1,
            options,
            pending_events: SmallVec::new(),
            last_values: HashMap::new(),
            write_buf: BytesMut::new(),
        })
    }

    /// Accept new subscriber connections (non-blocking).
    ///
    /// Call this periodically to accept new subscribers.
    pub async fn accept(&mut self) -> io::Result<()> {
        match self.listener.accept().await {
            Ok((mut stream, addr)) => {
                debug!("[XPUB] New subscriber from {}", addr);

                // Perform ZMTP handshake
                let handshake_result = perform_handshake_with_timeout(
                    &mut stream,
                    SocketType::XPub,
                    None,
                    Some(self.options.handshake_timeout),
                )
                .await?;

                debug!(
                    peer_socket_type = ?handshake_result.peer_socket_type,
                    "[XPUB] Handshake complete with subscriber"
                );

                // Add subscriber
                let id = self.next_id;
                self.next_id += 1;

                let mut subscriber = XPubSubscriber {
                    id,
                    stream,
                    subscriptions: SubscriptionTrie::new(),
                    decoder: ZmpDecoder::default(),
                    recv: SegmentedBuffer::new(),
                    arena: IoArena::new(),
                };

                // Send welcome message if configured
                if let Some(welcome_msg) = self.options.xpub_welcome_msg.clone() {
                    trace!("[XPUB] Sending welcome message to subscriber {}", id);
                    if let Err(e) = send_multipart(&mut subscriber.stream, &[welcome_msg]).await {
                        warn!("[XPUB] Failed to send welcome message to subscriber {}: {}", id, e);
                    }
                }

                self.subscribers.insert(id, subscriber);

                debug!("[XPUB] Subscriber {} added (total: {})", id, self.subscribers.len());
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                // No pending connections
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Receive a subscription event from subscribers (non-blocking).
    ///
    /// Returns `None` if no events are available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use zlink_proto::xpub::XPubSocket;
    /// # async fn example(mut xpub: XPubSocket) -> std::io::Result<()> {
    /// if let Some(event) = xpub.recv_subscription().await? {
    ///     match event {
    ///         zlink_core::subscription::SubscriptionEvent::Subscribe(topic) => {
    ///             println!("New subscription: {:?}", topic);
    ///         }
    ///         zlink_core::subscription::SubscriptionEvent::Unsubscribe(topic) => {
    ///             println!("Unsubscription: {:?}", topic);
    ///         }
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn recv_subscription(&mut self) -> io::Result<Option<SubscriptionEvent>> {
        // Return pending events first
        if !self.pending_events.is_empty() {
            return Ok(Some(self.pending_events.remove(0)));
        }

        // NOTE: Don't call accept() here - it blocks waiting for new connections
        // The caller should call accept() separately to handle new connections

        let read_buffer_size = self.options.read_buffer_size;
        let mut dead = SmallVec::<[SubscriberId; 4]>::new();

        for sub in self.subscribers.values_mut() {
            match sub.poll_subscription(read_buffer_size).await {
                Ok(Some(event)) => {
                    trace!(subscriber = sub.id, ?event, "[XPUB] subscription event");
                    // Report the event when xpub_verbose is set (every message,
                    // including duplicates) or when this is genuinely new
                    // information for this subscriber (the first-mover case).
                    let is_new = match &event {
                        SubscriptionEvent::Subscribe(prefix) => {
                            let already = sub.subscriptions.matches(prefix)
                                && sub.subscriptions.subscriptions().iter().any(|s| &s.prefix == prefix);
                            sub.subscriptions.subscribe(prefix.clone());
                            !already
                        }
                        SubscriptionEvent::Unsubscribe(prefix) => {
                            sub.subscriptions.unsubscribe(prefix);
                            true
                        }
                    };
                    if self.options.xpub_verbose || is_new {
                        self.pending_events.push(event);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("[XPUB] subscriber {} disconnected: {}", sub.id, e);
                    dead.push(sub.id);
                }
            }
        }

        for id in dead {
            self.subscribers.remove(&id);
            debug!("[XPUB] Removed dead subscriber {}", id);
        }

        if self.pending_events.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.pending_events.remove(0)))
        }
    }

    /// Broadcast a message to all matching subscribers.
    ///
    /// Only subscribers whose subscriptions match the message's first frame
    /// will receive it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use zlink_proto::xpub::XPubSocket;
    /// # use bytes::Bytes;
    /// # async fn example(mut xpub: XPubSocket) -> std::io::Result<()> {
    /// xpub.send(vec![
    ///     Bytes::from("topic.temperature"),
    ///     Bytes::from("23.5"),
    /// ]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        trace!("[XPUB] Broadcasting message with {} frames", msg.len());

        self.write_buf.clear();
        encode_multipart(&msg, &mut self.write_buf);
        let encoded = self.write_buf.split().freeze();

        if let Some(topic) = msg.first() {
            self.last_values.insert(topic.clone(), msg.clone());
        }

        let mut dead = SmallVec::<[SubscriberId; 4]>::new();
        for sub in self.subscribers.values_mut() {
            if !sub.matches(&msg) {
                continue;
            }
            if let Err(e) = write_frame(&mut sub.stream, encoded.clone()).await {
                if self.options.xpub_nodrop {
                    warn!("[XPUB] send to subscriber {} failed (XPUB_NODROP set): {}", sub.id, e);
                    return Err(e);
                }
                debug!("[XPUB] dropping subscriber {} after send error: {}", sub.id, e);
                dead.push(sub.id);
            }
        }

        for id in dead {
            self.subscribers.remove(&id);
            debug!("[XPUB] Removed dead subscriber {}", id);
        }

        Ok(())
    }

    /// Send a message directly to one subscriber, bypassing subscription
    /// matching. Used for manual-mode last-value replay: the application
    /// calls this from its `recv_subscription` loop in response to a fresh
    /// subscribe event, handing back the cached last value for that topic.
    pub async fn send_to_subscriber(&mut self, id: SubscriberId, msg: &[Bytes]) -> io::Result<()> {
        let sub = self
            .subscribers
            .get_mut(&id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown subscriber id"))?;
        self.write_buf.clear();
        encode_multipart(msg, &mut self.write_buf);
        let encoded = self.write_buf.split().freeze();
        write_frame(&mut sub.stream, encoded).await
    }

    /// Look up the last message sent for a topic prefix (exact match), for
    /// manual last-value-cache replay.
    #[must_use]
    pub fn last_value(&self, topic: &[u8]) -> Option<&[Bytes]> {
        self.last_values.get(topic).map(Vec::as_slice)
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the socket type.
    pub fn socket_type(&self) -> SocketType {
        SocketType::XPub
    }

    /// Check if the last received message has more frames coming.
    ///
    /// For XPUB, subscription events are always single-frame.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_RCVMORE` (13) option.
    #[inline]
    pub fn has_more(&self) -> bool {
        !self.pending_events.is_empty()
    }

    /// Get the event state of the socket.
    ///
    /// Returns a bitmask indicating ready-to-receive and ready-to-send states.
    ///
    /// # Returns
    ///
    /// - `1` (POLLIN) - Socket is ready to receive (has pending subscription events)
    /// - `2` (POLLOUT) - Socket is ready to send (has active subscribers)
    /// - `3` (POLLIN | POLLOUT) - Socket is ready for both
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_EVENTS` (15) option.
    #[inline]
    pub fn events(&self) -> u32 {
        let mut events = 0;
        if !self.pending_events.is_empty() {
            events |= 1; // POLLIN
        }
        if !self.subscribers.is_empty() {
            events |= 2; // POLLOUT
        }
        events
    }

    /// Set verbose mode.
    ///
    /// When enabled, all subscription messages are reported (including duplicates).
    pub fn set_verbose(&mut self, verbose: bool) {
        self.options.xpub_verbose = verbose;
    }

    /// Set manual mode.
    ///
    /// When enabled, subscriptions must be explicitly approved by calling `send_subscription()`.
    pub fn set_manual(&mut self, manual: bool) {
        self.options.xpub_manual = manual;
    }

    /// Re-queue a subscription event for the next `recv_subscription()` call
    /// (manual mode only). Used when chaining XPUB sockets in nested
    /// brokers: the outer broker decides whether to forward a subscription
    /// event it received from an inner one.
    pub fn send_subscription(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        if !self.options.xpub_manual {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Manual mode not enabled",
            ));
        }

        trace!("[XPUB] Manual subscription re-queued: {:?}", event);
        self.pending_events.push(event);
        Ok(())
    }
}

impl fmt::Debug for XPubSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPubSocket")
            .field("subscribers", &self.subscribers.len())
            .field("verbose", &self.options.xpub_verbose)
            .field("manual", &self.options.xpub_manual)
            .finish()
    }
}

/// Write one already-ZMP-encoded frame buffer to a subscriber's stream.
async fn write_frame(stream: &mut TcpStream, encoded: Bytes) -> io::Result<()> {
    use compio::buf::BufResult;
    use compio::io::AsyncWrite;

    let BufResult(result, _) = AsyncWrite::write(stream, IoBytes::new(encoded)).await;
    result.map(|_| ())
}

/// Encode and write a multipart message to a subscriber's stream.
async fn send_multipart(stream: &mut TcpStream, msg: &[Bytes]) -> io::Result<()> {
    let mut buf = BytesMut::new();
    encode_multipart(msg, &mut buf);
    write_frame(stream, buf.freeze()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsub::XSubSocket;

    #[compio::test]
    async fn test_xpub_bind() {
        let xpub = XPubSocket::bind("127.0.0.1:0").await.unwrap();
        assert_eq!(xpub.subscriber_count(), 0);
        let addr = xpub.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[test]
    fn test_subscription_event_encoding() {
        let event = SubscriptionEvent::Subscribe(Bytes::from_static(b"topic"));
        let msg = event.to_message();
        assert_eq!(msg[0], 0x01);
        assert_eq!(&msg[1..], b"topic");

        let parsed = SubscriptionEvent::from_message(&msg).unwrap();
        assert_eq!(parsed, event);
    }

    #[compio::test]
    async fn subscription_forwards_and_matching_delivers() {
        let mut xpub = XPubSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = xpub.local_addr().unwrap();

        let client = compio::runtime::spawn(async move {
            let mut xsub = XSubSocket::connect(&addr.to_string()).await.unwrap();
            xsub.subscribe(&b"weather."[..]).await.unwrap();
            let msg = xsub.recv().await.unwrap().unwrap();
            msg
        });

        xpub.accept().await.unwrap();

        let event = loop {
            if let Some(event) = xpub.recv_subscription().await.unwrap() {
                break event;
            }
        };
        assert_eq!(event, SubscriptionEvent::Subscribe(Bytes::from_static(b"weather.")));

        xpub.send(vec![Bytes::from_static(b"weather.temp"), Bytes::from_static(b"18C")])
            .await
            .unwrap();

        let received = client.await.unwrap();
        assert_eq!(received[0], Bytes::from_static(b"weather.temp"));
        assert_eq!(received[1], Bytes::from_static(b"18C"));
    }

    #[compio::test]
    async fn manual_mode_replays_last_value_to_new_subscriber() {
        let mut xpub = XPubSocket::bind("127.0.0.1:0").await.unwrap();
        xpub.set_manual(true);
        let addr = xpub.local_addr().unwrap();

        xpub.send(vec![Bytes::from_static(b"topic"), Bytes::from_static(b"stale")])
            .await
            .unwrap();
        assert_eq!(
            xpub.last_value(b"topic"),
            Some(&[Bytes::from_static(b"topic"), Bytes::from_static(b"stale")][..])
        );

        let client = compio::runtime::spawn(async move {
            let mut xsub = XSubSocket::connect(&addr.to_string()).await.unwrap();
            xsub.subscribe(&b"topic"[..]).await.unwrap();
            xsub.recv().await.unwrap().unwrap()
        });

        xpub.accept().await.unwrap();
        let event = loop {
            if let Some(event) = xpub.recv_subscription().await.unwrap() {
                break event;
            }
        };
        let SubscriptionEvent::Subscribe(topic) = event else {
            panic!("expected subscribe event");
        };

        let last = xpub.last_value(&topic).unwrap().to_vec();
        let subscriber_id = *xpub.subscribers.keys().next().unwrap();
        xpub.send_to_subscriber(subscriber_id, &last).await.unwrap();

        let received = client.await.unwrap();
        assert_eq!(received[0], Bytes::from_static(b"topic"));
        assert_eq!(received[1], Bytes::from_static(b"stale"));
    }
}

// Implement Socket trait for XPubSocket (non-generic)
#[async_trait::async_trait(?Send)]
impl crate::Socket for XPubSocket {
    async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.send(msg).await
    }

    async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        // XPUB receives subscription events
        self.recv_subscription().await.map(|opt| {
            opt.map(|event| {
                vec![event.to_message()]
            })
        })
    }

    fn socket_type(&self) -> SocketType {
        SocketType::XPub
    }
}
