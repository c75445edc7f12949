//! SUB socket implementation.
//!
//! SUB sockets receive messages from PUB peers and filter them locally by
//! topic prefix. Per `spec.md` §4.8, a SUB also sends `SUBSCRIBE`/`CANCEL`
//! control frames upstream on every `subscribe`/`unsubscribe` call, mirroring
//! XSUB's subscription-forwarding frames — this lets a PUB peer (or an XPUB
//! sitting between them) filter at the source instead of over the wire.

use crate::base::SocketBase;
use crate::codec::ZmpFrame;
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
use zlink_core::subscription::SubscriptionTrie;

/// A SUB socket: filtered, receive-only peer of a PUB socket.
pub struct SubSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    base: SocketBase<S>,
    frames: SmallVec<[Bytes; 4]>,
    subscriptions: SubscriptionTrie,
}

impl<S> SubSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new SUB socket from a stream with default buffer configuration.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_config_and_options(stream, BufferConfig::default(), SocketOptions::default()).await
    }

    /// Create a new SUB socket with custom buffer configuration.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_config_and_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new SUB socket with custom socket options and default buffer configuration.
    pub async fn with_options(stream: S, options: SocketOptions) -> io::Result<Self> {
        Self::with_config_and_options(stream, BufferConfig::default(), options).await
    }

    /// Create a new SUB socket with custom buffer configuration and socket options.
    pub async fn with_config_and_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        debug!("[SUB] Creating new SUB socket");

        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Sub,
            None,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[SUB] Handshake complete"
        );

        Ok(Self {
            base: SocketBase::new(stream, config, options),
            frames: SmallVec::new(),
            subscriptions: SubscriptionTrie::new(),
        })
    }

    /// Subscribe to messages whose first frame starts with `prefix`. An
    /// empty prefix subscribes to everything. Sends a `SUBSCRIBE` control
    /// frame upstream.
    pub async fn subscribe(&mut self, prefix: impl Into<Bytes>) -> io::Result<()> {
        let prefix = prefix.into();
        trace!("[SUB] Subscribing to: {:?}", prefix);
        self.subscriptions.subscribe(prefix.clone());
        self.send_control(ZmpFrame::subscribe(prefix)).await
    }

    /// Unsubscribe from `prefix`. Sends a `CANCEL` control frame upstream.
    pub async fn unsubscribe(&mut self, prefix: impl Into<Bytes>) -> io::Result<()> {
        let prefix = prefix.into();
        trace!("[SUB] Unsubscribing from: {:?}", prefix);
        self.subscriptions.unsubscribe(&prefix);
        self.send_control(ZmpFrame::cancel(prefix)).await
    }

    async fn send_control(&mut self, frame: ZmpFrame) -> io::Result<()> {
        self.base.write_buf.clear();
        frame.encode_into(&mut self.base.write_buf);
        self.base.write_from_buf().await
    }

    /// Receive the next message matching an active subscription, filtering
    /// out and discarding anything that doesn't match.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        loop {
            trace!("[SUB] Waiting for message");

            loop {
                match self.base.decode_app_frame().await? {
                    Some(frame) => {
                        let more = frame.more();
                        self.frames.push(frame.payload);
                        if !more {
                            let msg: Vec<Bytes> = self.frames.drain(..).collect();
                            if self.matches(&msg) {
                                return Ok(Some(msg));
                            }
                            trace!("[SUB] Message filtered out (no matching subscription)");
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

    fn matches(&self, msg: &[Bytes]) -> bool {
        match msg.first() {
            Some(first) => self.subscriptions.matches(first),
            None => self.subscriptions.matches(b""),
        }
    }

    /// Get a reference to the socket options.
    #[inline]
    pub fn options(&self) -> &SocketOptions {
        &self.base.options
    }

    /// Get the socket type.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::Sub
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
}

impl SubSocket<TcpStream> {
    /// Connect to a PUB peer over TCP.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream).await
    }

    /// Create a SUB socket from an existing TCP stream, enabling `TCP_NODELAY`.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::default()).await
    }

    /// Create a SUB socket from a TCP stream with custom buffer configuration.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[SUB] TCP_NODELAY enabled");
        Self::with_config_and_options(stream, config, SocketOptions::default()).await
    }

    /// Create a SUB socket from a TCP stream with custom socket options.
    pub async fn from_tcp_with_options(stream: TcpStream, options: SocketOptions) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        Self::with_options(stream, options).await
    }
}

impl SubSocket<InprocStream> {
    /// Connect to an inproc endpoint bound by a PUB socket.
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
            subscriptions: SubscriptionTrie::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PubSocket;

    #[compio::test]
    async fn sub_filters_by_topic_prefix() {
        let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = compio::runtime::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut publisher = PubSocket::new(stream).await.unwrap();
            publisher.send(vec![Bytes::from_static(b"other:skip")]).await.unwrap();
            publisher.send(vec![Bytes::from_static(b"topic:match")]).await.unwrap();
        });

        let mut sub = SubSocket::connect(addr).await.unwrap();
        sub.subscribe(&b"topic"[..]).await.unwrap();
        let msg = sub.recv().await.unwrap().unwrap();
        assert_eq!(msg, vec![Bytes::from_static(b"topic:match")]);

        server.await.unwrap();
    }
}
