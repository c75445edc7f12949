//! PUB socket implementation.
//!
//! PUB sockets are send-only: they broadcast multipart messages to every
//! attached SUB/XSUB peer. This type models a single ZMP-handshaked
//! connection; an application fans a publish out across many `PubSocket`s
//! (one per attached subscriber) the same way `RouterSocket` composes
//! fan-in, since neither socket type multiplexes several peers internally
//! (`spec.md` §4.8).

use crate::base::SocketBase;
use crate::codec::encode_multipart;
use crate::inproc_stream::InprocStream;
use crate::{handshake::perform_handshake_with_timeout, session::SocketType};
use bytes::Bytes;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use std::io;
use tracing::{debug, trace};
use zlink_core::config::BufferConfig;
use zlink_core::endpoint::Endpoint;
use zlink_core::options::SocketOptions;

/// A PUB socket: fan-out broadcast, no inbound application data.
pub struct PubSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    base: SocketBase<S>,
}

impl<S> PubSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new PUB socket from a stream with default buffer configuration.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_options(stream, BufferConfig::default(), SocketOptions::default()).await
    }

    /// Create a new PUB socket with custom buffer configuration.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new PUB socket with custom buffer configuration and socket options.
    pub async fn with_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        debug!("[PUB] Creating new PUB socket");

        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Pub,
            None,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[PUB] Handshake complete"
        );

        Ok(Self {
            base: SocketBase::new(stream, config, options),
        })
    }

    /// Broadcast a multipart message to the attached peer.
    ///
    /// There is no flow control from the subscriber back to a PUB socket;
    /// `send_hwm` in `options` bounds how much this instance will buffer
    /// before returning a would-block-style error rather than growing
    /// unbounded (`spec.md` §4.8, "RcvHwm drops at source").
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        trace!("[PUB] Sending {} frames", msg.len());

        self.base.write_buf.clear();
        encode_multipart(&msg, &mut self.base.write_buf);
        self.base.write_from_buf().await?;

        Ok(())
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
        SocketType::Pub
    }

    /// Get the endpoint this socket is connected/bound to, if available.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&Endpoint> {
        self.base.last_endpoint()
    }

    /// Event state bitmask (`1` = POLLIN, `2` = POLLOUT). PUB never has
    /// inbound application data, so POLLIN is never set in practice.
    #[inline]
    pub fn events(&self) -> u32 {
        self.base.events()
    }
}

impl PubSocket<TcpStream> {
    /// Connect to a SUB/XSUB peer over TCP.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream).await
    }

    /// Create a PUB socket from an existing TCP stream, enabling `TCP_NODELAY`.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::default()).await
    }

    /// Create a PUB socket from a TCP stream with custom buffer configuration.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[PUB] TCP_NODELAY enabled");
        Self::with_options(stream, config, SocketOptions::default()).await
    }
}

impl PubSocket<InprocStream> {
    /// Connect to an inproc endpoint bound by a SUB/XSUB socket.
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
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::SubSocket;

    #[compio::test]
    async fn pub_sub_delivers_over_tcp() {
        let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = compio::runtime::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut publisher = PubSocket::new(stream).await.unwrap();
            publisher.send(vec![Bytes::from_static(b"topic:data")]).await.unwrap();
        });

        let mut sub = SubSocket::connect(addr).await.unwrap();
        sub.subscribe(&b"topic"[..]).await.unwrap();
        let msg = sub.recv().await.unwrap().unwrap();
        assert_eq!(msg, vec![Bytes::from_static(b"topic:data")]);

        server.await.unwrap();
    }
}
