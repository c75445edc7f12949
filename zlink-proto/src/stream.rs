//! STREAM socket implementation — `spec.md` §4.8.
//!
//! STREAM sockets never run the ZMP handshake; they talk the raw
//! length-prefixed codec (`crate::raw_codec`, spec.md §4.4.1) directly over
//! the wire. Each inbound delivery is `(connection_id, payload)`; a
//! zero-length payload signals that the peer closed its half of the
//! connection. Connection ids are generated locally and never appear on the
//! wire — they exist only so a STREAM socket that multiplexes several peers
//! (via `StreamListener`) can address replies.

use bytes::{Bytes, BytesMut};
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;
use zlink_core::alloc::IoArena;
use zlink_core::buffer::SegmentedBuffer;
use zlink_core::config::BufferConfig;
use zlink_core::options::SocketOptions;

use crate::raw_codec::{self, RawDecoder};

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque local identifier for one STREAM peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A single STREAM connection: no handshake, raw framed bytes in and out.
pub struct StreamSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream: Option<S>,
    id: ConnectionId,
    arena: IoArena,
    recv: SegmentedBuffer,
    write_buf: BytesMut,
    decoder: RawDecoder,
    options: SocketOptions,
    closed: bool,
}

impl<S> StreamSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream as a STREAM socket. No handshake is
    /// performed — the peer may be anything speaking the raw codec.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_options(stream, BufferConfig::default(), SocketOptions::default()).await
    }

    pub async fn with_options(
        stream: S,
        _config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let max_msg_size = options.max_msg_size.unwrap_or(usize::MAX);
        Ok(Self {
            stream: Some(stream),
            id: ConnectionId::next(),
            arena: IoArena::new(),
            recv: SegmentedBuffer::new(),
            write_buf: BytesMut::new(),
            decoder: RawDecoder::with_max_msg_size(max_msg_size),
            options,
            closed: false,
        })
    }

    /// Local identifier for this connection (stable for the connection's
    /// lifetime, never transmitted on the wire).
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Send one raw frame. An empty payload is valid and half-closes our
    /// write side in the sense that the peer will see an end-of-stream
    /// marker, matching `recv`'s own handling of zero-length frames.
    pub async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        self.write_buf.clear();
        raw_codec::encode(&payload, &mut self.write_buf);
        self.write_from_buf().await
    }

    /// Receive one raw frame. Returns `Ok(None)` once the stream reaches
    /// true EOF (distinct from a zero-length framed message, which is
    /// returned as `Ok(Some((id, Bytes::new())))`).
    pub async fn recv(&mut self) -> io::Result<Option<(ConnectionId, Bytes)>> {
        if self.closed {
            return Ok(None);
        }

        loop {
            if let Some(payload) = self
                .decoder
                .decode(&mut self.recv)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
            {
                trace!(id = ?self.id, len = payload.len(), "[STREAM] frame received");
                return Ok(Some((self.id, payload)));
            }

            let n = self.read_raw().await?;
            if n == 0 {
                self.closed = true;
                return Ok(None);
            }
        }
    }

    async fn read_raw(&mut self) -> io::Result<usize> {
        use compio::buf::BufResult;

        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };
        let slab = self.arena.alloc_mut(self.options.read_buffer_size);
        let BufResult(result, slab) = AsyncRead::read(stream, slab).await;
        let n = result?;
        if n == 0 {
            self.stream = None;
            return Ok(0);
        }
        self.recv.push(slab.freeze());
        Ok(n)
    }

    async fn write_from_buf(&mut self) -> io::Result<()> {
        use compio::buf::BufResult;
        use zlink_core::alloc::IoBytes;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "STREAM socket closed"))?;
        let buf = self.write_buf.split().freeze();
        let BufResult(result, _) = AsyncWrite::write(stream, IoBytes::new(buf)).await;
        if result.is_err() {
            self.stream = None;
        }
        result.map(|_| ())
    }

    /// Close the connection.
    pub async fn close(mut self) -> io::Result<()> {
        self.closed = true;
        self.stream.take();
        Ok(())
    }
}

impl StreamSocket<TcpStream> {
    /// Connect to a remote peer speaking the raw length-prefixed codec.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        Self::new(stream).await
    }

    /// Bind and accept a single connection. Use [`StreamListener`] to accept
    /// and multiplex many STREAM peers on one bound address.
    pub async fn bind(
        addr: impl compio::net::ToSocketAddrsAsync,
    ) -> io::Result<(compio::net::TcpListener, Self)> {
        let listener = compio::net::TcpListener::bind(addr).await?;
        let (stream, _) = listener.accept().await?;
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        let socket = Self::new(stream).await?;
        Ok((listener, socket))
    }
}

/// Accepts many peers on one bound TCP address, handing back a fresh
/// [`StreamSocket`] (with its own [`ConnectionId`]) per accepted connection.
pub struct StreamListener {
    listener: compio::net::TcpListener,
}

impl StreamListener {
    pub async fn bind(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        Ok(Self {
            listener: compio::net::TcpListener::bind(addr).await?,
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept the next connection as a new STREAM peer.
    pub async fn accept(&self) -> io::Result<StreamSocket<TcpStream>> {
        let (stream, _) = self.listener.accept().await?;
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        StreamSocket::new(stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[compio::test]
    async fn echoes_raw_frames_over_tcp() {
        let listener = StreamListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = compio::runtime::spawn(async move {
            let mut peer = listener.accept().await.unwrap();
            let (id, payload) = peer.recv().await.unwrap().unwrap();
            peer.send(payload).await.unwrap();
            id
        });

        let mut client = StreamSocket::connect(addr).await.unwrap();
        client.send(Bytes::from_static(b"hello")).await.unwrap();
        let (_, reply) = client.recv().await.unwrap().unwrap();
        assert_eq!(reply, Bytes::from_static(b"hello"));

        server.await.unwrap();
    }

    #[compio::test]
    async fn zero_length_frame_signals_peer_close() {
        let listener = StreamListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = compio::runtime::spawn(async move {
            let mut peer = listener.accept().await.unwrap();
            peer.send(Bytes::new()).await.unwrap();
        });

        let mut client = StreamSocket::connect(addr).await.unwrap();
        let (_, payload) = client.recv().await.unwrap().unwrap();
        assert!(payload.is_empty());

        server.await.unwrap();
    }
}
