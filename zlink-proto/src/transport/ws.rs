//! WebSocket transport adapter (`spec.md` §4.3, `ws://`/`wss://` endpoints).
//!
//! `tokio-tungstenite` is off the table for the same reason `tokio-rustls`
//! is: it's built on `tokio::io::{AsyncRead, AsyncWrite}`, not `compio`'s
//! completion-based traits. The HTTP/1.1 Upgrade handshake (RFC 6455 §4) and
//! the binary frame format (RFC 6455 §5) are small enough to hand-roll over
//! the same read/write idiom the rest of this crate uses for TCP and TLS.
//!
//! Only binary data frames carrying whole ZMP records are produced; control
//! frames (ping/pong/close) are handled transparently inside [`WsStream`] so
//! the ZMP codec sitting above it never sees anything but application bytes.

use std::io;

use base64::Engine;
use compio::buf::{BufResult, IoBuf, IoBufMut};
use compio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use sha1::{Digest, Sha1};

/// RFC 6455 §1.3 handshake constant.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const OP_CONTINUATION: u8 = 0x0;
const OP_TEXT: u8 = 0x1;
const OP_BINARY: u8 = 0x2;
const OP_CLOSE: u8 = 0x8;
const OP_PING: u8 = 0x9;
const OP_PONG: u8 = 0xA;

fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

fn generate_client_key() -> String {
    let nonce: [u8; 16] = rand::random();
    base64::engine::general_purpose::STANDARD.encode(nonce)
}

async fn read_line<S: AsyncRead + Unpin>(io: &mut S, scratch: &mut Vec<u8>) -> io::Result<()> {
    loop {
        if scratch.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(());
        }
        let chunk = vec![0u8; 512];
        let BufResult(res, chunk) = io.read(chunk).await;
        let n = res?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed connection during WebSocket handshake",
            ));
        }
        scratch.extend_from_slice(&chunk[..n]);
        if scratch.len() > 16 * 1024 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "WebSocket handshake headers exceeded 16KiB",
            ));
        }
    }
}

/// Perform the client-side HTTP/1.1 Upgrade handshake (RFC 6455 §4.1).
async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    io: &mut S,
    host: &str,
    path: &str,
) -> io::Result<()> {
    let key = generate_client_key();
    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Protocol: zmp\r\n\
         \r\n"
    );
    io.write_all(request.into_bytes()).await.0?;
    io.flush().await?;

    let mut scratch = Vec::new();
    read_line(io, &mut scratch).await?;

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    let status = response
        .parse(&scratch)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if status.is_partial() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "incomplete WebSocket handshake response",
        ));
    }
    if response.code != Some(101) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("WebSocket upgrade rejected with status {:?}", response.code),
        ));
    }

    let accept = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("sec-websocket-accept"))
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "missing Sec-WebSocket-Accept header")
        })?;
    let expected = accept_key(&key);
    if accept.value != expected.as_bytes() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Sec-WebSocket-Accept did not match the request key",
        ));
    }
    Ok(())
}

/// Perform the server-side HTTP/1.1 Upgrade handshake (RFC 6455 §4.2).
async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(io: &mut S) -> io::Result<()> {
    let mut scratch = Vec::new();
    read_line(io, &mut scratch).await?;

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut request = httparse::Request::new(&mut headers);
    let status = request
        .parse(&scratch)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if status.is_partial() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "incomplete WebSocket handshake request",
        ));
    }

    let key = request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("sec-websocket-key"))
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "missing Sec-WebSocket-Key header")
        })?;
    let key = std::str::from_utf8(key.value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let accept = accept_key(key);

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         Sec-WebSocket-Protocol: zmp\r\n\
         \r\n"
    );
    io.write_all(response.into_bytes()).await.0?;
    io.flush().await
}

/// A WebSocket-framed byte stream implementing `compio`'s
/// `AsyncRead`/`AsyncWrite`, carrying ZMP frames as binary WS messages.
///
/// Generic over the inner transport so `ws://` rides directly over TCP and
/// `wss://` rides over a [`super::tls::TlsStream`] — the WS framing layer is
/// always the outermost one, matching the URL scheme order (`wss` negotiates
/// TLS, then upgrades to WebSocket inside it).
pub struct WsStream<S> {
    io: S,
    is_client: bool,
    /// Decoded application bytes not yet consumed by a caller's `read`.
    pending: Vec<u8>,
    pending_pos: usize,
    closed: bool,
}

struct Frame {
    opcode: u8,
    payload: Vec<u8>,
}

impl<S> WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Connect as a WebSocket client to `host` (used for the `Host:` header)
    /// at `path` (the HTTP resource path, e.g. `/` or a configured prefix).
    pub async fn connect_client(mut io: S, host: &str, path: &str) -> io::Result<Self> {
        client_handshake(&mut io, host, path).await?;
        Ok(Self {
            io,
            is_client: true,
            pending: Vec::new(),
            pending_pos: 0,
            closed: false,
        })
    }

    /// Accept a WebSocket upgrade as the server side.
    pub async fn accept_server(mut io: S) -> io::Result<Self> {
        server_handshake(&mut io).await?;
        Ok(Self {
            io,
            is_client: false,
            pending: Vec::new(),
            pending_pos: 0,
            closed: false,
        })
    }

    async fn read_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut full_payload: Option<(u8, Vec<u8>)> = None;
        loop {
            let mut header = [0u8; 2];
            if !self.fill_exact(&mut header).await? {
                return Ok(None);
            }

            let fin = header[0] & 0x80 != 0;
            let opcode = header[0] & 0x0F;
            let masked = header[1] & 0x80 != 0;
            let mut len = u64::from(header[1] & 0x7F);

            if len == 126 {
                let mut ext = [0u8; 2];
                if !self.fill_exact(&mut ext).await? {
                    return Ok(None);
                }
                len = u64::from(u16::from_be_bytes(ext));
            } else if len == 127 {
                let mut ext = [0u8; 8];
                if !self.fill_exact(&mut ext).await? {
                    return Ok(None);
                }
                len = u64::from_be_bytes(ext);
            }

            const MAX_FRAME_LEN: u64 = 256 * 1024 * 1024;
            if len > MAX_FRAME_LEN {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "WebSocket frame exceeded the 256MiB limit",
                ));
            }

            let mask = if masked {
                let mut m = [0u8; 4];
                if !self.fill_exact(&mut m).await? {
                    return Ok(None);
                }
                Some(m)
            } else {
                None
            };

            let mut payload = vec![0u8; len as usize];
            if !self.fill_exact(&mut payload).await? {
                return Ok(None);
            }
            if let Some(mask) = mask {
                for (i, byte) in payload.iter_mut().enumerate() {
                    *byte ^= mask[i % 4];
                }
            }

            match &mut full_payload {
                None => full_payload = Some((opcode, payload)),
                Some((_, buf)) => buf.extend_from_slice(&payload),
            }

            if fin {
                let (opcode, payload) = full_payload.take().unwrap();
                return Ok(Some(Frame { opcode, payload }));
            }
        }
    }

    /// Fill `out` completely from the wire, returning `Ok(false)` on a clean EOF
    /// with zero bytes read so far (vs. an error on a truncated frame).
    async fn fill_exact(&mut self, out: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < out.len() {
            let chunk = vec![0u8; out.len() - filled];
            let BufResult(res, chunk) = self.io.read(chunk).await;
            let n = res?;
            if n == 0 {
                return if filled == 0 {
                    Ok(false)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-frame",
                    ))
                };
            }
            out[filled..filled + n].copy_from_slice(&chunk[..n]);
            filled += n;
        }
        Ok(true)
    }

    fn mask_payload(payload: &mut [u8]) -> [u8; 4] {
        let mask: [u8; 4] = rand::random();
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
        mask
    }

    async fn write_frame(&mut self, opcode: u8, mut payload: Vec<u8>) -> io::Result<()> {
        let mut frame = Vec::with_capacity(payload.len() + 14);
        frame.push(0x80 | opcode); // FIN set, single-frame messages only.

        let mask_bit = if self.is_client { 0x80 } else { 0x00 };
        let len = payload.len();
        if len < 126 {
            frame.push(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            frame.push(mask_bit | 126);
            frame.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            frame.push(mask_bit | 127);
            frame.extend_from_slice(&(len as u64).to_be_bytes());
        }

        if self.is_client {
            let mask = Self::mask_payload(&mut payload);
            frame.extend_from_slice(&mask);
        }
        frame.extend_from_slice(&payload);

        self.io.write_all(frame).await.0?;
        self.io.flush().await
    }

    async fn next_payload(&mut self) -> io::Result<usize> {
        loop {
            let frame = match self.read_frame().await? {
                Some(f) => f,
                None => {
                    self.closed = true;
                    return Ok(0);
                }
            };
            match frame.opcode {
                OP_BINARY | OP_TEXT | OP_CONTINUATION => {
                    self.pending = frame.payload;
                    self.pending_pos = 0;
                    return Ok(self.pending.len());
                }
                OP_PING => {
                    self.write_frame(OP_PONG, frame.payload).await?;
                }
                OP_PONG => {
                    // Unsolicited pongs (keepalive acks) are silently dropped.
                }
                OP_CLOSE => {
                    self.write_frame(OP_CLOSE, frame.payload).await?;
                    self.closed = true;
                    return Ok(0);
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unsupported WebSocket opcode {:#x}", frame.opcode),
                    ));
                }
            }
        }
    }
}

impl<S> AsyncRead for WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn read<B: IoBufMut>(&mut self, mut buf: B) -> BufResult<usize, B> {
        if self.pending_pos >= self.pending.len() && !self.closed {
            if let Err(e) = self.next_payload().await {
                return BufResult(Err(e), buf);
            }
        }
        let available = &self.pending[self.pending_pos..];
        let n = zlink_core::alloc::copy_into_io_buf(&mut buf, available);
        self.pending_pos += n;
        BufResult(Ok(n), buf)
    }
}

impl<S> AsyncWrite for WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn write<B: IoBuf>(&mut self, buf: B) -> BufResult<usize, B> {
        let slice = zlink_core::alloc::io_buf_as_slice(&buf);
        let n = slice.len();
        if let Err(e) = self.write_frame(OP_BINARY, slice.to_vec()).await {
            return BufResult(Err(e), buf);
        }
        BufResult(Ok(n), buf)
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.io.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        if !self.closed {
            let _ = self.write_frame(OP_CLOSE, Vec::new()).await;
            self.closed = true;
        }
        self.io.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_example() {
        // RFC 6455 §1.3 worked example.
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }
}
