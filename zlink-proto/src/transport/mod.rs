//! Stream-wrapping transports layered on top of a plain TCP/Unix byte
//! stream (`spec.md` §4.3: `tcp`, `tls`, `ws`, `wss`, `ipc`, `inproc`).
//!
//! TCP and `ipc://` need no wrapper — a `compio::net::TcpStream` or
//! `UnixStream` already satisfies `AsyncRead + AsyncWrite` and is used
//! directly as a [`crate::base::SocketBase`]'s `S`. `inproc://` has its own
//! [`crate::inproc_stream::InprocStream`]. This module covers the two
//! transports that need to transform the byte stream itself before ZMP
//! frames ride on it:
//!
//! - [`tls`] — TLS 1.2/1.3 via `rustls`, for `tls://` and the lower half of `wss://`
//! - [`ws`] — RFC 6455 WebSocket framing, for `ws://` and the upper half of `wss://`
//!
//! `wss://` composes both: `WsStream<TlsStream<TcpStream>>`.

pub mod tls;
pub mod ws;

pub use tls::TlsStream;
pub use ws::WsStream;
