//! # ZLink protocol engine
//!
//! **Internal protocol implementation crate. Use the `zlink` crate for the public API.**
//!
//! This crate implements the Zero-Messaging Protocol (ZMP, `spec.md` §4.4.2):
//! an 8-byte-header binary framing, a `HELLO`/`READY`/`ERROR` handshake, and
//! the per-socket-type state machines that ride on top of it. For STREAM
//! sockets there is no handshake — see [`raw_codec`] and [`stream`].
//!
//! ## Socket types (internal API)
//!
//! - **PAIR** — exclusive peer-to-peer
//! - **PUB** / **SUB** — fan-out broadcast with subscription filtering
//! - **XPUB** / **XSUB** — PUB/SUB variants that expose subscription traffic
//! - **DEALER** / **ROUTER** — async load-balanced request/reply with routing ids
//! - **STREAM** — raw length-prefixed bytes, no ZMP handshake
//!
//! ## For application development
//!
//! ```toml
//! [dependencies]
//! zlink = { version = "0.1", features = ["zmq"] }
//! ```
//!
//! ```rust,ignore
//! use zlink::zmq::DealerSocket;
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
//!     socket.send(vec![b"Hello!".as_slice().into()]).await?;
//!     let response = socket.recv().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Zero-copy**: messages use `Bytes` for efficient sharing
//! - **`io_uring`**: high-performance async I/O via `compio`
//! - **Sans-IO protocol core**: the handshake and codec state machines
//!   ([`session`], [`codec`]) are testable without any transport
//! - **Type-safe**: no unsafe code in the protocol layer

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unused_async)]
#![allow(clippy::let_underscore_future)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::missing_errors_doc)] // Will add gradually
#![allow(clippy::doc_markdown)] // Too many false positives
#![allow(clippy::while_let_loop)] // Sometimes clearer as explicit loop
#![allow(clippy::option_if_let_else)] // Sometimes clearer as if/else
#![allow(clippy::never_loop)] // State machines use loop with early returns

// Internal modules (not part of public API)
mod base;
mod codec;
mod handshake;
mod utils;

// Public protocol core
pub mod raw_codec;
pub mod session;
pub mod socket_trait;
pub mod stream_sink;

// Transport helpers shared across socket types
pub mod inproc_stream;
pub mod transport;

// Socket implementations
pub mod dealer;
pub mod pair;
pub mod publisher;
pub mod proxy;
pub mod router;
pub mod stream;
pub mod subscriber;
pub mod xpub;
pub mod xsub;

// Re-export socket types for clean API
pub use dealer::DealerSocket;
pub use pair::PairSocket;
pub use publisher::PubSocket;
pub use router::RouterSocket;
pub use stream::{ConnectionId, StreamListener, StreamSocket};
pub use subscriber::SubSocket;
pub use xpub::XPubSocket;
pub use xsub::XSubSocket;

pub use socket_trait::Socket;
pub use zlink_core::config::BufferConfig;

// Re-export commonly used types
pub use session::{SocketType, ZmpSession};

/// Prelude module for convenient imports
///
/// ```rust
/// use zlink_proto::prelude::*;
/// ```
pub mod prelude {
    pub use super::session::SocketType;
    pub use super::{
        DealerSocket, PairSocket, PubSocket, RouterSocket, StreamSocket, SubSocket, XPubSocket,
        XSubSocket,
    };
    pub use bytes::Bytes;
}
