//! ZMP socket types.
//!
//! This module provides the PAIR/PUB/SUB/XPUB/XSUB/DEALER/ROUTER/STREAM
//! socket types from `spec.md` §4.8, built on `io_uring`. The wire protocol
//! is ZMP (`zlink_proto::codec`), not ZMTP — see the module docs on each
//! socket for the precise relationship to familiar Zero-MQ semantics.
//!
//! # Socket Types
//!
//! - [`PairSocket`] - Exclusive peer-to-peer pair
//! - [`DealerSocket`] - Asynchronous request-reply client (load-balanced)
//! - [`RouterSocket`] - Identity-based routing server
//! - [`PubSocket`] - Publisher (broadcast to subscribers)
//! - [`SubSocket`] - Subscriber (receive filtered messages)
//! - [`XPubSocket`] - Extended publisher (surfaces subscription events)
//! - [`XSubSocket`] - Extended subscriber (forwards subscriptions upstream)
//! - [`StreamSocket`] / [`StreamListener`] - Raw framed byte streams, no handshake
//!
//! # Quick Start
//!
//! ## DEALER (Client)
//!
//! ```rust,no_run
//! use zlink::zmq::DealerSocket;
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut socket = DealerSocket::connect("127.0.0.1:5555").await?;
//! socket.send(vec![Bytes::from("REQUEST")]).await?;
//!
//! if let Some(reply) = socket.recv().await {
//!     println!("Got reply: {:?}", reply);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## ROUTER (Server)
//!
//! ```rust,no_run
//! use zlink::zmq::RouterSocket;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (listener, mut socket) = RouterSocket::bind("127.0.0.1:5555").await?;
//!
//! while let Some(msg) = socket.recv().await {
//!     socket.send(msg).await?; // Echo back
//! }
//! # Ok(())
//! # }
//! ```

mod common;
mod dealer;
mod pair;
mod publisher;
mod router;
mod stream;
mod subscriber;
mod xpub;
mod xsub;

// Re-export socket types
pub use dealer::DealerSocket;
pub use pair::PairSocket;
pub use publisher::PubSocket;
pub use router::RouterSocket;
pub use stream::{StreamListener, StreamSocket};
pub use subscriber::SubSocket;
pub use xpub::XPubSocket;
pub use xsub::XSubSocket;

// Re-export monitoring and endpoint types used on socket APIs.
pub use zlink_core::endpoint::Endpoint;
pub use zlink_core::monitor::{DisconnectReason, SocketEvent, SocketMonitor};


/// Convenient imports for ZeroMQ protocol.
///
/// # Example
///
/// ```rust
/// use zlink::zmq::prelude::*;
///
/// // Now you have:
/// // - PairSocket, DealerSocket, RouterSocket, PubSocket, SubSocket,
/// //   XPubSocket, XSubSocket, StreamSocket, StreamListener
/// // - Bytes for zero-copy messages
/// ```
pub mod prelude {
    pub use super::{
        DealerSocket, PairSocket, PubSocket, RouterSocket, StreamListener, StreamSocket,
        SubSocket, XPubSocket, XSubSocket,
    };
    pub use bytes::Bytes;
}
