//! ZLink Core
//!
//! Runtime-agnostic building blocks shared by every transport and socket
//! type in the workspace (`spec.md` §2-§7):
//!
//! - Zero-copy buffers and arena allocation (`alloc`, `buffer`)
//! - The wire-agnostic [`message_builder::Message`] multipart helper
//! - Endpoint parsing (`endpoint`) and the process-wide [`context::Context`]
//! - Socket configuration (`options`) and reconnection backoff (`reconnect`)
//! - The `SocketType` enum shared by the handshake and socket constructors
//! - Subscription trie matching for SUB/XSUB/XPUB (`subscription`)
//! - Cancellation-safety guard for partial I/O (`poison`)
//! - Socket lifecycle/monitor events (`monitor`)
//! - IPC and in-process transport primitives (`ipc`, `inproc`)
//! - Typed errors for the whole workspace (`error`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod alloc;
pub mod buffer;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod inproc;
pub mod ipc;
pub mod message_builder;
pub mod monitor;
pub mod options;
pub mod poison;
pub mod reconnect;
pub mod socket_type;
pub mod subscription;
pub mod tcp;
pub mod timeout;

/// A small prelude to make downstream crates ergonomic.
pub mod prelude {
    pub use crate::context::{Context, ContextOptions};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::ZLinkError;
    pub use crate::message_builder::Message;
    pub use crate::monitor::{create_monitor, SocketEvent, SocketMonitor};
    pub use crate::options::SocketOptions;
    pub use crate::socket_type::SocketType;
}
