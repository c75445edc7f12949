//! Socket type enumeration for ZLink socket types.
//!
//! This module provides the `SocketType` enum, used both for the Rust-side
//! socket constructors and for the `Socket-Type` property exchanged during
//! the ZMP HELLO/READY handshake (see `spec.md` §4.5).

use std::fmt;

/// ZLink socket types.
///
/// Corresponds to the `TYPE` socket option (get-only, §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketType {
    /// PAIR socket for exclusive bidirectional communication
    Pair = 0,

    /// PUB socket for publishing messages to subscribers
    Pub = 1,

    /// SUB socket for subscribing to published messages
    Sub = 2,

    /// DEALER socket for asynchronous request-reply patterns
    Dealer = 3,

    /// ROUTER socket for routing messages by peer routing-id
    Router = 4,

    /// XPUB socket for extended publisher with subscription awareness
    XPub = 5,

    /// XSUB socket for extended subscriber with dynamic subscriptions
    XSub = 6,

    /// STREAM socket for raw, non-ZMP byte streams
    Stream = 7,
}

impl SocketType {
    /// Get the socket type as a string name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::XPub => "XPUB",
            Self::XSub => "XSUB",
            Self::Stream => "STREAM",
        }
    }

    /// The `Socket-Type` property value exchanged in the HELLO/READY
    /// handshake. Identical to `as_str` today; kept distinct because the
    /// wire string is a protocol constant while `as_str` also backs
    /// `Display`/introspection and could diverge later.
    #[must_use]
    pub const fn as_wire_str(self) -> &'static str {
        self.as_str()
    }

    /// Parse a `Socket-Type` property value received during handshake.
    #[must_use]
    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "PAIR" => Some(Self::Pair),
            "PUB" => Some(Self::Pub),
            "SUB" => Some(Self::Sub),
            "DEALER" => Some(Self::Dealer),
            "ROUTER" => Some(Self::Router),
            "XPUB" => Some(Self::XPub),
            "XSUB" => Some(Self::XSub),
            "STREAM" => Some(Self::Stream),
            _ => None,
        }
    }

    /// Whether this socket type carries a ROUTING_ID / Identity property
    /// during handshake (spec.md §4.5: "if the peer is DEALER/ROUTER").
    #[must_use]
    pub const fn sends_identity(self) -> bool {
        matches!(self, Self::Dealer | Self::Router)
    }

    /// Check if this socket type is compatible with the given peer type,
    /// per the handshake compatibility table in spec.md §4.5.
    #[must_use]
    pub fn is_compatible(self, peer: Self) -> bool {
        matches!(
            (self, peer),
            (Self::Pair, Self::Pair)
                | (Self::Pub, Self::Sub)
                | (Self::Sub, Self::Pub)
                | (Self::Pub, Self::XSub)
                | (Self::XSub, Self::Pub)
                | (Self::XPub, Self::Sub)
                | (Self::Sub, Self::XPub)
                | (Self::XPub, Self::XSub)
                | (Self::XSub, Self::XPub)
                | (Self::Dealer, Self::Dealer)
                | (Self::Dealer, Self::Router)
                | (Self::Router, Self::Dealer)
                | (Self::Router, Self::Router)
        )
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_type_display() {
        assert_eq!(SocketType::Dealer.to_string(), "DEALER");
        assert_eq!(SocketType::Router.to_string(), "ROUTER");
        assert_eq!(SocketType::Pub.to_string(), "PUB");
    }

    #[test]
    fn test_wire_str_roundtrip() {
        for ty in [
            SocketType::Pair,
            SocketType::Pub,
            SocketType::Sub,
            SocketType::Dealer,
            SocketType::Router,
            SocketType::XPub,
            SocketType::XSub,
            SocketType::Stream,
        ] {
            assert_eq!(SocketType::from_wire_str(ty.as_wire_str()), Some(ty));
        }
        assert_eq!(SocketType::from_wire_str("REQ"), None);
    }

    #[test]
    fn test_socket_compatibility() {
        assert!(SocketType::Dealer.is_compatible(SocketType::Router));
        assert!(SocketType::Router.is_compatible(SocketType::Dealer));
        assert!(SocketType::Pub.is_compatible(SocketType::Sub));
        assert!(SocketType::XPub.is_compatible(SocketType::XSub));
        assert!(SocketType::Pub.is_compatible(SocketType::XSub));

        // Incompatible pairs
        assert!(!SocketType::Pair.is_compatible(SocketType::Dealer));
        assert!(!SocketType::Pub.is_compatible(SocketType::Router));
    }

    #[test]
    fn test_identity_property() {
        assert!(SocketType::Dealer.sends_identity());
        assert!(SocketType::Router.sends_identity());
        assert!(!SocketType::Pub.sends_identity());
    }
}
