//! Sans-IO ZMP session state machine — the handshake half of the "Engine"
//! component in `spec.md` §4.5.
//!
//! `ZmpSession` consumes raw inbound bytes and produces [`SessionEvent`]s
//! (bytes to write, decoded frames, handshake completion, fatal errors)
//! without touching any transport itself, so it can be driven either by the
//! synchronous helpers in [`crate::handshake`] or directly by an engine loop
//! that owns a `compio` stream.
//!
//! State machine (spec.md §4.5): `SEND_HELLO -> AWAIT_HELLO -> SEND_READY ->
//! AWAIT_READY -> READY`. `AWAIT_TRANSPORT_HS` (TLS/WS upgrade) happens one
//! layer down, in the transport adapter, before any bytes reach this type.

use bytes::{Bytes, BytesMut};
use zlink_core::buffer::SegmentedBuffer;

use crate::codec::{ZmpDecoder, ZmpError, ZmpFrame};
use crate::utils::{build_error, build_hello, build_ready, parse_command, parse_error_command};

pub use zlink_core::socket_type::SocketType;

/// Events emitted by the session (transport-agnostic).
pub enum SessionEvent {
    /// Send raw bytes immediately (HELLO/READY/ERROR control frame).
    SendBytes(Bytes),

    /// A validated ZMP data/control frame delivered after the handshake.
    Frame(ZmpFrame),

    /// Handshake completed successfully.
    HandshakeComplete {
        peer_identity: Option<Bytes>,
        peer_socket_type: SocketType,
    },

    /// Fatal protocol or compatibility error. The caller must send the
    /// accompanying `ERROR` frame (already queued as a prior `SendBytes`
    /// event when the failure is a local compatibility check) and tear the
    /// engine down; no further bytes should be fed to this session.
    Error(ZmpError),

    /// Peer sent an ERROR control frame; carries their code and reason.
    PeerError { code: u8, reason: String },
}

enum State {
    /// Waiting to send our HELLO (set once at construction, drained on the
    /// first call to `on_bytes` or via `start`).
    SendHello,
    AwaitHello {
        decoder: ZmpDecoder,
    },
    AwaitReady {
        decoder: ZmpDecoder,
        peer_identity: Option<Bytes>,
        peer_socket_type: SocketType,
    },
    Active {
        decoder: ZmpDecoder,
    },
    Failed,
}

/// Sans-IO ZMP session.
pub struct ZmpSession {
    state: State,
    local_socket_type: SocketType,
    local_identity: Option<Bytes>,
    max_msg_size: usize,
    recv: SegmentedBuffer,
    started: bool,
}

impl ZmpSession {
    #[must_use]
    pub fn new(local_socket_type: SocketType) -> Self {
        Self::with_identity(local_socket_type, None)
    }

    #[must_use]
    pub fn with_identity(local_socket_type: SocketType, identity: Option<Bytes>) -> Self {
        Self {
            state: State::SendHello,
            local_socket_type,
            local_identity: identity,
            max_msg_size: usize::MAX,
            recv: SegmentedBuffer::new(),
            started: false,
        }
    }

    pub fn set_max_msg_size(&mut self, max_msg_size: usize) {
        self.max_msg_size = max_msg_size;
    }

    /// Create a session that's already past the handshake phase. Used by
    /// the raw (STREAM) path and by tests that drive frames directly.
    #[must_use]
    pub fn new_active(local_socket_type: SocketType) -> Self {
        Self {
            state: State::Active {
                decoder: ZmpDecoder::new(),
            },
            local_socket_type,
            local_identity: None,
            max_msg_size: usize::MAX,
            recv: SegmentedBuffer::new(),
            started: true,
        }
    }

    /// Produce the initial HELLO bytes to send. Idempotent after the first
    /// call; safe to call before any bytes have arrived.
    pub fn start(&mut self) -> Option<Bytes> {
        if self.started {
            return None;
        }
        self.started = true;
        let identity = self
            .local_socket_type
            .sends_identity()
            .then(|| self.local_identity.clone())
            .flatten();
        let hello = build_hello(self.local_socket_type.as_wire_str(), identity.as_deref(), &[]);
        self.state = State::AwaitHello {
            decoder: ZmpDecoder::with_max_msg_size(self.max_msg_size),
        };
        Some(ZmpFrame::control(hello).encode())
    }

    /// Feed incoming bytes into the session.
    pub fn on_bytes(&mut self, src: Bytes) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if !self.started {
            if let Some(hello) = self.start() {
                events.push(SessionEvent::SendBytes(hello));
            }
        }

        self.recv.push(src);

        loop {
            match &mut self.state {
                State::SendHello => unreachable!("start() always leaves AwaitHello"),

                State::Failed => break,

                State::AwaitHello { decoder } => match decoder.decode(&mut self.recv) {
                    Ok(Some(frame)) => {
                        self.handle_hello(&frame, &mut events);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::SendBytes(
                            ZmpFrame::control(build_error(e.code(), &e.to_string())).encode(),
                        ));
                        events.push(SessionEvent::Error(e));
                        self.state = State::Failed;
                        break;
                    }
                },

                State::AwaitReady { decoder, .. } => match decoder.decode(&mut self.recv) {
                    Ok(Some(frame)) => {
                        if let Some(ev) = self.handle_ready(&frame) {
                            events.push(ev);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::Error(e));
                        self.state = State::Failed;
                        break;
                    }
                },

                State::Active { decoder } => match decoder.decode(&mut self.recv) {
                    Ok(Some(frame)) => {
                        // Only an ERROR frame is a bare CONTROL frame post-handshake;
                        // SUBSCRIBE/CANCEL/PING/PONG carry their own flag too.
                        let is_bare_control = frame.is_control()
                            && !frame.is_subscribe()
                            && !frame.is_cancel()
                            && !frame.is_ping()
                            && !frame.is_pong();
                        if is_bare_control {
                            if let Ok(parsed) = parse_command(&frame.payload) {
                                if parsed.name == "ERROR" {
                                    if let Ok((code, reason)) = parse_error_command(&parsed) {
                                        events.push(SessionEvent::PeerError { code, reason });
                                        self.state = State::Failed;
                                        continue;
                                    }
                                }
                            }
                        }
                        events.push(SessionEvent::Frame(frame));
                    }
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::Error(e));
                        self.state = State::Failed;
                        break;
                    }
                },
            }
        }

        events
    }

    fn handle_hello(&mut self, frame: &ZmpFrame, events: &mut Vec<SessionEvent>) {
        if !frame.is_control() {
            self.state = State::Failed;
            events.push(SessionEvent::Error(ZmpError::MalformedMetadata));
            return;
        }

        let parsed = match parse_command(&frame.payload) {
            Ok(p) => p,
            Err(e) => {
                self.state = State::Failed;
                events.push(SessionEvent::Error(e));
                return;
            }
        };

        if parsed.name == "ERROR" {
            let (code, reason) = parse_error_command(&parsed).unwrap_or((0, String::new()));
            self.state = State::Failed;
            events.push(SessionEvent::PeerError { code, reason });
            return;
        }

        if parsed.name != "HELLO" {
            self.state = State::Failed;
            events.push(SessionEvent::Error(ZmpError::MalformedMetadata));
            return;
        }

        let Some(peer_type_bytes) = parsed.get("Socket-Type") else {
            self.state = State::Failed;
            events.push(SessionEvent::Error(ZmpError::MalformedMetadata));
            return;
        };
        let Ok(peer_type_str) = std::str::from_utf8(peer_type_bytes) else {
            self.state = State::Failed;
            events.push(SessionEvent::Error(ZmpError::MalformedMetadata));
            return;
        };
        let Some(peer_socket_type) = SocketType::from_wire_str(peer_type_str) else {
            self.state = State::Failed;
            events.push(SessionEvent::Error(ZmpError::MalformedMetadata));
            return;
        };

        if !self.local_socket_type.is_compatible(peer_socket_type) {
            // spec.md §4.5: send ERROR code 2 (mechanism-mismatch) and
            // terminate, so the peer observes NoCompatibleProtocol too
            // instead of just seeing the connection drop.
            self.state = State::Failed;
            events.push(SessionEvent::SendBytes(
                ZmpFrame::control(build_error(
                    ZmpError::IncompatibleSocketType.code(),
                    "incompatible peer socket type",
                ))
                .encode(),
            ));
            events.push(SessionEvent::Error(ZmpError::IncompatibleSocketType));
            return;
        }

        let peer_identity = parsed.get("Identity").cloned();

        let identity = self
            .local_socket_type
            .sends_identity()
            .then(|| self.local_identity.clone())
            .flatten();
        let ready = build_ready(self.local_socket_type.as_wire_str(), identity.as_deref(), &[]);

        self.state = State::AwaitReady {
            decoder: ZmpDecoder::with_max_msg_size(self.max_msg_size),
            peer_identity,
            peer_socket_type,
        };

        // The engine loop is expected to write this immediately; session.rs
        // returns it as data rather than a `SendBytes` event here because
        // callers that only observe `Frame`/`HandshakeComplete` (the
        // `new_active` raw path) never hit this branch.
        events.push(SessionEvent::SendBytes(ZmpFrame::control(ready).encode()));
    }

    fn handle_ready(&mut self, frame: &ZmpFrame) -> Option<SessionEvent> {
        if !frame.is_control() {
            self.state = State::Failed;
            return Some(SessionEvent::Error(ZmpError::MalformedMetadata));
        }

        let parsed = match parse_command(&frame.payload) {
            Ok(p) => p,
            Err(e) => {
                self.state = State::Failed;
                return Some(SessionEvent::Error(e));
            }
        };

        if parsed.name == "ERROR" {
            let (code, reason) = parse_error_command(&parsed).unwrap_or((0, String::new()));
            self.state = State::Failed;
            return Some(SessionEvent::PeerError { code, reason });
        }

        if parsed.name != "READY" {
            self.state = State::Failed;
            return Some(SessionEvent::Error(ZmpError::MalformedMetadata));
        }

        let State::AwaitReady {
            peer_identity,
            peer_socket_type,
            ..
        } = &self.state
        else {
            unreachable!("handle_ready only called from AwaitReady");
        };

        let peer_identity = parsed.get("Identity").cloned().or_else(|| peer_identity.clone());
        let peer_socket_type = *peer_socket_type;

        self.state = State::Active {
            decoder: ZmpDecoder::with_max_msg_size(self.max_msg_size),
        };

        Some(SessionEvent::HandshakeComplete {
            peer_identity,
            peer_socket_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_handshake_between_two_sessions() {
        let mut dealer = ZmpSession::new(SocketType::Dealer);
        let mut router = ZmpSession::new(SocketType::Router);

        let dealer_hello = dealer.start().unwrap();
        let router_hello = router.start().unwrap();

        let router_events = router.on_bytes(dealer_hello);
        let dealer_events = dealer.on_bytes(router_hello);

        let router_ready = match &router_events[0] {
            SessionEvent::SendBytes(b) => b.clone(),
            _ => panic!("expected READY bytes from router"),
        };
        let dealer_ready = match &dealer_events[0] {
            SessionEvent::SendBytes(b) => b.clone(),
            _ => panic!("expected READY bytes from dealer"),
        };

        let dealer_final = dealer.on_bytes(router_ready);
        let router_final = router.on_bytes(dealer_ready);

        assert!(matches!(
            dealer_final.last(),
            Some(SessionEvent::HandshakeComplete {
                peer_socket_type: SocketType::Router,
                ..
            })
        ));
        assert!(matches!(
            router_final.last(),
            Some(SessionEvent::HandshakeComplete {
                peer_socket_type: SocketType::Dealer,
                ..
            })
        ));
    }

    #[test]
    fn incompatible_types_fail_handshake() {
        let mut pair = ZmpSession::new(SocketType::Pair);
        let mut pub_socket = ZmpSession::new(SocketType::Pub);

        let pub_hello = pub_socket.start().unwrap();
        let events = pair.on_bytes(pub_hello);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_))));
    }
}
