//! ZMP (Zero-Messaging Protocol) wire codec — `spec.md` §4.4.2.
//!
//! Every ZMP frame has a fixed 8-byte header: `magic | version | flags |
//! reserved | body_len (u32 BE)`, followed by `body_len` bytes. This is
//! deliberately simpler than ZMTP's variable-length short/long framing: ZMP
//! trades the one-byte saving on small frames for a fixed, branch-free
//! header parse.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use zlink_core::buffer::SegmentedBuffer;

use zlink_core::config::STAGING_BUF_INITIAL_CAP;

/// Magic byte identifying a ZMP frame (ASCII `'Z'`).
pub const ZMP_MAGIC: u8 = 0x5A;
/// Protocol version carried in every frame header.
pub const ZMP_VERSION: u8 = 0x03;
/// Size of the fixed ZMP frame header, in bytes.
pub const ZMP_HEADER_LEN: usize = 8;

/// ZMP frame validation errors, each carrying the error code from
/// `spec.md` §4.4.2 (observable via the handshake `ERROR` frame and in
/// monitor `HANDSHAKE_FAILED_PROTOCOL` events).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ZmpError {
    #[error("ZMP magic byte mismatch")]
    BadMagic,

    #[error("unsupported ZMP version")]
    UnsupportedVersion,

    #[error("illegal ZMP flag combination")]
    IllegalFlags,

    #[error("frame body exceeds maximum message size")]
    SizeTooLarge,

    #[error("malformed handshake metadata")]
    MalformedMetadata,

    #[error("incompatible peer socket type")]
    IncompatibleSocketType,
}

impl ZmpError {
    /// The error code carried in an `ERROR` control frame body and in
    /// monitor events (§4.4.2 table).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::BadMagic => 1,
            Self::UnsupportedVersion => 2,
            Self::IllegalFlags => 3,
            Self::SizeTooLarge => 4,
            Self::MalformedMetadata => 5,
            // Same wire code as `UnsupportedVersion`: spec.md §4.5 assigns
            // code 2 to "mechanism-mismatch" broadly, covering both a
            // protocol version peers can't agree on and a socket-type pairing
            // that isn't wire-compatible (§4.4.1's compatibility table).
            Self::IncompatibleSocketType => 2,
        }
    }
}

impl From<ZmpError> for io::Error {
    fn from(err: ZmpError) -> Self {
        Self::new(io::ErrorKind::InvalidData, err)
    }
}

impl From<io::Error> for ZmpError {
    fn from(_err: io::Error) -> Self {
        Self::MalformedMetadata
    }
}

/// Result type alias for ZMP codec operations.
pub type Result<T> = std::result::Result<T, ZmpError>;

/// A decoded ZMP frame.
#[derive(Debug, Clone)]
pub struct ZmpFrame {
    pub flags: u8,
    pub payload: Bytes,
}

impl ZmpFrame {
    /// More frames follow in this message.
    pub const MORE: u8 = 0x01;
    /// Control frame: SUBSCRIBE/CANCEL/PING/PONG/HELLO/READY/ERROR.
    pub const CONTROL: u8 = 0x02;
    /// Subscription command (implies `CONTROL`).
    pub const SUBSCRIBE: u8 = 0x04;
    /// Cancel command (implies `CONTROL`).
    pub const CANCEL: u8 = 0x08;
    /// This frame carries a routing-id prefix.
    pub const IDENTITY: u8 = 0x10;
    /// Heartbeat ping (implies `CONTROL`).
    pub const PING: u8 = 0x20;
    /// Heartbeat pong (implies `CONTROL`).
    pub const PONG: u8 = 0x40;

    #[inline]
    #[must_use]
    pub const fn more(&self) -> bool {
        (self.flags & Self::MORE) != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_control(&self) -> bool {
        (self.flags & Self::CONTROL) != 0
    }

    /// Alias for [`Self::is_control`], kept for call sites that still speak
    /// in terms of a generic "command frame".
    #[inline]
    #[must_use]
    pub const fn is_command(&self) -> bool {
        self.is_control()
    }

    #[inline]
    #[must_use]
    pub const fn is_subscribe(&self) -> bool {
        (self.flags & Self::SUBSCRIBE) != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_cancel(&self) -> bool {
        (self.flags & Self::CANCEL) != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        (self.flags & Self::IDENTITY) != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_ping(&self) -> bool {
        (self.flags & Self::PING) != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_pong(&self) -> bool {
        (self.flags & Self::PONG) != 0
    }

    fn validate_flags(flags: u8) -> Result<()> {
        if flags & Self::SUBSCRIBE != 0 && flags & Self::CANCEL != 0 {
            return Err(ZmpError::IllegalFlags);
        }
        if flags & Self::CONTROL != 0 && flags & Self::MORE != 0 && flags & Self::IDENTITY == 0 {
            return Err(ZmpError::IllegalFlags);
        }
        Ok(())
    }

    /// Create a data frame.
    #[must_use]
    pub const fn data(payload: Bytes, more: bool) -> Self {
        let mut flags = 0;
        if more {
            flags |= Self::MORE;
        }
        Self { flags, payload }
    }

    /// Create a routing-id prefix frame (ROUTER inbound synthesis / DEALER
    /// outbound addressing).
    #[must_use]
    pub const fn identity(payload: Bytes, more: bool) -> Self {
        let mut flags = Self::IDENTITY;
        if more {
            flags |= Self::MORE;
        }
        Self { flags, payload }
    }

    /// Create a control frame (HELLO/READY/ERROR; `SUBSCRIBE`/`CANCEL` use
    /// the dedicated constructors below since they carry extra flags).
    #[must_use]
    pub const fn control(payload: Bytes) -> Self {
        Self {
            flags: Self::CONTROL,
            payload,
        }
    }

    /// Create a `SUBSCRIBE` command frame carrying the subscription prefix.
    #[must_use]
    pub const fn subscribe(prefix: Bytes) -> Self {
        Self {
            flags: Self::CONTROL | Self::SUBSCRIBE,
            payload: prefix,
        }
    }

    /// Create a `CANCEL` command frame carrying the subscription prefix.
    #[must_use]
    pub const fn cancel(prefix: Bytes) -> Self {
        Self {
            flags: Self::CONTROL | Self::CANCEL,
            payload: prefix,
        }
    }

    /// Create a `PING` heartbeat frame carrying an opaque context payload.
    #[must_use]
    pub const fn ping(context: Bytes) -> Self {
        Self {
            flags: Self::CONTROL | Self::PING,
            payload: context,
        }
    }

    /// Create a `PONG` heartbeat frame echoing the peer's ping context.
    #[must_use]
    pub const fn pong(context: Bytes) -> Self {
        Self {
            flags: Self::CONTROL | Self::PONG,
            payload: context,
        }
    }

    /// Encode this frame to bytes (8-byte header + body).
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(ZMP_HEADER_LEN + self.payload.len());
        self.encode_into(&mut out);
        out.freeze()
    }

    /// Encode this frame into an existing buffer, amortizing allocations.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(ZMP_HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&[ZMP_MAGIC, ZMP_VERSION, self.flags, 0]);
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
    }
}

/// Stateful ZMP decoder.
///
/// Fast path: the entire frame is already buffered → zero-copy slice.
/// Slow path: the frame is fragmented across reads → reassembled into a
/// `BytesMut` staging buffer.
pub struct ZmpDecoder {
    pending_flags: Option<u8>,
    expected_body_len: usize,
    staging: BytesMut,
    max_msg_size: usize,
}

impl Default for ZmpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZmpDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending_flags: None,
            expected_body_len: 0,
            staging: BytesMut::with_capacity(STAGING_BUF_INITIAL_CAP),
            max_msg_size: usize::MAX,
        }
    }

    #[must_use]
    pub fn with_max_msg_size(max_msg_size: usize) -> Self {
        Self {
            max_msg_size,
            ..Self::new()
        }
    }

    pub fn set_max_msg_size(&mut self, max_msg_size: usize) {
        self.max_msg_size = max_msg_size;
    }

    /// `true` if the decoder is mid-reassembly of a fragmented frame.
    #[inline]
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.pending_flags.is_some()
    }

    /// Decode a single frame from `src`.
    ///
    /// - `Ok(Some(frame))` — frame decoded.
    /// - `Ok(None)` — need more data.
    /// - `Err` — protocol violation; caller should send an `ERROR` frame
    ///   carrying `err.code()` and terminate the engine.
    pub fn decode(&mut self, src: &mut SegmentedBuffer) -> Result<Option<ZmpFrame>> {
        // === Reassembly mode ===
        if let Some(flags) = self.pending_flags {
            let needed = self.expected_body_len - self.staging.len();
            let take = needed.min(src.len());
            if let Some(bytes) = src.take_bytes(take) {
                self.staging.extend_from_slice(&bytes);
            }

            if self.staging.len() < self.expected_body_len {
                return Ok(None);
            }

            let payload = self.staging.split().freeze();
            self.pending_flags = None;
            self.expected_body_len = 0;

            return Ok(Some(ZmpFrame { flags, payload }));
        }

        // === Header parsing (fixed 8 bytes) ===
        if src.len() < ZMP_HEADER_LEN {
            return Ok(None);
        }

        let mut hdr = [0u8; ZMP_HEADER_LEN];
        if !src.copy_prefix(ZMP_HEADER_LEN, &mut hdr) {
            return Ok(None);
        }

        if hdr[0] != ZMP_MAGIC {
            return Err(ZmpError::BadMagic);
        }
        if hdr[1] != ZMP_VERSION {
            return Err(ZmpError::UnsupportedVersion);
        }

        let flags = hdr[2];
        ZmpFrame::validate_flags(flags)?;

        let mut len_buf = &hdr[4..8];
        let body_len = len_buf.get_u32() as usize;

        if body_len > self.max_msg_size {
            return Err(ZmpError::SizeTooLarge);
        }

        let total_len = ZMP_HEADER_LEN + body_len;

        // === Fast path: entire frame present ===
        if src.len() >= total_len {
            src.advance(ZMP_HEADER_LEN);
            let payload = src
                .take_bytes(body_len)
                .expect("len check ensures body is available");
            return Ok(Some(ZmpFrame { flags, payload }));
        }

        // === Slow path: fragmentation ===
        src.advance(ZMP_HEADER_LEN);
        self.pending_flags = Some(flags);
        self.expected_body_len = body_len;
        self.staging.clear();

        let available = src.len().min(body_len);
        if let Some(bytes) = src.take_bytes(available) {
            self.staging.extend_from_slice(&bytes);
        }

        Ok(None)
    }
}

/// Encode a multipart message directly into a buffer, without allocating
/// intermediate `ZmpFrame` objects. Reuses `buf`'s existing capacity.
pub fn encode_multipart(msg: &[Bytes], buf: &mut BytesMut) {
    for (i, part) in msg.iter().enumerate() {
        let more = i < msg.len() - 1;
        let mut flags = 0u8;
        if more {
            flags |= ZmpFrame::MORE;
        }
        buf.reserve(ZMP_HEADER_LEN + part.len());
        buf.extend_from_slice(&[ZMP_MAGIC, ZMP_VERSION, flags, 0]);
        buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
        buf.extend_from_slice(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_single_frame_roundtrip() {
        let frame = ZmpFrame::data(Bytes::from_static(b"hello"), false);
        let encoded = frame.encode();

        let mut buf = SegmentedBuffer::new();
        buf.push(encoded);

        let mut decoder = ZmpDecoder::new();
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload, Bytes::from_static(b"hello"));
        assert!(!decoded.more());
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut buf = SegmentedBuffer::new();
        buf.push(Bytes::from_static(&[0x00, ZMP_VERSION, 0, 0, 0, 0, 0, 0]));
        let mut decoder = ZmpDecoder::new();
        assert_eq!(decoder.decode(&mut buf), Err(ZmpError::BadMagic));
    }

    #[test]
    fn decode_rejects_bad_version() {
        let mut buf = SegmentedBuffer::new();
        buf.push(Bytes::from_static(&[ZMP_MAGIC, 0x99, 0, 0, 0, 0, 0, 0]));
        let mut decoder = ZmpDecoder::new();
        assert_eq!(decoder.decode(&mut buf), Err(ZmpError::UnsupportedVersion));
    }

    #[test]
    fn decode_rejects_subscribe_and_cancel_together() {
        let flags = ZmpFrame::CONTROL | ZmpFrame::SUBSCRIBE | ZmpFrame::CANCEL;
        let mut buf = SegmentedBuffer::new();
        buf.push(Bytes::from_static(&[
            ZMP_MAGIC, ZMP_VERSION, flags, 0, 0, 0, 0, 0,
        ]));
        let mut decoder = ZmpDecoder::new();
        assert_eq!(decoder.decode(&mut buf), Err(ZmpError::IllegalFlags));
    }

    #[test]
    fn decode_rejects_oversized_body() {
        let mut buf = SegmentedBuffer::new();
        buf.push(Bytes::from_static(&[
            ZMP_MAGIC, ZMP_VERSION, 0, 0, 0, 0, 1, 0,
        ]));
        let mut decoder = ZmpDecoder::with_max_msg_size(64);
        assert_eq!(decoder.decode(&mut buf), Err(ZmpError::SizeTooLarge));
    }

    #[test]
    fn decode_handles_split_header_and_body() {
        let frame = ZmpFrame::data(Bytes::from_static(b"0123456789"), false);
        let encoded = frame.encode();

        let mut buf = SegmentedBuffer::new();
        // Split the wire bytes across several pushes to exercise the
        // fragmentation path.
        buf.push(encoded.slice(0..3));
        let mut decoder = ZmpDecoder::new();
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.push(encoded.slice(3..10));
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.push(encoded.slice(10..encoded.len()));
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload, Bytes::from_static(b"0123456789"));
    }

    #[test]
    fn multipart_encode_sets_more_flag_on_all_but_last() {
        let mut buf = BytesMut::new();
        let parts = [Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        encode_multipart(&parts, &mut buf);

        let mut seg = SegmentedBuffer::new();
        seg.push(buf.freeze());
        let mut decoder = ZmpDecoder::new();

        let first = decoder.decode(&mut seg).unwrap().unwrap();
        assert!(first.more());
        let second = decoder.decode(&mut seg).unwrap().unwrap();
        assert!(!second.more());
    }
}
