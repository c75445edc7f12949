//! Raw length-prefixed codec for STREAM sockets — `spec.md` §4.4.1.
//!
//! Wire layout per message: `u32 big-endian length, then that many bytes`.
//! There is no handshake and no MORE flag: every decoded message is a
//! complete, independent frame. A zero-length frame is valid and used by
//! STREAM sockets to signal peer close.

use bytes::{Buf, Bytes, BytesMut};
use zlink_core::buffer::SegmentedBuffer;

/// Size of the raw codec's length prefix, in bytes.
pub const RAW_HEADER_LEN: usize = 4;

/// Raw codec errors.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum RawCodecError {
    #[error("frame exceeds maximum message size")]
    MessageTooLarge,
}

/// Result type alias for raw codec operations.
pub type Result<T> = std::result::Result<T, RawCodecError>;

/// Stateful raw-codec decoder for STREAM sockets.
pub struct RawDecoder {
    pending_len: Option<usize>,
    staging: BytesMut,
    max_msg_size: usize,
}

impl Default for RawDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RawDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending_len: None,
            staging: BytesMut::new(),
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

    /// Decode a single message from `src`.
    ///
    /// A zero-length frame decodes to `Ok(Some(Bytes::new()))` and is
    /// treated by the STREAM socket as an end-of-stream marker for that
    /// peer, not as absence of a message.
    pub fn decode(&mut self, src: &mut SegmentedBuffer) -> Result<Option<Bytes>> {
        if let Some(len) = self.pending_len {
            let needed = len - self.staging.len();
            let take = needed.min(src.len());
            if let Some(bytes) = src.take_bytes(take) {
                self.staging.extend_from_slice(&bytes);
            }
            if self.staging.len() < len {
                return Ok(None);
            }
            self.pending_len = None;
            return Ok(Some(self.staging.split().freeze()));
        }

        if src.len() < RAW_HEADER_LEN {
            return Ok(None);
        }

        let mut hdr = [0u8; RAW_HEADER_LEN];
        if !src.copy_prefix(RAW_HEADER_LEN, &mut hdr) {
            return Ok(None);
        }
        let mut buf = &hdr[..];
        let len = buf.get_u32() as usize;

        if len > self.max_msg_size {
            return Err(RawCodecError::MessageTooLarge);
        }

        if src.len() >= RAW_HEADER_LEN + len {
            src.advance(RAW_HEADER_LEN);
            let payload = src
                .take_bytes(len)
                .expect("len check ensures body is available");
            return Ok(Some(payload));
        }

        src.advance(RAW_HEADER_LEN);
        self.pending_len = Some(len);
        self.staging.clear();
        let available = src.len().min(len);
        if let Some(bytes) = src.take_bytes(available) {
            self.staging.extend_from_slice(&bytes);
        }
        Ok(None)
    }
}

/// Encode one raw message (4-byte BE length prefix + payload).
pub fn encode(payload: &[u8], buf: &mut BytesMut) {
    buf.reserve(RAW_HEADER_LEN + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut buf = BytesMut::new();
        encode(b"hello", &mut buf);

        let mut seg = SegmentedBuffer::new();
        seg.push(buf.freeze());

        let mut decoder = RawDecoder::new();
        let decoded = decoder.decode(&mut seg).unwrap().unwrap();
        assert_eq!(decoded, Bytes::from_static(b"hello"));
    }

    #[test]
    fn zero_length_frame_is_valid() {
        let mut buf = BytesMut::new();
        encode(b"", &mut buf);

        let mut seg = SegmentedBuffer::new();
        seg.push(buf.freeze());

        let mut decoder = RawDecoder::new();
        let decoded = decoder.decode(&mut seg).unwrap();
        assert_eq!(decoded, Some(Bytes::new()));
    }

    #[test]
    fn rejects_oversized_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&1000u32.to_be_bytes());

        let mut seg = SegmentedBuffer::new();
        seg.push(buf.freeze());

        let mut decoder = RawDecoder::with_max_msg_size(100);
        assert_eq!(
            decoder.decode(&mut seg),
            Err(RawCodecError::MessageTooLarge)
        );
    }

    #[test]
    fn handles_fragmented_body() {
        let mut buf = BytesMut::new();
        encode(b"0123456789", &mut buf);
        let encoded = buf.freeze();

        let mut seg = SegmentedBuffer::new();
        seg.push(encoded.slice(0..6));
        let mut decoder = RawDecoder::new();
        assert!(decoder.decode(&mut seg).unwrap().is_none());

        seg.push(encoded.slice(6..encoded.len()));
        let decoded = decoder.decode(&mut seg).unwrap().unwrap();
        assert_eq!(decoded, Bytes::from_static(b"0123456789"));
    }
}
