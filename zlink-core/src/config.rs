//! Buffer sizing presets shared by every socket type.
//!
//! Tuning these values trades memory for fewer syscalls/reallocations on
//! fragmented frames; the defaults are a reasonable middle ground.

/// Default read buffer size (8KB).
pub const DEFAULT_READ_BUF_SIZE: usize = 8192;

/// Default write buffer size (8KB).
pub const DEFAULT_WRITE_BUF_SIZE: usize = 8192;

/// Small read buffer size (4KB) — ping-pong request/reply workloads.
pub const SMALL_READ_BUF_SIZE: usize = 4096;

/// Small write buffer size (4KB).
pub const SMALL_WRITE_BUF_SIZE: usize = 4096;

/// Large read buffer size (16KB) — DEALER/ROUTER with bigger payloads.
pub const LARGE_READ_BUF_SIZE: usize = 16384;

/// Large write buffer size (16KB).
pub const LARGE_WRITE_BUF_SIZE: usize = 16384;

/// Initial staging buffer capacity for decoder reassembly (256 bytes).
///
/// Only used on the slow path, when a frame spans multiple recv segments.
pub const STAGING_BUF_INITIAL_CAP: usize = 256;

/// Socket buffer sizing hints, applied at socket construction time.
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    /// Read buffer size (arena allocation).
    pub read_buf_size: usize,
    /// Write buffer size (`BytesMut` capacity).
    pub write_buf_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            read_buf_size: DEFAULT_READ_BUF_SIZE,
            write_buf_size: DEFAULT_WRITE_BUF_SIZE,
        }
    }
}

impl BufferConfig {
    /// Configuration optimized for small messages (< 1KB).
    #[must_use]
    pub const fn small() -> Self {
        Self {
            read_buf_size: SMALL_READ_BUF_SIZE,
            write_buf_size: SMALL_WRITE_BUF_SIZE,
        }
    }

    /// Configuration optimized for large messages (8-16KB).
    #[must_use]
    pub const fn large() -> Self {
        Self {
            read_buf_size: LARGE_READ_BUF_SIZE,
            write_buf_size: LARGE_WRITE_BUF_SIZE,
        }
    }

    /// Custom buffer sizing.
    #[must_use]
    pub const fn custom(read_buf_size: usize, write_buf_size: usize) -> Self {
        Self {
            read_buf_size,
            write_buf_size,
        }
    }
}
