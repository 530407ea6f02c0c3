//! Wire-level protocol errors.
//!
//! These are the *protocol* errors from the taxonomy: separator miss, CRC
//! mismatch, short frame, unknown operation. They are fatal for the channel
//! that produced them — distinct from the semantic `Errno` catalog that
//! `rxs-core` maps onto successfully-framed but operation-failed responses.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding a [`crate::PacketHeader`] or
/// [`crate::Packet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Buffer shorter than [`crate::PacketHeader::SIZE`].
    #[error("header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The two leading separator bytes were not both `0x2A`.
    #[error("missing separator bytes")]
    MissingSeparator,

    /// `sz` field smaller than the fixed header size.
    #[error("implausible packet size {0}")]
    ImplausibleSize(u32),

    /// `type` field outside `{1, 2, 3}`.
    #[error("unrecognized packet type {0}")]
    UnrecognizedType(u8),

    /// `operation` field outside the closed operation enumeration.
    #[error("unrecognized operation code {0}")]
    UnrecognizedOperation(u16),

    /// Declared payload length did not match the bytes actually present
    /// when decoding a complete, in-memory packet.
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload bytes the header promised.
        expected: usize,
        /// Payload bytes actually available.
        actual: usize,
    },

    /// CRC32 over the payload did not match the header's `crc32` field.
    #[error("crc32 mismatch: header said {expected:#010x}, computed {actual:#010x}")]
    CrcMismatch {
        /// Value carried in the packet.
        expected: u32,
        /// Value recomputed from the payload bytes.
        actual: u32,
    },

    /// A slot was shorter, longer, or otherwise structurally inconsistent
    /// with its declared shape (e.g. a length prefix running past the end
    /// of the buffer).
    #[error("malformed slot payload")]
    MalformedSlot,
}
