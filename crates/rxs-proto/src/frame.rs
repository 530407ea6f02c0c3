//! Complete control packets and the carry-over buffer scanner.

use bytes::{Bytes, BytesMut};

use crate::error::{ProtocolError, Result};
use crate::header::{PacketHeader, SEPARATOR};
use crate::opcode::{Operation, PacketType};

/// A complete, framed control packet: header plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Fixed 18-byte header.
    pub header: PacketHeader,
    /// Operation-specific slot bytes. Length equals `header.payload_len()`.
    pub payload: Bytes,
}

impl Packet {
    /// Build a packet, computing the header's `sz` and `crc32` fields from
    /// `payload`.
    #[must_use]
    pub fn new(kind: PacketType, uid: u32, operation: Operation, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        #[allow(clippy::expect_used)]
        let payload_len =
            u32::try_from(payload.len()).expect("invariant: control payloads are well under u32::MAX");
        let crc32 = crc32fast::hash(&payload);
        let header = PacketHeader::new(kind, uid, operation, crc32, payload_len);
        Self { header, payload }
    }

    /// Build the `SC_B1` failure response carrying `S0{val = errno}` for a
    /// request with the given `uid`/`operation`.
    #[must_use]
    pub fn fail(uid: u32, operation: Operation, errno: u32) -> Self {
        Self::new(PacketType::Fail, uid, operation, errno.to_be_bytes().to_vec())
    }

    /// Serialize header + payload into a contiguous buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PacketHeader::SIZE + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode a complete packet from an in-memory buffer known to hold
    /// exactly one frame (`bytes.len() == header.sz()`), verifying the CRC.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(bytes)?;
        let total = header.sz() as usize;
        if bytes.len() < total {
            return Err(ProtocolError::FrameTruncated {
                expected: header.payload_len() as usize,
                actual: bytes.len().saturating_sub(PacketHeader::SIZE),
            });
        }
        let payload = Bytes::copy_from_slice(&bytes[PacketHeader::SIZE..total]);
        let computed = crc32fast::hash(&payload);
        if computed != header.crc32() {
            return Err(ProtocolError::CrcMismatch { expected: header.crc32(), actual: computed });
        }
        Ok(Self { header, payload })
    }
}

/// Outcome of scanning a byte buffer for one framed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// No plausible frame start found, or a plausible header was found but
    /// the buffer doesn't yet hold `sz` bytes. More reads are needed.
    NeedMore,
    /// A complete, CRC-valid frame starts at `offset` and spans `len` bytes.
    Found {
        /// Offset of the frame's first separator byte.
        offset: usize,
        /// Total frame length (header + payload).
        len: usize,
    },
    /// A structurally plausible frame was found but its CRC did not match.
    /// Fatal for the channel.
    CrcMismatch {
        /// Offset of the corrupt frame's first separator byte.
        offset: usize,
    },
    /// The buffer contains no recoverable frame-sync point at all (e.g. ran
    /// out of buffer without ever seeing two separator bytes followed by a
    /// plausible header).
    Malformed,
}

/// Scan `buffer` for the earliest byte offset at which two consecutive
/// separator bytes are followed by a structurally plausible header (`sz`
/// at least the header size, a recognized packet type, a recognized
/// operation code).
///
/// Returns [`ScanResult::NeedMore`] if no such offset is found at all (the
/// caller should read more bytes and retry), or if one is found but fewer
/// than `sz` bytes of buffer remain after it. Returns
/// [`ScanResult::CrcMismatch`] if a complete frame at the earliest candidate
/// offset fails its CRC check.
#[must_use]
pub fn scan(buffer: &[u8]) -> ScanResult {
    if buffer.len() < 2 {
        return ScanResult::NeedMore;
    }

    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] != SEPARATOR || buffer[i + 1] != SEPARATOR {
            i += 1;
            continue;
        }

        let remaining = &buffer[i..];
        if remaining.len() < PacketHeader::SIZE {
            return ScanResult::NeedMore;
        }

        let Ok(header) = PacketHeader::from_bytes(remaining) else {
            i += 1;
            continue;
        };

        let total = header.sz() as usize;
        if remaining.len() < total {
            return ScanResult::NeedMore;
        }

        let payload = &remaining[PacketHeader::SIZE..total];
        let computed = crc32fast::hash(payload);
        return if computed == header.crc32() {
            ScanResult::Found { offset: i, len: total }
        } else {
            ScanResult::CrcMismatch { offset: i }
        };
    }

    ScanResult::Malformed
}

/// A growable carry-over buffer: bytes read from a socket accumulate here;
/// after [`scan`] reports [`ScanResult::Found`], the caller extracts the
/// frame and shifts any trailing bytes to the front so they participate in
/// the next scan. Mirrors the control channel's read-loop contract.
#[derive(Debug, Default)]
pub struct CarryOverBuffer {
    buf: BytesMut,
}

impl CarryOverBuffer {
    /// Construct an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Scan the buffered bytes; on [`ScanResult::Found`], split the decoded
    /// packet out and retain only the trailing bytes for the next round.
    pub fn try_take_packet(&mut self) -> Result<Option<Packet>> {
        match scan(&self.buf) {
            ScanResult::NeedMore | ScanResult::Malformed => Ok(None),
            ScanResult::CrcMismatch { offset } => {
                let header = PacketHeader::from_bytes(&self.buf[offset..])?;
                let total = header.sz() as usize;
                let payload = &self.buf[offset + PacketHeader::SIZE..offset + total];
                let actual = crc32fast::hash(payload);
                Err(ProtocolError::CrcMismatch { expected: header.crc32(), actual })
            }
            ScanResult::Found { offset, len } => {
                let frame_end = offset + len;
                let packet = Packet::decode(&self.buf[offset..frame_end])?;
                let remainder = self.buf.split_off(frame_end);
                self.buf = remainder;
                Ok(Some(packet))
            }
        }
    }
}
