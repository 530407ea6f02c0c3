//! The fixed 18-byte control-packet header.
//!
//! All multi-byte integers are big-endian ("network byte order"), matching
//! every other integer on the wire. The struct is `#[repr(C, packed)]` with
//! `zerocopy` derives so it can be cast directly from a socket read buffer
//! with no intermediate allocation.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{ProtocolError, Result};
use crate::opcode::{Operation, PacketType};

/// First and second separator bytes: literal `'*'`.
pub const SEPARATOR: u8 = 0x2A;

/// `#[repr(C, packed)]` control-packet header, 18 bytes on the wire.
///
/// Layout: `sep1, sep2, sz, type, _reserved, uid, crc32, operation` — the
/// reserved byte keeps `uid` 4-byte aligned in the in-memory struct; it is
/// always zero and ignored on read.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    sep1: u8,
    sep2: u8,
    sz: [u8; 4],
    kind: u8,
    _reserved: u8,
    uid: [u8; 4],
    crc32: [u8; 4],
    operation: [u8; 2],
}

impl PacketHeader {
    /// Fixed serialized size.
    pub const SIZE: usize = 18;

    /// Build a header for a packet carrying `payload_len` bytes of payload.
    #[must_use]
    pub fn new(kind: PacketType, uid: u32, operation: Operation, crc32: u32, payload_len: u32) -> Self {
        Self {
            sep1: SEPARATOR,
            sep2: SEPARATOR,
            #[allow(clippy::expect_used)]
            sz: (payload_len.checked_add(Self::SIZE as u32))
                .expect("invariant: payload_len + header fits in u32 for realistic transfers")
                .to_be_bytes(),
            kind: kind.to_u8(),
            _reserved: 0,
            uid: uid.to_be_bytes(),
            crc32: crc32.to_be_bytes(),
            operation: operation.to_u16().to_be_bytes(),
        }
    }

    /// Parse a header from the first [`Self::SIZE`] bytes of `bytes`, validating
    /// separators, declared size, packet type, and operation code.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::HeaderTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if header.sep1 != SEPARATOR || header.sep2 != SEPARATOR {
            return Err(ProtocolError::MissingSeparator);
        }

        let sz = header.sz();
        if sz < Self::SIZE as u32 {
            return Err(ProtocolError::ImplausibleSize(sz));
        }

        PacketType::from_u8(header.kind).ok_or(ProtocolError::UnrecognizedType(header.kind))?;
        Operation::parse(header.operation())?;

        Ok(*header)
    }

    /// Serialize to an 18-byte array.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(&self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Total packet size (header + payload) as declared on the wire.
    #[must_use]
    pub fn sz(&self) -> u32 {
        u32::from_be_bytes(self.sz)
    }

    /// Payload length implied by `sz - SIZE`.
    #[must_use]
    pub fn payload_len(&self) -> u32 {
        self.sz().saturating_sub(Self::SIZE as u32)
    }

    /// Packet type. Always `Some` after [`Self::from_bytes`] succeeded.
    #[must_use]
    pub fn kind(&self) -> Option<PacketType> {
        PacketType::from_u8(self.kind)
    }

    /// Raw packet-type byte.
    #[must_use]
    pub fn kind_raw(&self) -> u8 {
        self.kind
    }

    /// Request id, a sender-local monotonically increasing counter.
    #[must_use]
    pub fn uid(&self) -> u32 {
        u32::from_be_bytes(self.uid)
    }

    /// CRC32 over payload bytes only.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        u32::from_be_bytes(self.crc32)
    }

    /// Operation code. Always `Some` after [`Self::from_bytes`] succeeded.
    #[must_use]
    pub fn operation(&self) -> u16 {
        u16::from_be_bytes(self.operation)
    }

    /// Operation code as the typed enum.
    #[must_use]
    pub fn operation_enum(&self) -> Option<Operation> {
        Operation::from_u16(self.operation())
    }
}

impl std::fmt::Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketHeader")
            .field("sz", &self.sz())
            .field("kind", &self.kind_raw())
            .field("uid", &self.uid())
            .field("crc32", &format!("{:#010x}", self.crc32()))
            .field("operation", &self.operation())
            .finish()
    }
}

impl PartialEq for PacketHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PacketHeader {}
