//! The six stereotyped payload "slot" shapes. All multi-byte integers are
//! big-endian; variable-length byte strings are prefixed by a `u32` length.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

fn read_u32(buf: &mut &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(ProtocolError::MalformedSlot);
    }
    let value = buf.get_u32();
    Ok(value)
}

fn read_len_prefixed(buf: &mut &[u8]) -> Result<Bytes> {
    let len = read_u32(buf)? as usize;
    if buf.len() < len {
        return Err(ProtocolError::MalformedSlot);
    }
    let bytes = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(bytes)
}

fn put_len_prefixed(out: &mut BytesMut, data: &[u8]) {
    #[allow(clippy::expect_used)]
    let len = u32::try_from(data.len()).expect("invariant: slot strings are well under u32::MAX");
    out.put_u32(len);
    out.put_slice(data);
}

/// A decoded payload slot. The variant expected for a given operation is
/// fixed by the request/response table in the operation catalog; decoding
/// uses [`Slot::decode_as`] with the shape the caller already knows to
/// expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// `u32 val`.
    S0 { val: u32 },
    /// `u32 len` + `len` bytes.
    S1 { data: Bytes },
    /// Two length-prefixed byte strings plus an encoder flag.
    S2 { first: Bytes, second: Bytes, encoder: bool },
    /// A length-prefixed byte string plus a trailing `u32`.
    S3 { data: Bytes, val: u32 },
    /// Stream id, data size, and an EOF flag (`0` or `RXS_EOF = 0xFFFF`).
    S4 { stream_id: u32, data_size: u32, eof: u16 },
    /// Stream id and a pre-network-order port value.
    S5 { stream_id: u32, port: u16 },
}

/// Sentinel EOF marker for [`Slot::S4`]'s `eof` field.
pub const RXS_EOF: u16 = 0xFFFF;

/// Which of the six slot shapes to decode a payload buffer as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotShape {
    /// See [`Slot::S0`].
    S0,
    /// See [`Slot::S1`].
    S1,
    /// See [`Slot::S2`].
    S2,
    /// See [`Slot::S3`].
    S3,
    /// See [`Slot::S4`].
    S4,
    /// See [`Slot::S5`].
    S5,
}

impl Slot {
    /// Encode this slot into wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        match self {
            Self::S0 { val } => out.put_u32(*val),
            Self::S1 { data } => put_len_prefixed(&mut out, data),
            Self::S2 { first, second, encoder } => {
                put_len_prefixed(&mut out, first);
                put_len_prefixed(&mut out, second);
                out.put_u8(u8::from(*encoder));
            }
            Self::S3 { data, val } => {
                put_len_prefixed(&mut out, data);
                out.put_u32(*val);
            }
            Self::S4 { stream_id, data_size, eof } => {
                out.put_u32(*stream_id);
                out.put_u32(*data_size);
                out.put_u16(*eof);
            }
            Self::S5 { stream_id, port } => {
                out.put_u32(*stream_id);
                out.put_u16(*port);
            }
        }
        out.freeze()
    }

    /// Decode a payload buffer as the given shape.
    pub fn decode_as(shape: SlotShape, payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        let slot = match shape {
            SlotShape::S0 => Self::S0 { val: read_u32(&mut buf)? },
            SlotShape::S1 => Self::S1 { data: read_len_prefixed(&mut buf)? },
            SlotShape::S2 => {
                let first = read_len_prefixed(&mut buf)?;
                let second = read_len_prefixed(&mut buf)?;
                if buf.is_empty() {
                    return Err(ProtocolError::MalformedSlot);
                }
                let encoder = buf.get_u8() != 0;
                Self::S2 { first, second, encoder }
            }
            SlotShape::S3 => {
                let data = read_len_prefixed(&mut buf)?;
                let val = read_u32(&mut buf)?;
                Self::S3 { data, val }
            }
            SlotShape::S4 => {
                let stream_id = read_u32(&mut buf)?;
                let data_size = read_u32(&mut buf)?;
                if buf.len() < 2 {
                    return Err(ProtocolError::MalformedSlot);
                }
                let eof = buf.get_u16();
                Self::S4 { stream_id, data_size, eof }
            }
            SlotShape::S5 => {
                let stream_id = read_u32(&mut buf)?;
                if buf.len() < 2 {
                    return Err(ProtocolError::MalformedSlot);
                }
                let port = buf.get_u16();
                Self::S5 { stream_id, port }
            }
        };
        Ok(slot)
    }

    /// Convenience constructor for an `S0` slot.
    #[must_use]
    pub fn s0(val: u32) -> Self {
        Self::S0 { val }
    }

    /// Convenience constructor for an `S1` slot from any byte-like value.
    #[must_use]
    pub fn s1(data: impl Into<Bytes>) -> Self {
        Self::S1 { data: data.into() }
    }
}
