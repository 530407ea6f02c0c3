//! Data-channel frame shapes (bulk transfer, not the control channel).

use crate::error::{ProtocolError, Result};

/// Maximum bytes of raw payload per plain-mode data frame.
pub const MAX_PORTION_DATA_BYTES: usize = 982;

/// Size of the opaque `key_info` field in an encoder-mode envelope.
pub const CRYPT_DATA_KEY_SIZE: usize = 8;

/// Size of the envelope's length field.
pub const CRYPT_DATA_LEN_SIZE: usize = 2;

/// Size of the opaque integrity-tag field in an encoder-mode envelope.
pub const CRYPT_DATA_IMIT_SIZE: usize = 8;

/// Total size of one encoder-mode envelope on the wire.
pub const CRYPT_PACKET_SIZE: usize =
    CRYPT_DATA_KEY_SIZE + CRYPT_DATA_LEN_SIZE + MAX_PORTION_DATA_BYTES + CRYPT_DATA_IMIT_SIZE;

/// Default data-channel port advertised by the reference client.
pub const RXS_DATA_PORT: u16 = 1502;

/// TCP `TCP_MAXSEG` hint applied to the data socket in encoder mode.
pub const ENCODER_TCP_MAXSEG: u32 = 1012;

/// A fixed-shape encoder-mode envelope wrapping one data-channel frame. The
/// `data`/`imit` contents are opaque ciphertext and an opaque integrity tag
/// respectively — this module only enforces the envelope's shape, never its
/// semantics (those live in `rxs-crypto`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Opaque per-frame key material (nonce/key-id bytes).
    pub key_info: [u8; CRYPT_DATA_KEY_SIZE],
    /// Count of meaningful bytes inside `data`.
    pub len: u16,
    /// Right-padded data block, always exactly [`MAX_PORTION_DATA_BYTES`] long.
    pub data: [u8; MAX_PORTION_DATA_BYTES],
    /// Opaque integrity tag.
    pub imit: [u8; CRYPT_DATA_IMIT_SIZE],
}

impl Envelope {
    /// Build an envelope from up to [`MAX_PORTION_DATA_BYTES`] bytes of
    /// plaintext payload, right-padding with zeroes.
    ///
    /// # Panics
    ///
    /// Panics if `payload.len() > MAX_PORTION_DATA_BYTES`.
    #[must_use]
    pub fn new(key_info: [u8; CRYPT_DATA_KEY_SIZE], payload: &[u8], imit: [u8; CRYPT_DATA_IMIT_SIZE]) -> Self {
        assert!(payload.len() <= MAX_PORTION_DATA_BYTES, "payload exceeds one data frame");
        let mut data = [0u8; MAX_PORTION_DATA_BYTES];
        data[..payload.len()].copy_from_slice(payload);
        #[allow(clippy::expect_used)]
        let len = u16::try_from(payload.len()).expect("invariant: bounded by MAX_PORTION_DATA_BYTES <= u16::MAX");
        Self { key_info, len, data, imit }
    }

    /// Serialize to the fixed [`CRYPT_PACKET_SIZE`]-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CRYPT_PACKET_SIZE] {
        let mut out = [0u8; CRYPT_PACKET_SIZE];
        let mut offset = 0;
        out[offset..offset + CRYPT_DATA_KEY_SIZE].copy_from_slice(&self.key_info);
        offset += CRYPT_DATA_KEY_SIZE;
        out[offset..offset + CRYPT_DATA_LEN_SIZE].copy_from_slice(&self.len.to_be_bytes());
        offset += CRYPT_DATA_LEN_SIZE;
        out[offset..offset + MAX_PORTION_DATA_BYTES].copy_from_slice(&self.data);
        offset += MAX_PORTION_DATA_BYTES;
        out[offset..offset + CRYPT_DATA_IMIT_SIZE].copy_from_slice(&self.imit);
        out
    }

    /// Parse a fixed-size envelope from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CRYPT_PACKET_SIZE {
            return Err(ProtocolError::MalformedSlot);
        }
        let mut offset = 0;
        let mut key_info = [0u8; CRYPT_DATA_KEY_SIZE];
        key_info.copy_from_slice(&bytes[offset..offset + CRYPT_DATA_KEY_SIZE]);
        offset += CRYPT_DATA_KEY_SIZE;

        let len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += CRYPT_DATA_LEN_SIZE;
        if len as usize > MAX_PORTION_DATA_BYTES {
            return Err(ProtocolError::MalformedSlot);
        }

        let mut data = [0u8; MAX_PORTION_DATA_BYTES];
        data.copy_from_slice(&bytes[offset..offset + MAX_PORTION_DATA_BYTES]);
        offset += MAX_PORTION_DATA_BYTES;

        let mut imit = [0u8; CRYPT_DATA_IMIT_SIZE];
        imit.copy_from_slice(&bytes[offset..offset + CRYPT_DATA_IMIT_SIZE]);

        Ok(Self { key_info, len, data, imit })
    }

    /// The meaningful bytes inside `data` (`data[..len]`).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Total bytes a transfer of `n` bytes occupies on the data wire.
///
/// Plain mode: `n` rounded up to the nearest sum of [`MAX_PORTION_DATA_BYTES`]
/// sized frames. Encoder mode: one fixed [`CRYPT_PACKET_SIZE`] envelope per
/// (possibly partial) [`MAX_PORTION_DATA_BYTES`] chunk.
#[must_use]
pub fn wire_bytes_for_transfer(n: u64, encoder_mode: bool) -> u64 {
    if n == 0 {
        return 0;
    }
    let portion = MAX_PORTION_DATA_BYTES as u64;
    let frames = n.div_ceil(portion);
    if encoder_mode { frames * CRYPT_PACKET_SIZE as u64 } else { frames * portion }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trip() {
        let envelope = Envelope::new([1; CRYPT_DATA_KEY_SIZE], b"hello", [2; CRYPT_DATA_IMIT_SIZE]);
        let bytes = envelope.to_bytes();
        assert_eq!(bytes.len(), CRYPT_PACKET_SIZE);
        let parsed = Envelope::from_bytes(&bytes).expect("parses");
        assert_eq!(parsed, envelope);
        assert_eq!(parsed.payload(), b"hello");
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(Envelope::from_bytes(&[0u8; 10]), Err(ProtocolError::MalformedSlot));
    }

    #[test]
    fn plain_mode_transfer_sizing() {
        assert_eq!(wire_bytes_for_transfer(0, false), 0);
        assert_eq!(wire_bytes_for_transfer(982, false), 982);
        assert_eq!(wire_bytes_for_transfer(983, false), 982 * 2);
    }

    #[test]
    fn encoder_mode_transfer_sizing() {
        assert_eq!(wire_bytes_for_transfer(4 * 1024 * 1024, true), (4u64 * 1024 * 1024).div_ceil(982) * 998);
    }
}
