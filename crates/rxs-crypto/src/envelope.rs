//! Encoder-mode envelope encryption.
//!
//! The wire shape (`key_info`, `len`, `data`, `imit`) is fixed and owned by
//! `rxs-proto`; this module only fills and verifies it. `key_info` carries
//! the per-frame nonce seed, `data` is a `ChaCha20` keystream applied to the
//! plaintext, and `imit` is an 8-byte truncated HMAC-SHA256 tag computed
//! over `key_info || len || data` — an encrypt-then-MAC construction rather
//! than a combined AEAD tag, since the envelope has no room for a full
//! 16-byte Poly1305 tag.

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rxs_proto::data::{CRYPT_DATA_IMIT_SIZE, CRYPT_DATA_KEY_SIZE, Envelope, MAX_PORTION_DATA_BYTES};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const NONCE_INFO_LABEL: &[u8] = b"rxs-encoder-nonce";

/// A session's symmetric key for the encoder-mode envelope, fixed for the
/// life of the connection. Zeroized on drop.
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Wrap a raw 32-byte key.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive a session key from a shared secret via HKDF-SHA256, with
    /// `context` (e.g. the authenticated username) bound into the info
    /// parameter so two sessions sharing a secret never share a key.
    #[must_use]
    pub fn derive(secret: &[u8], context: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, secret);
        let mut key = [0u8; KEY_SIZE];
        let Ok(()) = hkdf.expand(context, &mut key) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };
        Self(key)
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn derive_nonce(key: &SessionKey, key_info: &[u8; CRYPT_DATA_KEY_SIZE]) -> [u8; NONCE_SIZE] {
    let hkdf = Hkdf::<Sha256>::new(None, &key.0);
    let mut info = Vec::with_capacity(NONCE_INFO_LABEL.len() + CRYPT_DATA_KEY_SIZE);
    info.extend_from_slice(NONCE_INFO_LABEL);
    info.extend_from_slice(key_info);

    let mut nonce = [0u8; NONCE_SIZE];
    let Ok(()) = hkdf.expand(&info, &mut nonce) else {
        unreachable!("12 bytes is a valid HKDF-SHA256 output length");
    };
    nonce
}

fn compute_tag(key: &SessionKey, key_info: &[u8; CRYPT_DATA_KEY_SIZE], len: u16, ciphertext: &[u8]) -> [u8; CRYPT_DATA_IMIT_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(&key.0) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(key_info);
    mac.update(&len.to_be_bytes());
    mac.update(ciphertext);
    let full = mac.finalize().into_bytes();

    let mut tag = [0u8; CRYPT_DATA_IMIT_SIZE];
    tag.copy_from_slice(&full[..CRYPT_DATA_IMIT_SIZE]);
    tag
}

/// Encrypt one data-channel frame into an envelope.
///
/// `key_info` must be unique per frame within the session (a per-frame
/// counter or random value both work); it seeds the keystream nonce and is
/// carried on the wire in the clear.
///
/// # Errors
///
/// Returns [`CryptoError::PayloadTooLarge`] if `plaintext` doesn't fit in
/// one envelope.
pub fn encrypt_frame(key: &SessionKey, key_info: [u8; CRYPT_DATA_KEY_SIZE], plaintext: &[u8]) -> Result<Envelope, CryptoError> {
    if plaintext.len() > MAX_PORTION_DATA_BYTES {
        return Err(CryptoError::PayloadTooLarge { max: MAX_PORTION_DATA_BYTES, actual: plaintext.len() });
    }
    #[allow(clippy::cast_possible_truncation)]
    let len = plaintext.len() as u16;

    let nonce = derive_nonce(key, &key_info);
    let mut cipher = ChaCha20::new(&key.0.into(), &nonce.into());
    let mut ciphertext = plaintext.to_vec();
    cipher.apply_keystream(&mut ciphertext);

    let imit = compute_tag(key, &key_info, len, &ciphertext);
    Ok(Envelope::new(key_info, &ciphertext, imit))
}

/// Decrypt and authenticate one envelope.
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailed`] if the recomputed tag does
/// not match the envelope's `imit` field.
pub fn decrypt_frame(key: &SessionKey, envelope: &Envelope) -> Result<Vec<u8>, CryptoError> {
    let expected = compute_tag(key, &envelope.key_info, envelope.len, envelope.payload());
    if !constant_time_eq(&expected, &envelope.imit) {
        return Err(CryptoError::AuthenticationFailed);
    }

    let nonce = derive_nonce(key, &envelope.key_info);
    let mut cipher = ChaCha20::new(&key.0.into(), &nonce.into());
    let mut plaintext = envelope.payload().to_vec();
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

/// Constant-time byte comparison for tag verification.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
