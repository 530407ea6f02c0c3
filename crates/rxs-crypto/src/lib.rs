//! RXS encoder-mode envelope cryptography.
//!
//! Encoder mode wraps every data-channel frame in a fixed-shape envelope
//! (`rxs_proto::data::Envelope`) whose `data`/`imit` fields this crate
//! treats as opaque from the wire's perspective and fills with an
//! encrypt-then-MAC construction:
//!
//! ```text
//! Shared Secret
//!        │
//!        ▼
//! HKDF-SHA256 → Session Key (per authenticated session)
//!        │
//!        ├─ HKDF-SHA256(key_info) → per-frame ChaCha20 nonce
//!        │        │
//!        │        ▼
//!        │  ChaCha20 keystream → ciphertext
//!        │
//!        └─ HMAC-SHA256(key_info, len, ciphertext) → imit (truncated to 8 bytes)
//! ```
//!
//! The session key is fixed for the life of a connection; there is no
//! epoch rotation or per-message ratchet, since a single RXS session has no
//! notion of membership change to react to.
//!
//! # Security
//!
//! - Each frame's nonce is bound to its `key_info`, so the caller must never
//!   reuse a `key_info` value under one session key.
//! - The integrity tag is verified before decryption; authentication
//!   failure surfaces as [`error::CryptoError::AuthenticationFailed`] and
//!   the plaintext is never returned.
//! - The session key is zeroized on drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod error;

pub use envelope::{SessionKey, decrypt_frame, encrypt_frame};
pub use error::CryptoError;
