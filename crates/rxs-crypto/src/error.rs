//! Errors produced by the encoder-mode envelope.

use thiserror::Error;

/// Failure modes for envelope encryption/decryption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The envelope's integrity tag did not match the recomputed tag.
    #[error("envelope authentication failed")]
    AuthenticationFailed,

    /// A key was not the expected length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Plaintext too large to fit in one envelope.
    #[error("plaintext of {actual} bytes exceeds the {max}-byte envelope payload")]
    PayloadTooLarge {
        /// Maximum payload bytes per envelope.
        max: usize,
        /// Length actually supplied.
        actual: usize,
    },
}
