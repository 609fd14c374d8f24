//! Error types for session and ratchet operations
//!
//! No variant carries key bytes. Decryption failures are deliberately opaque:
//! the caller learns that authentication failed, never why.

use thiserror::Error;

/// Errors from key handling, session establishment, and message encryption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key has the wrong length or fails decoding in every accepted encoding
    #[error("invalid key format: {reason}")]
    KeyFormat {
        /// What was wrong with the key (never the key itself)
        reason: String,
    },

    /// Deriving session keys failed
    #[error("session establishment failed: {reason}")]
    SessionEstablishment {
        /// Underlying cause
        reason: String,
    },

    /// Authenticated decryption failed (tampering, wrong key, corruption)
    #[error("decryption failed")]
    Decryption,

    /// The key for an out-of-order message was never cached, or was already
    /// consumed or evicted
    #[error("key not found for out-of-order message {message_number}")]
    SkippedKeyNotFound {
        /// Message number of the undecryptable packet
        message_number: u32,
    },

    /// Packet is further ahead of the receiving chain than the skip bound
    #[error("too many skipped messages: at {current}, requested {requested}")]
    TooManySkipped {
        /// Next expected message number
        current: u32,
        /// Message number carried by the packet
        requested: u32,
    },

    /// A ratchet packet arrived without its message number
    #[error("packet is missing its message number")]
    MissingMessageNumber,

    /// Signed pre-key signature does not verify
    #[error("pre-key signature is invalid")]
    InvalidSignature,

    /// Packet could not be parsed from its wire form
    #[error("malformed packet: {reason}")]
    MalformedPacket {
        /// Parser error description
        reason: String,
    },

    /// Sending message number would overflow
    #[error("message number overflow at {current}")]
    MessageNumberOverflow {
        /// Message number when overflow was detected
        current: u32,
    },
}

impl CryptoError {
    /// Returns true if the operation may succeed when retried with fresh key
    /// material.
    ///
    /// Everything else is terminal: a bad key must be re-fetched, and a message
    /// whose key is gone can never be decrypted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionEstablishment { .. })
    }

    pub(crate) fn key_format(reason: impl Into<String>) -> Self {
        Self::KeyFormat { reason: reason.into() }
    }

    pub(crate) fn session(reason: impl Into<String>) -> Self {
        Self::SessionEstablishment { reason: reason.into() }
    }
}
