//! Wire packet and symmetric encryption using `XSalsa20-Poly1305`
//!
//! The packet is the only artifact that crosses the network boundary. Byte
//! fields are base64url without padding; transport and storage layers carry
//! them opaquely.
//!
//! Ciphertext layout matches libsodium's `crypto_secretbox_easy`: 16-byte
//! Poly1305 tag followed by the encrypted message.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use crypto_secretbox::{
    XSalsa20Poly1305,
    aead::{Aead, KeyInit, Nonce},
};
use serde::{Deserialize, Serialize};

use crate::{
    env::Entropy,
    error::CryptoError,
    keys::{SecretKey, SessionKeys},
};

/// Size of the `XSalsa20` nonce (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// An encrypted payload in wire form.
///
/// Ratchet packets carry the sender's message number and the length of its
/// previous sending chain; plain session packets carry neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherPacket {
    /// Ciphertext including the Poly1305 tag (base64url, no padding)
    pub c: String,
    /// 24-byte nonce (base64url, no padding)
    pub n: String,
    /// Position of the message in the sender's chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_number: Option<u32>,
    /// Sender's chain length at its last root rotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_chain_length: Option<u32>,
}

impl CipherPacket {
    /// Parse the JSON wire object.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::MalformedPacket { reason: e.to_string() })
    }

    /// Serialize to the JSON wire object.
    pub fn to_json(&self) -> String {
        let Ok(json) = serde_json::to_string(self) else {
            unreachable!("packet contains only strings and integers");
        };
        json
    }

    /// Plaintext length (ciphertext length minus authentication tag), if the
    /// ciphertext field decodes.
    pub fn plaintext_len(&self) -> Option<usize> {
        let ciphertext = URL_SAFE_NO_PAD.decode(&self.c).ok()?;
        Some(ciphertext.len().saturating_sub(POLY1305_TAG_SIZE))
    }
}

/// Encrypt `message` under `session_keys.tx` with a fresh random nonce.
pub fn encrypt(message: &[u8], session_keys: &SessionKeys, entropy: &impl Entropy) -> CipherPacket {
    seal(message, &session_keys.tx, entropy.random_array())
}

/// Decrypt `packet` under `session_keys.rx`.
///
/// # Errors
///
/// - `Decryption` for any failure: undecodable fields, wrong nonce length,
///   truncated ciphertext, wrong key, or tampering.
pub fn decrypt(packet: &CipherPacket, session_keys: &SessionKeys) -> Result<Vec<u8>, CryptoError> {
    open(packet, &session_keys.rx)
}

/// Encrypt with an explicit key and nonce. The nonce must never repeat under
/// the same key.
pub(crate) fn seal(message: &[u8], key: &SecretKey, nonce: [u8; NONCE_SIZE]) -> CipherPacket {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    let nonce_ref = Nonce::<XSalsa20Poly1305>::from_slice(&nonce);

    let Ok(ciphertext) = cipher.encrypt(nonce_ref, message) else {
        unreachable!("XSalsa20-Poly1305 encryption cannot fail with valid inputs");
    };

    CipherPacket {
        c: URL_SAFE_NO_PAD.encode(ciphertext),
        n: URL_SAFE_NO_PAD.encode(nonce),
        message_number: None,
        previous_chain_length: None,
    }
}

/// Decrypt with an explicit key.
pub(crate) fn open(packet: &CipherPacket, key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
    let nonce = URL_SAFE_NO_PAD.decode(&packet.n).map_err(|_| CryptoError::Decryption)?;
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::Decryption);
    }

    let ciphertext = URL_SAFE_NO_PAD.decode(&packet.c).map_err(|_| CryptoError::Decryption)?;
    if ciphertext.len() < POLY1305_TAG_SIZE {
        return Err(CryptoError::Decryption);
    }

    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::<XSalsa20Poly1305>::from_slice(&nonce);

    cipher.decrypt(nonce, ciphertext.as_slice()).map_err(|_| {
        tracing::warn!(ciphertext_len = ciphertext.len(), "packet failed authentication");
        CryptoError::Decryption
    })
}
