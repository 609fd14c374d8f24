//! Key material value types.
//!
//! Secret types zeroize on drop and redact themselves in `Debug` output.
//! Wire types (bundles) keep their keys in encoded string form exactly as the
//! directory service publishes them; decoding happens at the point of use.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{encoding::decode_key, error::CryptoError};

/// Size of every symmetric and X25519 key (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Size of a detached Ed25519 signature (64 bytes)
pub const SIGNATURE_SIZE: usize = 64;

/// Bytes of the hashed public key shown in fingerprints
const FINGERPRINT_SIZE: usize = 4;

/// A 32-byte secret that is overwritten with zeros when dropped.
#[derive(Clone)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy the first 32 bytes of `bytes` straight into a new key, without
    /// an intermediate array.
    ///
    /// Callers pass at least [`KEY_SIZE`] bytes.
    pub(crate) fn from_prefix(bytes: &[u8]) -> Self {
        let mut key = Self([0u8; KEY_SIZE]);
        key.0.copy_from_slice(&bytes[..KEY_SIZE]);
        key
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// True once the key has been zeroized.
    pub fn is_zeroized(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// A 32-byte X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Decode a public key from hex, URL-safe base64 or standard base64.
    pub fn from_encoded(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = decode_key(encoded)?;
        Ok(Self(*decoded.bytes()))
    }

    /// Standard base64 form, as published in key bundles.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Short hex label for logs: the first 4 bytes of the key's BLAKE2b-512
    /// hash. Identifies a key without revealing it.
    pub fn fingerprint(&self) -> String {
        let digest = Blake2b512::digest(self.0);
        hex::encode(&digest[..FINGERPRINT_SIZE])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

/// An X25519 key pair. Used for both identities and pre-keys.
///
/// Immutable after creation.
#[derive(Clone)]
pub struct IdentityKeyPair {
    public_key: PublicKey,
    private_key: SecretKey,
}

impl IdentityKeyPair {
    /// Assemble a key pair from its halves.
    ///
    /// The caller is responsible for the halves belonging together; use
    /// [`crate::create_identity`] to generate a fresh pair.
    pub fn from_parts(public_key: PublicKey, private_key: SecretKey) -> Self {
        Self { public_key, private_key }
    }

    /// Decode a stored key pair, accepting the legacy hex and the base64
    /// encodings for either half.
    pub fn from_encoded(public_key: &str, private_key: &str) -> Result<Self, CryptoError> {
        let public_key = PublicKey::from_encoded(public_key)?;
        let private_key = SecretKey::from_bytes(*decode_key(private_key)?.bytes());
        Ok(Self { public_key, private_key })
    }

    /// Public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Private half.
    pub fn private_key(&self) -> &SecretKey {
        &self.private_key
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .finish()
    }
}

/// Signed pre-key entry of a key bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPreKey {
    /// Optional directory identifier of the pre-key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<u32>,
    /// Encoded X25519 pre-key public key
    pub key: String,
    /// Encoded 64-byte Ed25519 signature over the pre-key bytes
    pub signature: String,
}

/// Published key bundle of one identity.
///
/// Created once per identity, never mutated. Fields stay in the encoding the
/// directory returned; see [`crate::decode_key`] for the accepted forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPreKeyBundle {
    /// Encoded X25519 identity public key
    pub identity_key: String,
    /// Signed pre-key
    pub signed_pre_key: SignedPreKey,
}

impl SignedPreKeyBundle {
    /// Decoded identity public key.
    pub fn identity_public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_encoded(&self.identity_key)
    }

    /// Decoded pre-key public key.
    pub fn pre_key_public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_encoded(&self.signed_pre_key.key)
    }

    /// Parse a bundle from the directory's JSON form.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::key_format(e.to_string()))
    }

    /// Serialize to the directory's JSON form.
    pub fn to_json(&self) -> String {
        let Ok(json) = serde_json::to_string(self) else {
            unreachable!("bundle contains only strings and integers");
        };
        json
    }
}

/// Directional symmetric keys for one conversation.
///
/// For honest parties A and B: `A.tx == B.rx` and `A.rx == B.tx`. Both keys
/// zeroize on drop, which is session teardown.
#[derive(Clone)]
pub struct SessionKeys {
    /// Key for messages we send
    pub tx: SecretKey,
    /// Key for messages we receive
    pub rx: SecretKey,
}

impl Zeroize for SessionKeys {
    fn zeroize(&mut self) {
        self.tx.zeroize();
        self.rx.zeroize();
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys([REDACTED])")
    }
}
