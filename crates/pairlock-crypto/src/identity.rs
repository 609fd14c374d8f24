//! Identity and pre-key generation and signing.
//!
//! Identities and pre-keys are both plain X25519 key pairs produced by the same
//! function. Pre-keys are signed with an Ed25519 key whose seed is the
//! identity's X25519 private key; that shortcut lives entirely in
//! [`signing_key_from_identity`] so a dedicated Ed25519 identity can replace
//! it without touching the rest of the protocol.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::{
    env::Entropy,
    error::CryptoError,
    keys::{
        IdentityKeyPair, KEY_SIZE, PublicKey, SIGNATURE_SIZE, SecretKey, SignedPreKey,
        SignedPreKeyBundle,
    },
};

/// Generate a fresh X25519 identity key pair.
///
/// The private key is 32 raw random bytes; clamping happens inside the scalar
/// multiplication, matching libsodium's `crypto_box_keypair`.
pub fn create_identity(entropy: &impl Entropy) -> IdentityKeyPair {
    let secret_bytes = Zeroizing::new(entropy.random_array::<KEY_SIZE>());
    let secret = StaticSecret::from(*secret_bytes);
    let public = x25519_dalek::PublicKey::from(&secret);

    IdentityKeyPair::from_parts(
        PublicKey::from_bytes(public.to_bytes()),
        SecretKey::from_bytes(*secret_bytes),
    )
}

/// Generate a pre-key. Same primitive as [`create_identity`].
pub fn create_pre_key(entropy: &impl Entropy) -> IdentityKeyPair {
    create_identity(entropy)
}

/// Ed25519 signing key seeded with the first 32 bytes of the identity's
/// X25519 private key.
///
/// Reusing X25519 key bytes as an Ed25519 seed is non-standard. It is kept for
/// compatibility with already-published bundles.
pub fn signing_key_from_identity(identity: &IdentityKeyPair) -> SigningKey {
    let mut seed = Zeroizing::new([0u8; KEY_SIZE]);
    seed.copy_from_slice(&identity.private_key().as_bytes()[..KEY_SIZE]);
    SigningKey::from_bytes(&seed)
}

/// Ed25519 verifying key peers use to check this identity's pre-key
/// signatures.
pub fn identity_verifying_key(identity: &IdentityKeyPair) -> VerifyingKey {
    signing_key_from_identity(identity).verifying_key()
}

/// Detached Ed25519 signature over the pre-key's public key bytes.
pub fn sign_pre_key(pre_key: &IdentityKeyPair, identity: &IdentityKeyPair) -> Signature {
    signing_key_from_identity(identity).sign(pre_key.public_key().as_bytes())
}

/// Check a bundle's pre-key signature against the owner's verifying key.
///
/// # Errors
///
/// - `KeyFormat` if the pre-key or signature cannot be decoded
/// - `InvalidSignature` if the signature does not verify
pub fn verify_pre_key(
    bundle: &SignedPreKeyBundle,
    verifying_key: &VerifyingKey,
) -> Result<(), CryptoError> {
    let pre_key = bundle.pre_key_public_key()?;
    let signature = decode_signature(&bundle.signed_pre_key.signature)?;

    verifying_key
        .verify(pre_key.as_bytes(), &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Assemble the publishable bundle for an identity and its signed pre-key.
pub fn build_bundle(
    identity: &IdentityKeyPair,
    pre_key: &IdentityKeyPair,
    key_id: Option<u32>,
) -> SignedPreKeyBundle {
    let signature = sign_pre_key(pre_key, identity);

    SignedPreKeyBundle {
        identity_key: identity.public_key().to_base64(),
        signed_pre_key: SignedPreKey {
            key_id,
            key: pre_key.public_key().to_base64(),
            signature: STANDARD.encode(signature.to_bytes()),
        },
    }
}

/// Signatures use the same base64 variants as keys but are 64 bytes long.
fn decode_signature(encoded: &str) -> Result<Signature, CryptoError> {
    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| STANDARD.decode(encoded))
        .map_err(|_| CryptoError::key_format("signature is not valid base64"))?;

    let bytes: [u8; SIGNATURE_SIZE] = raw.as_slice().try_into().map_err(|_| {
        CryptoError::key_format(format!("expected {SIGNATURE_SIZE}-byte signature, got {}", raw.len()))
    })?;

    Ok(Signature::from_bytes(&bytes))
}
