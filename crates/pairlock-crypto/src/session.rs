//! Session establishment.
//!
//! Two parties derive a pair of directional keys from their X25519 identities
//! without a handshake round-trip, using libsodium's `crypto_kx`
//! construction. Roles are resolved by comparing public keys so neither side
//! has to be told which one it is.

use std::cmp::Ordering;

use blake2::{Blake2b512, Digest};
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    keys::{IdentityKeyPair, KEY_SIZE, PublicKey, SecretKey, SessionKeys, SignedPreKeyBundle},
};

/// Decide whether we act as the client for this pair of keys.
///
/// The party whose key holds the smaller byte at the first differing index
/// is the client. Identical keys default to client. Both parties reach
/// complementary answers for distinct keys, whichever order they pass them.
pub fn determine_role(our_public_key: &PublicKey, their_public_key: &PublicKey) -> bool {
    let first_difference = our_public_key
        .as_bytes()
        .iter()
        .zip(their_public_key.as_bytes())
        .map(|(ours, theirs)| ours.cmp(theirs))
        .find(|ordering| *ordering != Ordering::Equal);

    !matches!(first_difference, Some(Ordering::Greater))
}

/// Derive directional session keys with the peer published in `their_bundle`.
///
/// `q = X25519(our_sk, their_pk)`, `h = BLAKE2b-512(q || client_pk ||
/// server_pk)`. The client receives on `h[0..32]` and transmits on
/// `h[32..64]`; the server takes the opposite halves, so each side's `tx`
/// equals the other's `rx`.
///
/// # Errors
///
/// - `SessionEstablishment` if the peer's identity key cannot be decoded or
///   is not 32 bytes, or if the exchange yields an all-zero shared secret
///   (low-order peer key).
pub fn build_session(
    our_key_pair: &IdentityKeyPair,
    their_bundle: &SignedPreKeyBundle,
    is_client: bool,
) -> Result<SessionKeys, CryptoError> {
    let their_public_key = their_bundle
        .identity_public_key()
        .map_err(|e| CryptoError::session(format!("peer identity key: {e}")))?;

    let secret = StaticSecret::from(*our_key_pair.private_key().as_bytes());
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(*their_public_key.as_bytes()));
    if !shared.was_contributory() {
        return Err(CryptoError::session("key exchange produced a non-contributory shared secret"));
    }

    let (client_public_key, server_public_key) = if is_client {
        (our_key_pair.public_key(), &their_public_key)
    } else {
        (&their_public_key, our_key_pair.public_key())
    };

    let mut digest = Blake2b512::new()
        .chain_update(shared.as_bytes())
        .chain_update(client_public_key.as_bytes())
        .chain_update(server_public_key.as_bytes())
        .finalize();

    let (first, second) = digest.split_at(KEY_SIZE);
    let (rx, tx) = if is_client { (first, second) } else { (second, first) };
    let session_keys =
        SessionKeys { tx: SecretKey::from_prefix(tx), rx: SecretKey::from_prefix(rx) };

    digest.as_mut_slice().zeroize();
    Ok(session_keys)
}

/// Resolve our role against the bundle's owner and build the session.
///
/// # Errors
///
/// - `SessionEstablishment` for any failure, as in [`build_session`]
pub fn establish(
    our_key_pair: &IdentityKeyPair,
    their_bundle: &SignedPreKeyBundle,
) -> Result<SessionKeys, CryptoError> {
    let their_public_key = their_bundle
        .identity_public_key()
        .map_err(|e| CryptoError::session(format!("peer identity key: {e}")))?;

    let is_client = determine_role(our_key_pair.public_key(), &their_public_key);
    tracing::debug!(
        is_client,
        peer = %their_public_key.fingerprint(),
        "establishing session"
    );

    build_session(our_key_pair, their_bundle, is_client)
}
