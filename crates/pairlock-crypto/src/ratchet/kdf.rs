//! Key derivation for the ratchet.
//!
//! Two primitives, both libsodium-compatible:
//!
//! - [`derive_subkey`]: `crypto_kdf_derive_from_key`. Keyed BLAKE2b-256 with the
//!   subkey index as salt and an 8-byte context as personalization.
//! - [`derive_message_keys`]: the chain step. `crypto_auth` (HMAC-SHA-512
//!   truncated to 32 bytes) keyed by the chain key over two fixed constants.

use blake2::{Blake2bMac, digest::consts::U32};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::keys::SecretKey;

type HmacSha512 = Hmac<Sha512>;

/// KDF context for every ratchet derivation
const KDF_CONTEXT: &[u8; 8] = b"PairRtch";

/// MAC input for deriving a message key
const MESSAGE_CONSTANT: &[u8] = &[0x01];

/// MAC input for deriving the next chain key
const CHAIN_CONSTANT: &[u8] = &[0x02];

/// Subkey index of the root key
pub(crate) const ROOT_KEY_INDEX: u64 = 1;

/// Subkey index of the initiator's sending chain
pub(crate) const SENDING_CHAIN_INDEX: u64 = 2;

/// Subkey index of the initiator's receiving chain
pub(crate) const RECEIVING_CHAIN_INDEX: u64 = 3;

/// Output of one chain step.
///
/// Both keys zeroize on drop. The caller decides whether to commit
/// `next_chain_key`.
pub struct MessageKeys {
    /// One-time key for a single message
    pub message_key: SecretKey,
    /// Replacement chain key
    pub next_chain_key: SecretKey,
}

/// Derive a 32-byte subkey from `key` at `index`.
///
/// Deterministic; distinct indices yield independent subkeys.
pub(crate) fn derive_subkey(key: &SecretKey, index: u64) -> SecretKey {
    let salt = index.to_le_bytes();
    let Ok(mac) = Blake2bMac::<U32>::new_with_salt_and_personal(key.as_bytes(), &salt, KDF_CONTEXT)
    else {
        unreachable!("32-byte key, 8-byte salt and 8-byte context are within BLAKE2b limits");
    };

    let mut output = mac.finalize().into_bytes();
    let subkey = SecretKey::from_prefix(&output);
    output.as_mut_slice().zeroize();
    subkey
}

/// One-way step of the symmetric ratchet.
///
/// `message_key = MAC(chain_key, 0x01)`, `next_chain_key = MAC(chain_key,
/// 0x02)`. Pure: the input chain key is left untouched.
pub fn derive_message_keys(chain_key: &SecretKey) -> MessageKeys {
    MessageKeys {
        message_key: keyed_mac(chain_key, MESSAGE_CONSTANT),
        next_chain_key: keyed_mac(chain_key, CHAIN_CONSTANT),
    }
}

fn keyed_mac(chain_key: &SecretKey, input: &[u8]) -> SecretKey {
    let Ok(mut mac) = HmacSha512::new_from_slice(chain_key.as_bytes()) else {
        unreachable!("HMAC-SHA512 accepts any key size");
    };
    mac.update(input);
    let mut output = mac.finalize().into_bytes();

    // crypto_auth: HMAC-SHA-512 truncated to 32 bytes
    let key = SecretKey::from_prefix(&output);
    output.as_mut_slice().zeroize();
    key
}
