//! Pairlock Cryptographic Session Layer
//!
//! End-to-end encryption between two parties using libsodium-compatible
//! primitives. Pure, synchronous functions: callers provide randomness through
//! [`Entropy`] and own every piece of mutable state.
//!
//! # Key Lifecycle
//!
//! Each account holds a long-lived X25519 identity. Two parties derive a pair
//! of directional session keys from their identities without a handshake
//! round-trip, and each directional key seeds a symmetric ratchet that
//! produces one-time message keys.
//!
//! ```text
//! Identity Key Pair (per account)
//!        │
//!        ▼
//! crypto_kx → Session Keys (tx / rx, per conversation)
//!        │
//!        ▼
//! crypto_kdf → Root Key + Sending Chain + Receiving Chain
//!        │
//!        ▼
//! HMAC Chain Step → Message Keys
//!        │
//!        ▼
//! XSalsa20-Poly1305 → CipherPacket
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are zeroized as soon as the next chain key is derived
//! - Message keys are zeroized immediately after a single use
//! - Skipped keys are evicted by [`RatchetState::cleanup_old_keys`]
//!
//! Post-Compromise Resilience:
//! - The root key is re-derived every `rotation_interval` messages, bounding
//!   the exposure of a compromised root to one interval
//!
//! Authenticity:
//! - XSalsa20-Poly1305 rejects tampered or truncated ciphertext
//! - Decryption failures are reported without detail (no oracle)
//!
//! Key material never appears in `Debug` output, error messages, or logs.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod conversation;
pub mod encoding;
pub mod env;
pub mod error;
pub mod identity;
pub mod keys;
pub mod packet;
pub mod ratchet;
pub mod session;

pub use conversation::Conversation;
pub use encoding::{DecodedKey, KeyEncoding, decode_key};
pub use env::{Entropy, SystemEntropy};
pub use error::CryptoError;
pub use identity::{
    build_bundle, create_identity, create_pre_key, identity_verifying_key, sign_pre_key,
    signing_key_from_identity, verify_pre_key,
};
pub use keys::{
    IdentityKeyPair, KEY_SIZE, PublicKey, SIGNATURE_SIZE, SecretKey, SessionKeys, SignedPreKey,
    SignedPreKeyBundle,
};
pub use packet::{CipherPacket, NONCE_SIZE, decrypt, encrypt};
pub use ratchet::{
    ChainOrientation, DEFAULT_MAX_SKIP, DEFAULT_MAX_SKIPPED_AGE, DEFAULT_ROTATION_INTERVAL,
    MAX_SKIP_CEILING, MessageKeys, RatchetConfig, RatchetState, decrypt_with_pfs,
    derive_message_keys, encrypt_with_pfs,
};
pub use session::{build_session, determine_role, establish};
