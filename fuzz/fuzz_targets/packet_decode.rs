//! Fuzz target for CipherPacket parsing and decryption
//!
//! Feeds arbitrary bytes through the JSON wire form and both decryption
//! paths:
//! - Malformed JSON and wrong field types
//! - Invalid base64, wrong nonce lengths, truncated ciphertext
//! - Arbitrary message numbers against a live ratchet
//!
//! The fuzzer should NEVER panic, and a rejected packet must leave the
//! ratchet untouched.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pairlock_crypto::{
    decrypt, decrypt_with_pfs, CipherPacket, RatchetConfig, RatchetState, SecretKey, SessionKeys,
};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(packet) = CipherPacket::from_json(json) else {
        return;
    };

    let session = SessionKeys {
        tx: SecretKey::from_bytes([1; 32]),
        rx: SecretKey::from_bytes([2; 32]),
    };
    let _ = decrypt(&packet, &session);

    let config = RatchetConfig::default();
    let mut state = RatchetState::initialize_responder(&SecretKey::from_bytes([3; 32]));
    let chain = *state.receiving_chain_key().as_bytes();

    // Forged packets cannot authenticate, so nothing may change
    assert!(decrypt_with_pfs(&packet, &mut state, &config).is_err());
    assert!(state.is_fresh());
    assert_eq!(state.skipped_key_count(), 0);
    assert_eq!(state.receiving_chain_key().as_bytes(), &chain);
});
