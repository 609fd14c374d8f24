//! Fuzz target for ratchet operation sequences
//!
//! Drives a sender and its mirror receiver through arbitrary interleavings
//! of sends, deliveries in any order, drops, replays, tampering and
//! eviction.
//!
//! # Invariants
//!
//! - Every delivered authentic packet decrypts to its plaintext, unless its
//!   key was consumed, evicted, or lies beyond `max_skip`
//! - A failed delivery leaves the receiver unchanged
//! - Replays are always rejected
//! - The sender's counter equals the number of successful sends

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pairlock_crypto::{
    decrypt_with_pfs, encrypt_with_pfs, CipherPacket, CryptoError, Entropy, RatchetConfig,
    RatchetState, SecretKey,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    session_key: [u8; 32],
    rotation_interval: u8,
    max_skipped_age: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Send { message: Vec<u8> },
    Deliver { index: u16 },
    Tamper { index: u16, byte: u8 },
    Cleanup,
}

struct FuzzEntropy(u8);

impl Entropy for FuzzEntropy {
    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(self.0);
    }
}

struct Sent {
    message: Vec<u8>,
    packet: CipherPacket,
    delivered: bool,
}

fuzz_target!(|scenario: Scenario| {
    let config = RatchetConfig {
        rotation_interval: u32::from(scenario.rotation_interval),
        max_skipped_age: u32::from(scenario.max_skipped_age),
        max_skip: 256,
    };
    let key = SecretKey::from_bytes(scenario.session_key);
    let mut sender = RatchetState::initialize(&key);
    let mut receiver = RatchetState::initialize_responder(&key);
    let mut sent: Vec<Sent> = Vec::new();

    for operation in scenario.operations.into_iter().take(512) {
        match operation {
            Operation::Send { message } => {
                let entropy = FuzzEntropy(sent.len() as u8);
                let packet = encrypt_with_pfs(&message, &mut sender, &config, &entropy)
                    .unwrap_or_else(|_| unreachable!());
                sent.push(Sent { message, packet, delivered: false });
            },
            Operation::Deliver { index } => {
                if sent.is_empty() {
                    continue;
                }
                let entry = &mut sent[usize::from(index) % sent.len()];
                let before = receiver.receive_message_number();

                match decrypt_with_pfs(&entry.packet, &mut receiver, &config) {
                    Ok(plaintext) => {
                        assert!(!entry.delivered, "replay accepted");
                        assert_eq!(plaintext, entry.message);
                        entry.delivered = true;
                    },
                    Err(CryptoError::SkippedKeyNotFound { .. })
                    | Err(CryptoError::TooManySkipped { .. }) => {
                        assert_eq!(receiver.receive_message_number(), before);
                    },
                    Err(error) => panic!("unexpected error for authentic packet: {error}"),
                }
            },
            Operation::Tamper { index, byte } => {
                if sent.is_empty() {
                    continue;
                }
                let original = &sent[usize::from(index) % sent.len()].packet;
                let mut forged = original.clone();
                let mut raw: Vec<u8> = forged.c.bytes().collect();
                let position = usize::from(byte) % raw.len();
                raw[position] = if raw[position] == b'A' { b'B' } else { b'A' };
                forged.c = String::from_utf8(raw).unwrap_or_else(|_| unreachable!());

                let before = (
                    receiver.receive_message_number(),
                    receiver.skipped_key_count(),
                    *receiver.receiving_chain_key().as_bytes(),
                );
                assert!(decrypt_with_pfs(&forged, &mut receiver, &config).is_err());
                let after = (
                    receiver.receive_message_number(),
                    receiver.skipped_key_count(),
                    *receiver.receiving_chain_key().as_bytes(),
                );
                assert_eq!(before, after);
            },
            Operation::Cleanup => {
                receiver.cleanup_old_keys(config.max_skipped_age);
            },
        }
    }

    assert_eq!(sender.send_message_number() as usize, sent.len());
});
