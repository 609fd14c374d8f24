//! Property-based tests for the forward-secrecy ratchet
//!
//! These tests verify the ratchet invariants:
//!
//! 1. **Monotonicity**: n encryptions leave `send_message_number == n` and use
//!    n distinct message keys
//! 2. **In-order delivery**: every message decrypts and both counters agree
//! 3. **Arbitrary reordering**: any permutation within `max_skip` decrypts
//! 4. **Rotation**: long conversations stay in sync across root rotations
//! 5. **Atomicity**: a rejected packet never changes the receiver

use std::{cell::RefCell, collections::HashSet};

use pairlock_crypto::{
    CryptoError, Entropy, RatchetConfig, RatchetState, SecretKey, decrypt_with_pfs,
    derive_message_keys, encrypt_with_pfs,
};
use proptest::prelude::*;
use rand::{RngCore, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha20Rng;

struct SeededEntropy(RefCell<ChaCha20Rng>);

impl SeededEntropy {
    fn new(seed: u64) -> Self {
        Self(RefCell::new(ChaCha20Rng::seed_from_u64(seed)))
    }
}

impl Entropy for SeededEntropy {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.0.borrow_mut().fill_bytes(buffer);
    }
}

fn mirrored(session_key: [u8; 32]) -> (RatchetState, RatchetState) {
    let key = SecretKey::from_bytes(session_key);
    (RatchetState::initialize(&key), RatchetState::initialize_responder(&key))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_monotonic_unique_keys(
        session_key in any::<[u8; 32]>(),
        count in 1usize..150,
        interval in 0u32..40,
    ) {
        let config = RatchetConfig { rotation_interval: interval, ..RatchetConfig::default() };
        let entropy = SeededEntropy::new(0);
        let (mut sender, _) = mirrored(session_key);
        let mut seen = HashSet::new();

        for _ in 0..count {
            let key = *derive_message_keys(sender.sending_chain_key()).message_key.as_bytes();
            prop_assert!(seen.insert(key), "message key reused");
            encrypt_with_pfs(b"m", &mut sender, &config, &entropy).unwrap();
        }

        prop_assert_eq!(sender.send_message_number() as usize, count);
    }

    #[test]
    fn prop_in_order_roundtrip(
        session_key in any::<[u8; 32]>(),
        messages in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..40),
        seed in any::<u64>(),
    ) {
        let config = RatchetConfig { rotation_interval: 7, ..RatchetConfig::default() };
        let entropy = SeededEntropy::new(seed);
        let (mut sender, mut receiver) = mirrored(session_key);

        for message in &messages {
            let packet = encrypt_with_pfs(message, &mut sender, &config, &entropy).unwrap();
            prop_assert_eq!(&decrypt_with_pfs(&packet, &mut receiver, &config).unwrap(), message);
        }

        prop_assert_eq!(receiver.receive_message_number(), sender.send_message_number());
        prop_assert_eq!(receiver.skipped_key_count(), 0);
    }

    #[test]
    fn prop_shuffled_delivery(
        session_key in any::<[u8; 32]>(),
        count in 1usize..60,
        interval in 0u32..16,
        seed in any::<u64>(),
    ) {
        let config = RatchetConfig { rotation_interval: interval, ..RatchetConfig::default() };
        let entropy = SeededEntropy::new(seed);
        let (mut sender, mut receiver) = mirrored(session_key);

        let mut packets: Vec<_> = (0..count)
            .map(|i| {
                let message = (i as u32).to_le_bytes();
                (message, encrypt_with_pfs(&message, &mut sender, &config, &entropy).unwrap())
            })
            .collect();
        packets.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));

        for (message, packet) in &packets {
            prop_assert_eq!(decrypt_with_pfs(packet, &mut receiver, &config).unwrap(), message.to_vec());
        }

        prop_assert_eq!(receiver.receive_message_number() as usize, count);
        prop_assert_eq!(receiver.skipped_key_count(), 0);
    }

    #[test]
    fn prop_rejected_packet_is_atomic(
        session_key in any::<[u8; 32]>(),
        delivered in 0usize..10,
        flip in any::<usize>(),
    ) {
        let config = RatchetConfig::default();
        let entropy = SeededEntropy::new(1);
        let (mut sender, mut receiver) = mirrored(session_key);

        let packets: Vec<_> = (0..12)
            .map(|_| encrypt_with_pfs(b"payload", &mut sender, &config, &entropy).unwrap())
            .collect();
        for packet in &packets[..delivered] {
            decrypt_with_pfs(packet, &mut receiver, &config).unwrap();
        }

        let target = &packets[delivered + 1];
        let mut forged = target.clone();
        let mut chars: Vec<char> = forged.c.chars().collect();
        let index = flip % chars.len();
        chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
        forged.c = chars.into_iter().collect();

        let before = (
            receiver.receive_message_number(),
            receiver.skipped_key_count(),
            *receiver.receiving_chain_key().as_bytes(),
        );
        prop_assert!(decrypt_with_pfs(&forged, &mut receiver, &config).is_err());
        let after = (
            receiver.receive_message_number(),
            receiver.skipped_key_count(),
            *receiver.receiving_chain_key().as_bytes(),
        );
        prop_assert_eq!(before, after);

        prop_assert!(decrypt_with_pfs(target, &mut receiver, &config).is_ok());
    }
}

#[test]
fn long_conversation_crosses_rotations() {
    let config = RatchetConfig::default();
    let entropy = SeededEntropy::new(42);
    let (mut sender, mut receiver) = mirrored([0x11; 32]);

    for i in 0..250u32 {
        let message = format!("message {i}");
        let packet = encrypt_with_pfs(message.as_bytes(), &mut sender, &config, &entropy).unwrap();
        assert_eq!(decrypt_with_pfs(&packet, &mut receiver, &config).unwrap(), message.as_bytes());
    }

    assert_eq!(sender.send_message_number(), 250);
    assert_eq!(sender.previous_sending_chain_length(), 200);
    assert_eq!(receiver.receive_message_number(), 250);
}

#[test]
fn jump_beyond_max_skip_is_rejected() {
    let config = RatchetConfig { max_skip: 10, ..RatchetConfig::default() };
    let entropy = SeededEntropy::new(7);
    let (mut sender, mut receiver) = mirrored([0x22; 32]);

    let packets: Vec<_> = (0..12)
        .map(|_| encrypt_with_pfs(b"x", &mut sender, &config, &entropy).unwrap())
        .collect();

    assert_eq!(
        decrypt_with_pfs(&packets[11], &mut receiver, &config),
        Err(CryptoError::TooManySkipped { current: 0, requested: 11 })
    );
    assert!(receiver.is_fresh());

    // Exactly max_skip ahead is still accepted
    assert_eq!(decrypt_with_pfs(&packets[10], &mut receiver, &config).unwrap(), b"x");
    assert_eq!(receiver.skipped_key_count(), 10);
}

#[test]
fn eviction_window() {
    let config = RatchetConfig::default();
    let entropy = SeededEntropy::new(3);
    let (mut sender, mut receiver) = mirrored([0x33; 32]);

    let packets: Vec<_> = (0..200)
        .map(|_| encrypt_with_pfs(b"x", &mut sender, &config, &entropy).unwrap())
        .collect();
    decrypt_with_pfs(&packets[199], &mut receiver, &config).unwrap();
    assert_eq!(receiver.receive_message_number(), 200);

    receiver.cleanup_old_keys(config.max_skipped_age);

    assert!(!receiver.has_skipped_key(100));
    assert!(receiver.has_skipped_key(160));
    assert!(matches!(
        decrypt_with_pfs(&packets[100], &mut receiver, &config),
        Err(CryptoError::SkippedKeyNotFound { message_number: 100 })
    ));
    assert_eq!(decrypt_with_pfs(&packets[160], &mut receiver, &config).unwrap(), b"x");
}
