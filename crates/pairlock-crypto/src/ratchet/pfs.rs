//! Ratchet-driven encryption.
//!
//! Each message is sealed under its own one-time key from the sending chain.
//! The packet carries the message number so the receiver can locate the key
//! even when packets arrive late or out of order.

use super::{
    RatchetConfig,
    kdf::{MessageKeys, derive_message_keys},
    state::RatchetState,
};
use crate::{
    env::Entropy,
    error::CryptoError,
    packet::{CipherPacket, open, seal},
};

/// Encrypt `message` with the next key of the sending chain.
///
/// The packet is tagged with the pre-advance `send_message_number` and the
/// current `previous_sending_chain_length`. The chain then advances, the
/// message key is zeroized, and the root rotates if the new message number
/// reaches a rotation point.
///
/// The state is spent once this returns: persist it before transmitting, and
/// never retry with a stale copy.
///
/// # Errors
///
/// - `MessageNumberOverflow` if the sending chain is exhausted. The state is
///   unchanged.
pub fn encrypt_with_pfs(
    message: &[u8],
    state: &mut RatchetState,
    config: &RatchetConfig,
    entropy: &impl Entropy,
) -> Result<CipherPacket, CryptoError> {
    state.check_send_capacity()?;

    let MessageKeys { message_key, next_chain_key } =
        derive_message_keys(state.sending_chain_key());

    let mut packet = seal(message, &message_key, entropy.random_array());
    packet.message_number = Some(state.send_message_number());
    packet.previous_chain_length = Some(state.previous_sending_chain_length());
    drop(message_key);

    state.commit_send(next_chain_key);
    state.rotate_keys(config.rotation_interval);

    Ok(packet)
}

/// Decrypt a ratchet packet.
///
/// Late packets (below `receive_message_number`) consume their cached
/// skipped key. Packets at or ahead of it walk the receiving chain forward,
/// caching every intermediate key, and use the key at the packet's number.
///
/// All-or-nothing: if any step fails, including authentication, the state is
/// exactly as it was before the call and a legitimate packet with the same
/// number can still be decrypted later.
///
/// # Errors
///
/// - `MissingMessageNumber` if the packet carries no message number
/// - `SkippedKeyNotFound` if a late packet's key was never cached, was
///   evicted, or was already consumed
/// - `TooManySkipped` if the packet is more than `max_skip` ahead
/// - `Decryption` if the packet fails authentication
pub fn decrypt_with_pfs(
    packet: &CipherPacket,
    state: &mut RatchetState,
    config: &RatchetConfig,
) -> Result<Vec<u8>, CryptoError> {
    let message_number = packet.message_number.ok_or(CryptoError::MissingMessageNumber)?;

    let plan = state.plan_receive(message_number, config.rotation_interval, config.max_skip)?;
    let plaintext = open(packet, plan.message_key())?;

    state.commit_receive(plan);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KEY_SIZE, SecretKey};

    struct FixedEntropy(u8);

    impl Entropy for FixedEntropy {
        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(self.0);
        }
    }

    fn pair(session_key: [u8; KEY_SIZE]) -> (RatchetState, RatchetState) {
        let key = SecretKey::from_bytes(session_key);
        (RatchetState::initialize(&key), RatchetState::initialize_responder(&key))
    }

    #[test]
    fn zero_key_ping() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([0u8; KEY_SIZE]);

        let packet = encrypt_with_pfs(b"ping", &mut sender, &config, &FixedEntropy(9)).unwrap();
        assert_eq!(packet.message_number, Some(0));
        assert_eq!(packet.previous_chain_length, Some(0));
        assert_eq!(sender.send_message_number(), 1);

        let plaintext = decrypt_with_pfs(&packet, &mut receiver, &config).unwrap();
        assert_eq!(plaintext, b"ping");
        assert_eq!(receiver.receive_message_number(), 1);
    }

    #[test]
    fn out_of_order_delivery() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([7u8; KEY_SIZE]);
        let entropy = FixedEntropy(1);

        let messages: [&[u8]; 3] = [b"zero", b"one", b"two"];
        let packets: Vec<_> = messages
            .iter()
            .map(|m| encrypt_with_pfs(m, &mut sender, &config, &entropy).unwrap())
            .collect();

        assert_eq!(decrypt_with_pfs(&packets[2], &mut receiver, &config).unwrap(), b"two");
        assert_eq!(receiver.skipped_key_count(), 2);

        assert_eq!(decrypt_with_pfs(&packets[0], &mut receiver, &config).unwrap(), b"zero");
        assert_eq!(decrypt_with_pfs(&packets[1], &mut receiver, &config).unwrap(), b"one");
        assert_eq!(receiver.skipped_key_count(), 0);
        assert_eq!(receiver.receive_message_number(), 3);
    }

    #[test]
    fn replayed_packet_is_rejected() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([3u8; KEY_SIZE]);

        let packet = encrypt_with_pfs(b"once", &mut sender, &config, &FixedEntropy(0)).unwrap();
        decrypt_with_pfs(&packet, &mut receiver, &config).unwrap();

        assert_eq!(
            decrypt_with_pfs(&packet, &mut receiver, &config),
            Err(CryptoError::SkippedKeyNotFound { message_number: 0 })
        );
    }

    #[test]
    fn tampered_packet_leaves_state_unchanged() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([5u8; KEY_SIZE]);
        let entropy = FixedEntropy(2);

        let first = encrypt_with_pfs(b"first", &mut sender, &config, &entropy).unwrap();
        let second = encrypt_with_pfs(b"second", &mut sender, &config, &entropy).unwrap();

        // Forged packet claiming the second slot
        let mut forged = second.clone();
        forged.c = first.c.clone();
        forged.n = first.n.clone();

        let chain = *receiver.receiving_chain_key().as_bytes();
        assert_eq!(decrypt_with_pfs(&forged, &mut receiver, &config), Err(CryptoError::Decryption));
        assert!(receiver.is_fresh());
        assert_eq!(receiver.skipped_key_count(), 0);
        assert_eq!(receiver.receiving_chain_key().as_bytes(), &chain);

        assert_eq!(decrypt_with_pfs(&second, &mut receiver, &config).unwrap(), b"second");
        assert_eq!(decrypt_with_pfs(&first, &mut receiver, &config).unwrap(), b"first");
    }

    #[test]
    fn tampered_late_packet_keeps_skipped_key() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([6u8; KEY_SIZE]);
        let entropy = FixedEntropy(3);

        let first = encrypt_with_pfs(b"first", &mut sender, &config, &entropy).unwrap();
        let second = encrypt_with_pfs(b"second", &mut sender, &config, &entropy).unwrap();
        decrypt_with_pfs(&second, &mut receiver, &config).unwrap();

        let mut forged = first.clone();
        forged.c = second.c.clone();
        assert_eq!(decrypt_with_pfs(&forged, &mut receiver, &config), Err(CryptoError::Decryption));
        assert!(receiver.has_skipped_key(0));

        assert_eq!(decrypt_with_pfs(&first, &mut receiver, &config).unwrap(), b"first");
    }

    #[test]
    fn missing_message_number_is_rejected() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([1u8; KEY_SIZE]);

        let mut packet = encrypt_with_pfs(b"x", &mut sender, &config, &FixedEntropy(0)).unwrap();
        packet.message_number = None;

        assert_eq!(
            decrypt_with_pfs(&packet, &mut receiver, &config),
            Err(CryptoError::MissingMessageNumber)
        );
    }

    #[test]
    fn rotation_stays_in_sync() {
        let config = RatchetConfig { rotation_interval: 3, ..RatchetConfig::default() };
        let (mut sender, mut receiver) = pair([8u8; KEY_SIZE]);
        let entropy = FixedEntropy(4);

        for i in 0..10u32 {
            let message = i.to_le_bytes();
            let packet = encrypt_with_pfs(&message, &mut sender, &config, &entropy).unwrap();
            assert_eq!(decrypt_with_pfs(&packet, &mut receiver, &config).unwrap(), message);
        }
        assert_eq!(sender.previous_sending_chain_length(), 9);
        assert_eq!(sender.root_key().as_bytes(), receiver.root_key().as_bytes());
    }

    #[test]
    fn skipping_across_rotation() {
        let config = RatchetConfig { rotation_interval: 4, ..RatchetConfig::default() };
        let (mut sender, mut receiver) = pair([9u8; KEY_SIZE]);
        let entropy = FixedEntropy(5);

        let packets: Vec<_> = (0..10u8)
            .map(|i| encrypt_with_pfs(&[i], &mut sender, &config, &entropy).unwrap())
            .collect();

        assert_eq!(decrypt_with_pfs(&packets[9], &mut receiver, &config).unwrap(), [9]);
        for i in (0..9).rev() {
            assert_eq!(decrypt_with_pfs(&packets[i], &mut receiver, &config).unwrap(), [i as u8]);
        }
    }

    #[test]
    fn skipped_numbers_across_rotation_still_decrypt() {
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = pair([0x0Au8; KEY_SIZE]);

        for _ in 0..100 {
            sender.advance_chain_with(&config).unwrap();
        }

        let packet =
            encrypt_with_pfs(b"after skip", &mut sender, &config, &FixedEntropy(6)).unwrap();
        assert_eq!(packet.message_number, Some(100));
        assert_eq!(decrypt_with_pfs(&packet, &mut receiver, &config).unwrap(), b"after skip");
    }

    #[test]
    fn manual_advance_then_rotate_matches_receiver() {
        let config = RatchetConfig { rotation_interval: 10, ..RatchetConfig::default() };
        let (mut sender, mut receiver) = pair([0x0Bu8; KEY_SIZE]);

        for _ in 0..25 {
            sender.advance_chain().unwrap();
            sender.rotate_keys(config.rotation_interval);
        }

        let packet = encrypt_with_pfs(b"late", &mut sender, &config, &FixedEntropy(7)).unwrap();
        assert_eq!(decrypt_with_pfs(&packet, &mut receiver, &config).unwrap(), b"late");
        assert_eq!(receiver.skipped_key_count(), 25);
    }

    #[test]
    fn oversized_max_skip_cannot_force_a_long_walk() {
        let config = RatchetConfig { max_skip: u32::MAX, ..RatchetConfig::default() };
        let (mut sender, mut receiver) = pair([0x0Cu8; KEY_SIZE]);

        let mut packet = encrypt_with_pfs(b"x", &mut sender, &config, &FixedEntropy(8)).unwrap();
        packet.message_number = Some(u32::MAX - 1);

        assert_eq!(
            decrypt_with_pfs(&packet, &mut receiver, &config),
            Err(CryptoError::TooManySkipped { current: 0, requested: u32::MAX - 1 })
        );
        assert!(receiver.is_fresh());
    }
}
