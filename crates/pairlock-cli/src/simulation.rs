//! Deterministic two-party conversation.
//!
//! Both parties run in-process. Every random choice (identities, nonces,
//! delivery order) comes from one seeded generator, so a seed reproduces a
//! run exactly.

use std::cell::RefCell;

use pairlock_crypto::{
    CipherPacket, Conversation, CryptoError, Entropy, IdentityKeyPair, RatchetConfig,
    SignedPreKeyBundle, build_bundle, create_identity, create_pre_key, determine_role, establish,
    identity_verifying_key, verify_pre_key,
};
use rand::{RngCore, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

/// Seeded generator behind the library's entropy seam.
struct SeededEntropy(RefCell<ChaCha20Rng>);

impl Entropy for SeededEntropy {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.0.borrow_mut().fill_bytes(buffer);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub messages: u32,
    pub seed: u64,
    pub reorder: bool,
    pub ratchet: RatchetConfig,
}

/// Outcome of one direction of the exchange.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionReport {
    pub sent: u32,
    pub delivered: u32,
    pub failed: u32,
    pub evicted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub seed: u64,
    pub reordered: bool,
    pub alice_is_client: bool,
    pub alice_to_bob: DirectionReport,
    pub bob_to_alice: DirectionReport,
}

struct Party {
    identity: IdentityKeyPair,
    bundle: SignedPreKeyBundle,
}

impl Party {
    fn generate(entropy: &SeededEntropy, key_id: u32) -> Self {
        let identity = create_identity(entropy);
        let pre_key = create_pre_key(entropy);
        let bundle = build_bundle(&identity, &pre_key, Some(key_id));
        Self { identity, bundle }
    }
}

pub struct Simulation {
    config: SimulationConfig,
    entropy: SeededEntropy,
    alice: Party,
    bob: Party,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, CryptoError> {
        let entropy = SeededEntropy(RefCell::new(ChaCha20Rng::seed_from_u64(config.seed)));
        let alice = Party::generate(&entropy, 1);
        let bob = Party::generate(&entropy, 2);

        // Each side checks the other's bundle before trusting its keys
        verify_pre_key(&bob.bundle, &identity_verifying_key(&bob.identity))?;
        verify_pre_key(&alice.bundle, &identity_verifying_key(&alice.identity))?;

        Ok(Self { config, entropy, alice, bob })
    }

    pub fn run(self) -> Result<SimulationReport, CryptoError> {
        let alice_keys = establish(&self.alice.identity, &self.bob.bundle)?;
        let bob_keys = establish(&self.bob.identity, &self.alice.bundle)?;

        let mut alice = Conversation::new(&alice_keys, self.config.ratchet);
        let mut bob = Conversation::new(&bob_keys, self.config.ratchet);

        let alice_to_bob = self.exchange("alice", &mut alice, &mut bob)?;
        let bob_to_alice = self.exchange("bob", &mut bob, &mut alice)?;

        Ok(SimulationReport {
            seed: self.config.seed,
            reordered: self.config.reorder,
            alice_is_client: determine_role(
                self.alice.identity.public_key(),
                self.bob.identity.public_key(),
            ),
            alice_to_bob,
            bob_to_alice,
        })
    }

    /// Send `messages` packets from `sender` and deliver them to `receiver`
    /// through the JSON wire form.
    fn exchange(
        &self,
        sender_name: &str,
        sender: &mut Conversation,
        receiver: &mut Conversation,
    ) -> Result<DirectionReport, CryptoError> {
        let mut report = DirectionReport::default();
        let mut wire = Vec::with_capacity(self.config.messages as usize);

        for i in 0..self.config.messages {
            let message = format!("{sender_name} #{i}");
            let packet = sender.encrypt(message.as_bytes(), &self.entropy)?;
            wire.push((message, packet.to_json()));
            report.sent += 1;
        }

        if self.config.reorder {
            wire.shuffle(&mut *self.entropy.0.borrow_mut());
        }

        for (expected, json) in &wire {
            let packet = CipherPacket::from_json(json)?;
            match receiver.decrypt(&packet) {
                Ok(plaintext) if plaintext == expected.as_bytes() => report.delivered += 1,
                Ok(_) => {
                    tracing::error!(message_number = ?packet.message_number, "plaintext mismatch");
                    report.failed += 1;
                },
                Err(error) => {
                    tracing::warn!(
                        message_number = ?packet.message_number,
                        %error,
                        "delivery failed"
                    );
                    report.failed += 1;
                },
            }
        }

        report.evicted = receiver.maintain();

        tracing::info!(
            sender = sender_name,
            delivered = report.delivered,
            failed = report.failed,
            evicted = report.evicted,
            "direction complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(messages: u32, reorder: bool) -> SimulationConfig {
        SimulationConfig { messages, seed: 11, reorder, ratchet: RatchetConfig::default() }
    }

    #[test]
    fn in_order_run_delivers_everything() {
        let report = Simulation::new(config(150, false)).unwrap().run().unwrap();

        assert_eq!(report.alice_to_bob.delivered, 150);
        assert_eq!(report.bob_to_alice.delivered, 150);
        assert_eq!(report.alice_to_bob.failed, 0);
        assert_eq!(report.alice_to_bob.evicted, 0);
    }

    #[test]
    fn reordered_run_delivers_everything() {
        let report = Simulation::new(config(300, true)).unwrap().run().unwrap();

        assert_eq!(report.alice_to_bob.delivered, 300);
        assert_eq!(report.bob_to_alice.delivered, 300);
        assert_eq!(report.alice_to_bob.failed + report.bob_to_alice.failed, 0);
    }

    #[test]
    fn roles_are_complementary() {
        let report = Simulation::new(config(1, false)).unwrap().run().unwrap();
        let sim = Simulation::new(config(1, false)).unwrap();
        let bob_is_client =
            determine_role(sim.bob.identity.public_key(), sim.alice.identity.public_key());

        assert_ne!(report.alice_is_client, bob_is_client);
    }
}
