//! Single-writer owner of a conversation's ratchets.
//!
//! A [`RatchetState`] rotates as a unit, so one state cannot safely serve
//! both directions: a rotation triggered by sending would re-root the chain
//! the peer is still sending on. A conversation keeps one state per
//! direction instead.
//!
//! ```text
//!        Alice                              Bob
//!  outbound = init(tx_A)  ───────►  inbound = init_responder(rx_B)
//!  inbound  = init_responder(rx_A) ◄───────  outbound = init(tx_B)
//! ```
//!
//! `tx_A == rx_B` and `rx_A == tx_B`, so each pair derives identical chains.

use crate::{
    env::Entropy,
    error::CryptoError,
    keys::SessionKeys,
    packet::CipherPacket,
    ratchet::{RatchetConfig, RatchetState, decrypt_with_pfs, encrypt_with_pfs},
};

/// Both ratchets of one conversation plus the configuration they share.
#[derive(Debug)]
pub struct Conversation {
    outbound: RatchetState,
    inbound: RatchetState,
    config: RatchetConfig,
}

impl Conversation {
    /// Build both ratchets from established session keys.
    pub fn new(session_keys: &SessionKeys, config: RatchetConfig) -> Self {
        Self {
            outbound: RatchetState::initialize(&session_keys.tx),
            inbound: RatchetState::initialize_responder(&session_keys.rx),
            config,
        }
    }

    /// Encrypt the next outgoing message.
    ///
    /// # Errors
    ///
    /// - `MessageNumberOverflow` if the outbound chain is exhausted
    pub fn encrypt(
        &mut self,
        message: &[u8],
        entropy: &impl Entropy,
    ) -> Result<CipherPacket, CryptoError> {
        encrypt_with_pfs(message, &mut self.outbound, &self.config, entropy)
    }

    /// Decrypt an incoming packet. Failure leaves the conversation unchanged.
    ///
    /// # Errors
    ///
    /// See [`decrypt_with_pfs`].
    pub fn decrypt(&mut self, packet: &CipherPacket) -> Result<Vec<u8>, CryptoError> {
        decrypt_with_pfs(packet, &mut self.inbound, &self.config)
    }

    /// Evict skipped keys older than `max_skipped_age`. Returns the number of
    /// keys evicted.
    pub fn maintain(&mut self) -> usize {
        self.inbound.cleanup_old_keys(self.config.max_skipped_age)
    }

    /// Ratchet used for sending.
    pub fn outbound(&self) -> &RatchetState {
        &self.outbound
    }

    /// Ratchet used for receiving.
    pub fn inbound(&self) -> &RatchetState {
        &self.inbound
    }

    /// Shared ratchet configuration.
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }
}
