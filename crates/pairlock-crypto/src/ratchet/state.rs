//! Per-direction ratchet state.
//!
//! # Security Properties
//!
//! - Forward Secrecy: superseded chain and root keys are zeroized on replace
//! - Key Uniqueness: every message number maps to exactly one message key
//! - Atomicity: receive paths stage their changes and commit only after the
//!   packet authenticates

use std::{collections::BTreeMap, fmt};

use zeroize::Zeroize;

use super::{
    MAX_SKIP_CEILING, RatchetConfig,
    kdf::{
        MessageKeys, RECEIVING_CHAIN_INDEX, ROOT_KEY_INDEX, SENDING_CHAIN_INDEX,
        derive_message_keys, derive_subkey,
    },
};
use crate::{error::CryptoError, keys::SecretKey};

/// Which of the two chains a state sends on.
///
/// Both parties derive the same root from a shared directional key. The
/// initiator sends on the chain the responder receives on, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOrientation {
    /// Sends on the first chain, receives on the second
    Initiator,
    /// Sends on the second chain, receives on the first
    Responder,
}

impl ChainOrientation {
    /// (sending, receiving) subkey indices
    fn chain_indices(self) -> (u64, u64) {
        match self {
            Self::Initiator => (SENDING_CHAIN_INDEX, RECEIVING_CHAIN_INDEX),
            Self::Responder => (RECEIVING_CHAIN_INDEX, SENDING_CHAIN_INDEX),
        }
    }
}

/// Root and chain keys of one rotation epoch.
struct EpochKeys {
    root: SecretKey,
    sending: SecretKey,
    receiving: SecretKey,
}

impl EpochKeys {
    /// Initial epoch: all three keys come straight from the session key.
    fn initial(session_key: &SecretKey, orientation: ChainOrientation) -> Self {
        let (sending_index, receiving_index) = orientation.chain_indices();
        Self {
            root: derive_subkey(session_key, ROOT_KEY_INDEX),
            sending: derive_subkey(session_key, sending_index),
            receiving: derive_subkey(session_key, receiving_index),
        }
    }

    /// Rotated epoch: new root from the old one keyed by the message number,
    /// chains from the new root.
    fn rotated(root: &SecretKey, message_number: u32, orientation: ChainOrientation) -> Self {
        let root = derive_subkey(root, u64::from(message_number));
        let (sending_index, receiving_index) = orientation.chain_indices();
        Self {
            sending: derive_subkey(&root, sending_index),
            receiving: derive_subkey(&root, receiving_index),
            root,
        }
    }
}

/// Whether the chain re-roots before deriving `message_number`.
fn is_rotation_point(message_number: u32, interval: u32) -> bool {
    interval != 0 && message_number != 0 && message_number % interval == 0
}

/// Staged result of resolving an incoming message number to its key.
///
/// Holds everything the receive path would change. Dropping it without
/// [`RatchetState::commit_receive`] leaves the state untouched and zeroizes
/// every staged key.
pub(crate) struct ReceivePlan {
    message_key: SecretKey,
    change: ReceiveChange,
}

enum ReceiveChange {
    /// Consume a cached skipped key
    Skipped { message_number: u32 },
    /// Walk the receiving chain forward
    Advance {
        epoch: EpochKeys,
        skipped: Vec<(u32, SecretKey)>,
        next_message_number: u32,
    },
}

impl ReceivePlan {
    /// One-time key for the incoming packet.
    pub(crate) fn message_key(&self) -> &SecretKey {
        &self.message_key
    }
}

/// Forward-secret ratchet state for one conversation direction pair.
///
/// Owned exclusively by its caller: every mutating operation takes `&mut self`
/// and the type is not `Clone`, so a message key can never be derived twice
/// from diverging copies.
///
/// A state rotates as a unit, so two parties stay in sync when each state is
/// used for a single direction. [`crate::Conversation`] pairs an outbound and
/// an inbound state for that reason.
pub struct RatchetState {
    root_key: SecretKey,
    sending_chain_key: SecretKey,
    receiving_chain_key: SecretKey,
    send_message_number: u32,
    receive_message_number: u32,
    previous_sending_chain_length: u32,
    skipped_keys: BTreeMap<u32, SecretKey>,
    orientation: ChainOrientation,
}

impl RatchetState {
    /// Initialize a ratchet from a session key.
    ///
    /// Derives root, sending chain and receiving chain keys at three fixed
    /// indices. Message numbers start at 0 and no keys are cached.
    pub fn initialize(session_key: &SecretKey) -> Self {
        Self::with_orientation(session_key, ChainOrientation::Initiator)
    }

    /// Initialize the mirror of [`RatchetState::initialize`].
    ///
    /// Same root key, chains swapped: this state receives what an initiator
    /// state built from the same session key sends.
    pub fn initialize_responder(session_key: &SecretKey) -> Self {
        Self::with_orientation(session_key, ChainOrientation::Responder)
    }

    fn with_orientation(session_key: &SecretKey, orientation: ChainOrientation) -> Self {
        let EpochKeys { root, sending, receiving } = EpochKeys::initial(session_key, orientation);
        Self {
            root_key: root,
            sending_chain_key: sending,
            receiving_chain_key: receiving,
            send_message_number: 0,
            receive_message_number: 0,
            previous_sending_chain_length: 0,
            skipped_keys: BTreeMap::new(),
            orientation,
        }
    }

    /// Current root key.
    pub fn root_key(&self) -> &SecretKey {
        &self.root_key
    }

    /// Current sending chain key.
    pub fn sending_chain_key(&self) -> &SecretKey {
        &self.sending_chain_key
    }

    /// Current receiving chain key.
    pub fn receiving_chain_key(&self) -> &SecretKey {
        &self.receiving_chain_key
    }

    /// Number of the next message this state will send.
    pub fn send_message_number(&self) -> u32 {
        self.send_message_number
    }

    /// Number of the next in-order message this state expects.
    pub fn receive_message_number(&self) -> u32 {
        self.receive_message_number
    }

    /// Sending chain length recorded at the last root rotation.
    pub fn previous_sending_chain_length(&self) -> u32 {
        self.previous_sending_chain_length
    }

    /// Orientation chosen at initialization.
    pub fn orientation(&self) -> ChainOrientation {
        self.orientation
    }

    /// True until the first message is sent or received.
    pub fn is_fresh(&self) -> bool {
        self.send_message_number == 0 && self.receive_message_number == 0
    }

    /// Number of cached skipped keys.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped_keys.len()
    }

    /// Whether a key for `message_number` is cached.
    pub fn has_skipped_key(&self, message_number: u32) -> bool {
        self.skipped_keys.contains_key(&message_number)
    }

    /// Message numbers with cached keys, ascending.
    pub fn skipped_message_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.skipped_keys.keys().copied()
    }

    /// Advance the sending chain without encrypting.
    ///
    /// The derived message key is discarded (zeroized) immediately.
    ///
    /// This does not rotate. The receiver re-roots at every multiple of the
    /// rotation interval, so a sender that skips numbers must follow each
    /// advance with [`RatchetState::rotate_keys`], or use
    /// [`RatchetState::advance_chain_with`] which does both.
    pub fn advance_chain(&mut self) -> Result<(), CryptoError> {
        self.check_send_capacity()?;

        let MessageKeys { message_key, next_chain_key } =
            derive_message_keys(&self.sending_chain_key);
        drop(message_key);

        self.commit_send(next_chain_key);
        Ok(())
    }

    /// Skip one sending message number, rotating exactly as
    /// [`crate::encrypt_with_pfs`] would.
    ///
    /// Returns whether the root rotated.
    pub fn advance_chain_with(&mut self, config: &RatchetConfig) -> Result<bool, CryptoError> {
        self.advance_chain()?;
        Ok(self.rotate_keys(config.rotation_interval))
    }

    /// Rotate the root key when `send_message_number` is a positive multiple
    /// of `interval`.
    ///
    /// Derives a new root from the current root keyed by the message number,
    /// re-derives both chains from it, and records
    /// `previous_sending_chain_length`. Otherwise leaves the state unchanged.
    /// An `interval` of 0 disables rotation.
    ///
    /// Not idempotent: calling it twice at the same message number rotates
    /// twice. [`crate::encrypt_with_pfs`] calls it exactly once per message.
    ///
    /// Returns whether a rotation happened.
    pub fn rotate_keys(&mut self, interval: u32) -> bool {
        if !is_rotation_point(self.send_message_number, interval) {
            return false;
        }

        let epoch =
            EpochKeys::rotated(&self.root_key, self.send_message_number, self.orientation);
        self.install_epoch(epoch);
        self.previous_sending_chain_length = self.send_message_number;

        tracing::debug!(message_number = self.send_message_number, "rotated root key");
        true
    }

    /// Discard cached skipped keys older than `receive_message_number -
    /// max_age`.
    ///
    /// Evicted keys are zeroized. Returns the number of keys evicted.
    pub fn cleanup_old_keys(&mut self, max_age: u32) -> usize {
        let threshold = self.receive_message_number.saturating_sub(max_age);
        let retained = self.skipped_keys.split_off(&threshold);
        let evicted = std::mem::replace(&mut self.skipped_keys, retained);

        let count = evicted.len();
        if count > 0 {
            tracing::debug!(evicted = count, threshold, "evicted stale skipped keys");
        }
        count
    }

    pub(crate) fn check_send_capacity(&self) -> Result<(), CryptoError> {
        if self.send_message_number == u32::MAX {
            return Err(CryptoError::MessageNumberOverflow { current: self.send_message_number });
        }
        Ok(())
    }

    /// Replace the sending chain key and count the message as sent.
    ///
    /// The old chain key is zeroized when it is dropped here.
    pub(crate) fn commit_send(&mut self, next_chain_key: SecretKey) {
        self.sending_chain_key = next_chain_key;
        self.send_message_number += 1;
    }

    /// Resolve the key for an incoming message number without mutating state.
    ///
    /// `max_skip` is clamped to [`MAX_SKIP_CEILING`] so an unauthenticated
    /// message number cannot drive an unbounded walk.
    pub(crate) fn plan_receive(
        &self,
        message_number: u32,
        rotation_interval: u32,
        max_skip: u32,
    ) -> Result<ReceivePlan, CryptoError> {
        let expected = self.receive_message_number;

        if message_number < expected {
            let message_key = self
                .skipped_keys
                .get(&message_number)
                .cloned()
                .ok_or(CryptoError::SkippedKeyNotFound { message_number })?;

            return Ok(ReceivePlan {
                message_key,
                change: ReceiveChange::Skipped { message_number },
            });
        }

        if message_number - expected > max_skip.min(MAX_SKIP_CEILING) {
            return Err(CryptoError::TooManySkipped {
                current: expected,
                requested: message_number,
            });
        }

        let next_message_number = message_number
            .checked_add(1)
            .ok_or(CryptoError::MessageNumberOverflow { current: message_number })?;

        let mut epoch = EpochKeys {
            root: self.root_key.clone(),
            sending: self.sending_chain_key.clone(),
            receiving: self.receiving_chain_key.clone(),
        };
        let mut skipped = Vec::new();

        for number in expected..=message_number {
            // Mirror the sender, which re-roots right after reaching this number
            if is_rotation_point(number, rotation_interval) {
                epoch = EpochKeys::rotated(&epoch.root, number, self.orientation);
            }

            let MessageKeys { message_key, next_chain_key } =
                derive_message_keys(&epoch.receiving);
            epoch.receiving = next_chain_key;

            if number == message_number {
                return Ok(ReceivePlan {
                    message_key,
                    change: ReceiveChange::Advance { epoch, skipped, next_message_number },
                });
            }
            skipped.push((number, message_key));
        }

        unreachable!("walk always reaches the requested message number")
    }

    /// Apply a plan produced by [`RatchetState::plan_receive`].
    pub(crate) fn commit_receive(&mut self, plan: ReceivePlan) {
        match plan.change {
            ReceiveChange::Skipped { message_number } => {
                self.skipped_keys.remove(&message_number);
            },
            ReceiveChange::Advance { epoch, skipped, next_message_number } => {
                if !skipped.is_empty() {
                    tracing::debug!(
                        cached = skipped.len(),
                        next = next_message_number,
                        "cached skipped message keys"
                    );
                }
                self.install_epoch(epoch);
                self.skipped_keys.extend(skipped);
                self.receive_message_number = next_message_number;
            },
        }
    }

    fn install_epoch(&mut self, epoch: EpochKeys) {
        let EpochKeys { root, sending, receiving } = epoch;
        self.root_key = root;
        self.sending_chain_key = sending;
        self.receiving_chain_key = receiving;
    }
}

impl Zeroize for RatchetState {
    /// Zero the root key, both chain keys and every cached skipped key, then
    /// clear the cache.
    fn zeroize(&mut self) {
        self.root_key.zeroize();
        self.sending_chain_key.zeroize();
        self.receiving_chain_key.zeroize();
        for key in self.skipped_keys.values_mut() {
            key.zeroize();
        }
        self.skipped_keys.clear();
    }
}

impl fmt::Debug for RatchetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatchetState")
            .field("orientation", &self.orientation)
            .field("send_message_number", &self.send_message_number)
            .field("receive_message_number", &self.receive_message_number)
            .field("previous_sending_chain_length", &self.previous_sending_chain_length)
            .field("skipped_keys", &self.skipped_keys.len())
            .finish_non_exhaustive()
    }
}
