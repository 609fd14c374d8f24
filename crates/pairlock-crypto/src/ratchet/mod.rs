//! Symmetric forward-secrecy ratchet.
//!
//! A [`RatchetState`] is seeded from one directional session key. Every
//! message advances a chain key through a one-way step, so a key compromised
//! today cannot decrypt yesterday's messages. Every `rotation_interval`
//! messages the root key is re-derived and both chains restart from it.
//!
//! ```text
//! session key ──kdf──► root ──kdf(n)──► root' ──kdf(n')──► root'' ...
//!                │                │
//!                ├─► sending      ├─► sending'
//!                └─► receiving    └─► receiving'
//!
//! chain key ─HMAC(0x02)─► chain key ─HMAC(0x02)─► ...
//!     │                       │
//!  HMAC(0x01)              HMAC(0x01)
//!     ▼                       ▼
//! message key 0           message key 1
//! ```
//!
//! Late packets are decrypted with keys cached while walking the chain
//! forward. The cache is bounded by `max_skip` per packet and by periodic
//! [`RatchetState::cleanup_old_keys`] calls.

mod kdf;
mod pfs;
mod state;

pub use kdf::{MessageKeys, derive_message_keys};
pub use pfs::{decrypt_with_pfs, encrypt_with_pfs};
pub use state::{ChainOrientation, RatchetState};
use serde::{Deserialize, Serialize};

/// Messages between root key rotations
pub const DEFAULT_ROTATION_INTERVAL: u32 = 100;

/// Age (in message numbers) past which cached skipped keys are evicted
pub const DEFAULT_MAX_SKIPPED_AGE: u32 = 50;

/// Largest forward jump a single packet may request
pub const DEFAULT_MAX_SKIP: u32 = 1000;

/// Hard upper bound on `max_skip`, whatever the configuration says
pub const MAX_SKIP_CEILING: u32 = 10_000;

/// Tuning knobs for the ratchet.
///
/// Both parties must agree on `rotation_interval`: the receiver replays the
/// sender's rotations while walking its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RatchetConfig {
    /// Rotate the root key every this many sent messages (0 disables)
    pub rotation_interval: u32,
    /// Evict skipped keys older than this many message numbers
    pub max_skipped_age: u32,
    /// Reject packets more than this many numbers ahead of the chain (capped
    /// at [`MAX_SKIP_CEILING`])
    pub max_skip: u32,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self {
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            max_skipped_age: DEFAULT_MAX_SKIPPED_AGE,
            max_skip: DEFAULT_MAX_SKIP,
        }
    }
}
