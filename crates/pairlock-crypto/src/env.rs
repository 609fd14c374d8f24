//! Randomness source abstraction.
//!
//! Key generation and nonce selection draw bytes from an [`Entropy`]
//! implementation supplied by the caller. Production code uses
//! [`SystemEntropy`]; tests plug in a seeded generator so every key, nonce and
//! ciphertext is reproducible.

/// Source of random bytes.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Infallible except in exceptional circumstances (OS entropy exhaustion)
pub trait Entropy {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Returns a fixed-size array of random bytes.
    fn random_array<const N: usize>(&self) -> [u8; N]
    where
        Self: Sized,
    {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

impl<E: Entropy + ?Sized> Entropy for &E {
    fn random_bytes(&self, buffer: &mut [u8]) {
        (**self).random_bytes(buffer);
    }
}

/// OS cryptographic RNG (getrandom).
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness no key or nonce can
/// be generated safely, so there is nothing meaningful to fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl Entropy for SystemEntropy {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_entropy_random_bytes_are_random() {
        let bytes1: [u8; 32] = SystemEntropy.random_array();
        let bytes2: [u8; 32] = SystemEntropy.random_array();

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn borrowed_entropy_delegates() {
        let entropy = &SystemEntropy;
        let mut bytes = [0u8; 64];
        entropy.random_bytes(&mut bytes);

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "Most bytes should be non-zero");
    }
}
