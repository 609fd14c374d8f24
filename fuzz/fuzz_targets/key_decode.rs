//! Fuzz target for key decoding
//!
//! Tries arbitrary strings as hex, URL-safe and standard base64 keys.
//!
//! # Invariants
//!
//! - Never panics
//! - Any accepted key is exactly 32 bytes
//! - Error messages never echo long inputs

#![no_main]

use libfuzzer_sys::fuzz_target;
use pairlock_crypto::{decode_key, PublicKey};

fuzz_target!(|input: &str| {
    match decode_key(input) {
        Ok(decoded) => {
            assert_eq!(decoded.bytes().len(), 32);
            let key = PublicKey::from_encoded(input).unwrap_or_else(|_| unreachable!());
            assert_eq!(key.as_bytes(), decoded.bytes());
        },
        Err(error) => {
            let trimmed = input.trim();
            if trimmed.len() > 64 {
                assert!(!error.to_string().contains(trimmed));
            }
        },
    }
});
