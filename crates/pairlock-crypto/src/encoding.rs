//! Key encoding detection.
//!
//! Keys reach us in one of three textual forms: the legacy 64-character hex
//! encoding, URL-safe base64 without padding, and standard padded base64.
//! Detection is an explicit ordered list of attempts; the first that yields
//! exactly [`KEY_SIZE`] bytes wins.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use zeroize::Zeroizing;

use crate::{error::CryptoError, keys::KEY_SIZE};

/// Length of a 32-byte key in the legacy hex encoding
const HEX_KEY_LEN: usize = KEY_SIZE * 2;

/// Base64 attempts, in order.
const BASE64_ATTEMPTS: [KeyEncoding; 2] = [KeyEncoding::Base64UrlNoPad, KeyEncoding::Base64Standard];

/// Textual encoding a key was supplied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// Legacy lowercase or uppercase hex (64 characters)
    Hex,
    /// URL-safe base64 without padding (43 characters)
    Base64UrlNoPad,
    /// Standard base64 with padding (44 characters)
    Base64Standard,
}

impl KeyEncoding {
    fn decode(self, encoded: &str) -> Option<Zeroizing<Vec<u8>>> {
        let decoded = match self {
            Self::Hex => hex::decode(encoded).ok(),
            Self::Base64UrlNoPad => URL_SAFE_NO_PAD.decode(encoded).ok(),
            Self::Base64Standard => STANDARD.decode(encoded).ok(),
        };
        decoded.map(Zeroizing::new)
    }
}

/// A decoded 32-byte key and the encoding it arrived in.
///
/// The bytes zeroize on drop since private keys pass through here too.
pub struct DecodedKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
    encoding: KeyEncoding,
}

impl DecodedKey {
    /// Decoded key bytes.
    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Encoding that produced the bytes.
    pub fn encoding(&self) -> KeyEncoding {
        self.encoding
    }
}

/// Decode a 32-byte key from any accepted encoding.
///
/// Hex is selected by length (64 characters); everything else is tried as
/// URL-safe unpadded base64 first and standard base64 second.
///
/// # Errors
///
/// - `KeyFormat` if no encoding decodes the input, or the decoded length is
///   not 32 bytes. The message never includes the input.
pub fn decode_key(encoded: &str) -> Result<DecodedKey, CryptoError> {
    let encoded = encoded.trim();

    let attempts: &[KeyEncoding] =
        if encoded.len() == HEX_KEY_LEN { &[KeyEncoding::Hex] } else { &BASE64_ATTEMPTS };

    let Some((encoding, raw)) =
        attempts.iter().find_map(|&encoding| encoding.decode(encoded).map(|raw| (encoding, raw)))
    else {
        return Err(CryptoError::key_format(format!(
            "{}-character key is not valid hex or base64",
            encoded.len()
        )));
    };

    if raw.len() != KEY_SIZE {
        return Err(CryptoError::key_format(format!(
            "expected {KEY_SIZE} bytes, got {}",
            raw.len()
        )));
    }

    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    bytes.copy_from_slice(&raw);
    Ok(DecodedKey { bytes, encoding })
}
