//! Event password obfuscation and HMAC helpers.
//!
//! Event passwords are stored with a reversible XOR against the event join
//! code, then base64 encoded. This is a casual access gate for guests, not a
//! security boundary: anyone holding the stored value and the join code can
//! read the password back.
//!
//! # Examples
//!
//! ```
//! use photowall_common::crypto::{obfuscate_event_password, reveal_event_password};
//!
//! let stored = obfuscate_event_password("hochzeit", "PARTY1");
//! assert_ne!(stored, "hochzeit");
//! assert_eq!(reveal_event_password(&stored, "PARTY1").unwrap(), "hochzeit");
//! ```

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

fn xor_with_code(data: &[u8], code: &str) -> Vec<u8> {
    let key = code.as_bytes();
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Obfuscate an event password with the event's join code.
#[must_use]
pub fn obfuscate_event_password(password: &str, code: &str) -> String {
    STANDARD.encode(xor_with_code(password.as_bytes(), code))
}

/// Reverse [`obfuscate_event_password`].
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the stored value is not valid base64 or
/// does not decode to UTF-8 with the given code.
pub fn reveal_event_password(stored: &str, code: &str) -> AppResult<String> {
    let bytes = STANDARD
        .decode(stored)
        .map_err(|e| AppError::Internal(format!("Stored event password is not base64: {e}")))?;
    String::from_utf8(xor_with_code(&bytes, code))
        .map_err(|e| AppError::Internal(format!("Stored event password is corrupt: {e}")))
}

/// Hex encoded HMAC-SHA256 of `message` under `secret`.
#[must_use]
#[allow(clippy::expect_used)] // HMAC accepts any key size, this cannot fail
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex encoded HMAC-SHA256 in constant time.
#[must_use]
pub fn verify_hmac_sha256_hex(secret: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}
