//! Random material for pairing: session ids, session tokens and one-time
//! pairing codes.

use rand::Rng;
use uuid::Uuid;

pub const SESSION_TOKEN_BYTES: usize = 32;
pub const OTP_DIGITS: usize = 8;

/// 32 random bytes as 64 lowercase hex characters.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Eight decimal digits, leading zeros kept.
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_DIGITS)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Prefix safe to put in a log line.
pub fn short_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(8)
        .map(|(index, _)| index)
        .unwrap_or(id.len());
    &id[..end]
}
