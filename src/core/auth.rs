// src/core/auth.rs

//! Challenge-response digest for the legacy `/login` handshake.
//!
//! When the first `/login` reply carries a `ret` challenge, the client answers with
//! `"00" + md5(0x00 ++ password ++ challenge)` rendered as lowercase hex.

use crate::core::ApiError;
use md5::{Digest, Md5};

/// Computes the lowercase hex digest for a hex-encoded login challenge.
pub fn compute_login_digest(password: &str, challenge_hex: &str) -> Result<String, ApiError> {
    let challenge = hex::decode(challenge_hex)?;

    let mut hasher = Md5::new();
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher.update(&challenge);

    Ok(hex::encode(hasher.finalize()))
}

/// Builds the value of the `response` attribute sent in the second login step.
pub fn login_response(password: &str, challenge_hex: &str) -> Result<String, ApiError> {
    Ok(format!("00{}", compute_login_digest(password, challenge_hex)?))
}
