//! Cheap local check on a stored access token, made before trusting it.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// The `exp` claim of a JWT, read without verifying the signature.
/// Opaque (non-JWT) tokens have no readable expiry.
pub fn token_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| data.claims.exp)
}

/// Non-empty, and not past its `exp` when it carries one.
pub fn is_locally_valid(token: &str, now: i64) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return false;
    }
    match token_expiry(token) {
        Some(exp) => exp > now,
        None => true,
    }
}
