//! Password hashing and JWT issuance / verification.
//!
//! Passwords are stored as salted bcrypt digests; the plaintext is dropped as
//! soon as the hash is computed and never logged. Tokens are HS256 JWTs whose
//! `sub` claim carries the user id and whose `exp` claim enforces a fixed
//! lifetime, so expiry needs no server-side session state.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// JWT claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

pub fn hash_password(plain: &str) -> Result<String, ServerError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
        .map_err(|e| ServerError::Internal(format!("password hashing failed: {e}")))
}

/// Constant-shape verification: any bcrypt error (malformed hash included)
/// counts as a mismatch rather than surfacing a distinct failure.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

pub fn issue_token(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String, ServerError> {
    let claims = Claims {
        sub: user_id.to_owned(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))
}

/// Decode and validate a bearer token; expiry is checked by the default
/// validation rules.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        // Low cost keeps the test fast; verification is cost-agnostic.
        let hash = bcrypt::hash("s3cret", 4).unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn malformed_hash_is_just_a_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn token_round_trips() {
        let token = issue_token("user-1", "secret", 3).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token("user-1", "secret", -1).unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token("user-1", "secret-a", 3).unwrap();
        assert!(decode_token(&token, "secret-b").is_err());
    }
}
