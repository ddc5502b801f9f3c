use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;

use crate::utils::error::{AppError, AppResult};

const VOTE_ACTION: &str = "cast-vote";

/// Anti-forgery nonces are signed tokens bound to an action and a poll id,
/// valid for half a day. The render-time query issues one; the submission
/// handler refuses to record anything without a matching one.
#[derive(Debug, Serialize, Deserialize)]
struct NonceClaims {
    sub: String,
    act: String,
    exp: usize,
}

fn secret() -> String {
    env::var("SESSION_SECRET").unwrap_or_else(|_| "default-secret-key".to_string())
}

pub fn issue_nonce(poll_id: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(12))
        .expect("valid timestamp")
        .timestamp();

    let claims = NonceClaims {
        sub: poll_id.to_string(),
        act: VOTE_ACTION.to_string(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret().as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to issue nonce: {}", e)))
}

pub fn verify_nonce(nonce: &str, poll_id: &str) -> AppResult<()> {
    let claims = decode::<NonceClaims>(
        nonce,
        &DecodingKey::from_secret(secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Forbidden("Invalid or expired security token".to_string()))?;

    if claims.act != VOTE_ACTION || claims.sub != poll_id {
        return Err(AppError::Forbidden(
            "Security token does not match this poll".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_nonce_verifies_for_its_poll() {
        let nonce = issue_nonce("poll-1").unwrap();
        assert!(verify_nonce(&nonce, "poll-1").is_ok());
    }

    #[test]
    fn nonce_is_bound_to_the_poll() {
        let nonce = issue_nonce("poll-1").unwrap();
        let err = verify_nonce(&nonce, "poll-2").unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");
    }

    #[test]
    fn malformed_nonce_is_forbidden() {
        let err = verify_nonce("garbage", "poll-1").unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");
    }
}
