//! Password hashing, JWT issue/verify and the authenticated-user
//! extractor.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use aeris_core::User;

use crate::persistence::users;
use crate::state::AppState;

use super::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("password hash failed")
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn create_access_token(user_id: i64, secret: &str, expire_minutes: i64) -> Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::minutes(expire_minutes)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("token encode failed")
}

/// Validate signature and expiry, returning the subject user id.
pub fn decode_user_id(token: &str, secret: &str) -> Option<i64> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    data.claims.sub.parse().ok()
}

/// Extractor for authenticated endpoints: `Authorization: Bearer <jwt>`.
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Auth("not authenticated".to_string()))?;

        let user_id = decode_user_id(token, &state.config.secret_key)
            .ok_or_else(|| ApiError::Auth("invalid or expired token".to_string()))?;

        let user = users::find_by_id(state.db.pool(), user_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::Auth("user not found".to_string()))?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn test_token_roundtrip() {
        let token = create_access_token(42, "secret", 60).unwrap();
        assert_eq!(decode_user_id(&token, "secret"), Some(42));
        assert_eq!(decode_user_id(&token, "wrong-secret"), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_access_token(42, "secret", -120).unwrap();
        assert_eq!(decode_user_id(&token, "secret"), None);
    }
}
