use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::schemas::AppState;

/// Claims carried by the bearer tokens this API accepts.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i32,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// The authenticated caller, resolved from the `Authorization` header.
///
/// Handlers taking this extractor reject the request with 401 before
/// any of their own logic runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i32,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated)?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::Unauthenticated
        })?;

        Ok(AuthUser {
            id: data.claims.sub,
        })
    }
}

/// Sign a token for the given user id, valid for `ttl_secs` seconds.
pub fn issue_token(
    user_id: i32,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs();

    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Hash a plaintext credential with Argon2 and a fresh random salt.
/// The plaintext is never stored or logged.
pub fn hash_password(plaintext: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| ApiError::Credential(e.to_string()))?;
    Ok(hash.to_string())
}
