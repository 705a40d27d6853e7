//! Bearer token handling.
//!
//! Tokens are HS256 JWTs whose claims carry the user id (`sub`), the role and an
//! expiry. Decoding yields the core [`Actor`] the services authorize against.

use carebook_core::{Actor, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token secret is empty")]
    EmptySecret,
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("invalid subject '{0}'")]
    InvalidSubject(String),
    #[error("invalid role '{0}'")]
    InvalidRole(String),
    #[error("token lifetime must be positive")]
    InvalidLifetime,
}

/// Signs a token for `actor` that expires after `ttl`.
pub fn issue_token(secret: &str, actor: Actor, ttl: Duration) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }
    let exp = (Utc::now() + ttl).timestamp();
    if ttl <= Duration::zero() || exp <= 0 {
        return Err(TokenError::InvalidLifetime);
    }
    let claims = Claims {
        sub: actor.user_id.to_string(),
        role: actor.role.as_str().to_string(),
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
}

/// Verifies signature and expiry, then maps the claims to an [`Actor`].
pub fn decode_token(secret: &str, token: &str) -> Result<Actor, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<Claims>(token, &key, &validation)?.claims;

    let user_id = claims
        .sub
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| TokenError::InvalidSubject(claims.sub.clone()))?;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|_| TokenError::InvalidRole(claims.role.clone()))?;
    Ok(Actor::new(user_id, role))
}
