use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// JWT claims carried by caller identity tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Caller's user id
    pub sub: String,
    /// Caller's display name, used for audit attribution
    pub name: String,
    /// Expiry (seconds since epoch)
    pub exp: usize,
}

/// Key material for validating identity tokens, shared through app state.
#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ServiceError::Unauthorized("Invalid authentication token".to_string()))
    }
}

/// The resolved caller identity. Every stock-changing endpoint extracts this
/// before doing any work; an unresolvable caller is a 401 with no side
/// effects.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub name: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = AuthKeys::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("No authentication token provided".to_string())
            })?;

        let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("Expected a bearer token".to_string())
        })?;

        let claims = keys.validate_token(token.trim())?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            ServiceError::Unauthorized("Token subject is not a valid user id".to_string())
        })?;

        Ok(AuthenticatedUser {
            user_id,
            name: claims.name,
        })
    }
}

/// Issues an identity token. Used by the operator tooling and tests; the
/// production issuer lives in the account service.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    name: &str,
    ttl: std::time::Duration,
) -> Result<String, ServiceError> {
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        exp: (chrono::Utc::now().timestamp() as usize) + ttl.as_secs() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("Failed to issue token: {}", e)))
}
