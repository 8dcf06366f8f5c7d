//! JWT authentication module.
//!
//! Bearer tokens are HS256 JWTs carrying `{sub, role, iat, exp}`. Issuing
//! tokens belongs to the identity service; [`JwtManager::issue`] exists for
//! tests and local tooling.
//!
//! ## Request Flow
//! ```text
//! Authorization: Bearer eyJhbGciOi...
//!      │
//!      ▼
//! AuthUser extractor ── missing / bad / expired ──► 401 UNAUTHENTICATED
//!      │
//!      ▼
//! Principal { user_id: sub, role }  ──► handler ──► CheckoutEngine
//! ```

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tally_core::{Principal, Role};

use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies bearer tokens with a shared secret.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a token for `user_id`, valid for `lifetime_secs`.
    pub fn issue(&self, user_id: &str, role: Role, lifetime_secs: i64) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(lifetime_secs)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry, returning the caller.
    pub fn verify(&self, token: &str) -> Result<Principal, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::Unauthenticated(format!("Invalid token: {}", e)))?;

        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::Unauthenticated("Token has no subject".to_string()));
        }

        Ok(Principal {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthenticated("Missing Authorization header".to_string()))?;

        let token = extract_bearer_token(header).ok_or_else(|| {
            ApiError::Unauthenticated("Authorization header must be a Bearer token".to_string())
        })?;

        state.jwt.verify(token).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let jwt = JwtManager::new("test-secret");
        let token = jwt.issue("cashier-1", Role::Cashier, 3600).unwrap();

        let principal = jwt.verify(&token).unwrap();
        assert_eq!(principal.user_id, "cashier-1");
        assert_eq!(principal.role, Role::Cashier);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let token = JwtManager::new("one").issue("u", Role::Owner, 3600).unwrap();
        assert!(JwtManager::new("two").verify(&token).is_err());

        let jwt = JwtManager::new("test-secret");
        let expired = jwt.issue("u", Role::Owner, -3600).unwrap();
        assert!(matches!(jwt.verify(&expired), Err(ApiError::Unauthenticated(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
