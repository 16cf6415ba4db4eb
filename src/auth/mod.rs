//! Authentication: access tokens, refresh tokens and password hashing.
//!
//! Access tokens are short-lived HS256 JWTs carrying the user's token
//! version. Refresh tokens are opaque random strings; only their SHA-256
//! hash is persisted, and each one is usable once.

pub mod extractor;
pub mod password;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AuthSection;
use crate::db::FlowieDb;
use crate::errors::{FlowieError, Result};
use crate::models::User;

pub use extractor::AuthUser;

const REFRESH_TOKEN_BYTES: usize = 32;

/// JWT claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    /// Token version of the user at issue time
    pub ver: i64,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues and verifies tokens. Cheap to clone.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(config: &AuthSection) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
        }
    }

    pub fn issue_access_token(&self, user: &User, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            ver: user.token_version,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to sign access token: {}", e).into())
    }

    /// Verify signature and issuer, then check expiry against `now`.
    ///
    /// Expiry is checked here rather than by `jsonwebtoken` so the injected
    /// clock decides what "now" is.
    pub fn verify_access_token(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                FlowieError::Unauthorized("Invalid access token".into())
            })?;

        if data.claims.exp <= now.timestamp() {
            return Err(FlowieError::Unauthorized("Access token expired".into()));
        }
        Ok(data.claims)
    }

    /// Issue an access token plus a fresh refresh token, persisting the
    /// refresh token's hash. Runs inside a `DbHandle::call` closure.
    pub fn issue_tokens(&self, db: &FlowieDb, user: &User, now: DateTime<Utc>) -> Result<TokenPair> {
        let access_token = self.issue_access_token(user, now)?;
        let refresh_token = generate_refresh_token();
        db.store_refresh_token(
            user.id,
            &hash_refresh_token(&refresh_token),
            now + self.refresh_ttl,
            now,
        )?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }
}

/// 32 random bytes, hex encoded.
pub fn generate_refresh_token() -> String {
    let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
