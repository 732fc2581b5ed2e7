// JWT token generation and validation

use crate::auth::models::UserId;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default access token lifetime: 5 hours
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 5 * 60 * 60;

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token manager configuration: {0}")]
    Config(String),

    #[error("failed to sign token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),

    #[error("invalid token")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("invalid token claims: {0}")]
    InvalidClaims(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenKind,
}

/// Token lifetimes in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access_secs: i64,
    pub refresh_secs: i64,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_secs: DEFAULT_REFRESH_TTL_SECS,
        }
    }
}

/// Issues and parses self-contained signed tokens
pub trait TokenManager: Send + Sync {
    fn issue_access_token(&self, subject: UserId) -> Result<String, TokenError>;

    fn issue_refresh_token(&self, subject: UserId) -> Result<String, TokenError>;

    /// Verify an access token and return its subject
    fn parse(&self, token: &str) -> Result<UserId, TokenError>;

    /// Verify a refresh token and return its subject
    fn parse_refresh(&self, token: &str) -> Result<UserId, TokenError>;
}

/// HS256 JWT implementation of [`TokenManager`]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: TokenTtl,
}

impl JwtManager {
    pub fn new(signing_key: &str, ttl: TokenTtl) -> Result<Self, TokenError> {
        if signing_key.is_empty() {
            return Err(TokenError::Config("empty signing key".to_string()));
        }
        if ttl.access_secs <= 0 || ttl.refresh_secs <= 0 {
            return Err(TokenError::Config(
                "token lifetimes must be positive".to_string(),
            ));
        }

        // Only the symmetric scheme we sign with is accepted; a token whose
        // header names any other algorithm is rejected before claims are read.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding: DecodingKey::from_secret(signing_key.as_bytes()),
            validation,
            ttl,
        })
    }

    fn issue(
        &self,
        subject: UserId,
        typ: TokenKind,
        lifetime_secs: i64,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(lifetime_secs),
            typ,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Issue)
    }

    fn decode_kind(&self, token: &str, expected: TokenKind) -> Result<UserId, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::MissingRequiredClaim(claim) => {
                    TokenError::InvalidClaims(format!("missing claim '{}'", claim))
                }
                ErrorKind::Json(_) => TokenError::InvalidClaims(e.to_string()),
                _ => TokenError::Invalid,
            })?;

        if claims.typ != expected {
            return Err(TokenError::InvalidClaims(format!(
                "expected {:?} token, got {:?}",
                expected, claims.typ
            )));
        }

        claims
            .sub
            .parse::<UserId>()
            .map_err(|e| TokenError::InvalidClaims(e.to_string()))
    }
}

impl TokenManager for JwtManager {
    fn issue_access_token(&self, subject: UserId) -> Result<String, TokenError> {
        self.issue(subject, TokenKind::Access, self.ttl.access_secs)
    }

    fn issue_refresh_token(&self, subject: UserId) -> Result<String, TokenError> {
        self.issue(subject, TokenKind::Refresh, self.ttl.refresh_secs)
    }

    fn parse(&self, token: &str) -> Result<UserId, TokenError> {
        self.decode_kind(token, TokenKind::Access)
    }

    fn parse_refresh(&self, token: &str) -> Result<UserId, TokenError> {
        self.decode_kind(token, TokenKind::Refresh)
    }
}
