//! Token Issuing and Verification
//!
//! Access and refresh tokens are both JWTs signed with the shared secret.
//! The token kind travels as a signed `type` claim; callers decide which
//! kind they accept, so a single verifier serves both.

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::models::UserRole;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token kind claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Signed claim set shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Subject (user ID)
    pub sub: String,
    /// User role, access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    /// Token kind
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// JWT ID, keeps tokens minted in the same second distinct
    pub jti: Uuid,
}

impl Claims {
    /// Subject parsed as a user ID
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Why a token was rejected. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
            ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
            _ => TokenError::Malformed,
        }
    }
}

/// Mints and validates signed tokens
#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtConfig,
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(config.algorithm);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        Self {
            header: Header::new(config.algorithm),
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_token_ttl_secs
    }

    /// Issue an access token. Returns the token and its lifetime in seconds.
    pub fn issue_access(&self, subject: Uuid, role: UserRole) -> Result<(String, i64), AppError> {
        self.issue_access_at(subject, role, Utc::now())
    }

    /// Issue an access token as if the current time were `now`
    pub fn issue_access_at(
        &self,
        subject: Uuid,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<(String, i64), AppError> {
        let expires_in = self.config.access_token_ttl_secs;
        let claims = self.claims(subject, Some(role), TokenType::Access, now, expires_in);

        Ok((self.sign(&claims)?, expires_in))
    }

    /// Issue a refresh token. Returns the token and its expiry instant.
    pub fn issue_refresh(&self, subject: Uuid) -> Result<(String, DateTime<Utc>), AppError> {
        self.issue_refresh_at(subject, Utc::now())
    }

    /// Issue a refresh token as if the current time were `now`
    pub fn issue_refresh_at(
        &self,
        subject: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let ttl = self.config.refresh_token_ttl_secs;
        let claims = self.claims(subject, None, TokenType::Refresh, now, ttl);
        let expires_at = now + Duration::seconds(ttl);

        Ok((self.sign(&claims)?, expires_at))
    }

    /// Verify signature, issuer, audience and expiry in one step
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    fn claims(
        &self,
        subject: Uuid,
        role: Option<UserRole>,
        token_type: TokenType,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Claims {
        Claims {
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            sub: subject.to_string(),
            role,
            token_type,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&self.header, claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Token signing failed: {:?}", e);
            AppError::Internal
        })
    }
}
