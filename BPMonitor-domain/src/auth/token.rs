use std::env;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::auth::password::random_hex;

/// Errors for signed token operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, bad encoding or malformed claims
    #[error("Invalid token")]
    Invalid,

    #[error("Token expired")]
    Expired,

    /// Revoked at logout
    #[error("Token has been revoked")]
    Revoked,

    #[error("Token signing error: {0}")]
    Signing(String),
}

/// Claims carried by a signed token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TokenClaims {
    pub user_id: i64,
    pub username: String,
    /// Issued at (as timestamp)
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Which signing scheme to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerKind {
    #[default]
    Jwt,
    Fallback,
}

impl FromStr for SignerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jwt" => Ok(SignerKind::Jwt),
            "fallback" => Ok(SignerKind::Fallback),
            other => Err(format!("Unknown token signer: {}", other)),
        }
    }
}

/// Token configuration from environment variables
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expiry: Duration,
    pub kind: SignerKind,
}

impl TokenConfig {
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set - using a random secret. Signed tokens will not survive a restart.");
            random_hex(32)
        });

        let expiry_hours = env::var("JWT_EXPIRY_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);

        let kind = env::var("TOKEN_SIGNER")
            .ok()
            .and_then(|s| {
                s.parse::<SignerKind>()
                    .map_err(|e| warn!("{} - using jwt", e))
                    .ok()
            })
            .unwrap_or_default();

        let expiry = Duration::try_hours(expiry_hours).unwrap_or_else(|| {
            warn!("JWT_EXPIRY_HOURS={} is out of range, using 24", expiry_hours);
            Duration::hours(24)
        });

        Self { secret, expiry, kind }
    }
}

/// Issues and checks signed tokens
#[derive(Clone)]
pub enum TokenSigner {
    /// HS256 JSON Web Tokens
    Jwt { secret: String, expiry: Duration },
    /// `base64(json claims).hex(sha256(base64 part + secret))`
    Fallback { secret: String, expiry: Duration },
}

impl TokenSigner {
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.clone();
        let expiry = config.expiry;
        match config.kind {
            SignerKind::Jwt => TokenSigner::Jwt { secret, expiry },
            SignerKind::Fallback => TokenSigner::Fallback { secret, expiry },
        }
    }

    pub fn kind(&self) -> SignerKind {
        match self {
            TokenSigner::Jwt { .. } => SignerKind::Jwt,
            TokenSigner::Fallback { .. } => SignerKind::Fallback,
        }
    }

    fn expiry(&self) -> Duration {
        match self {
            TokenSigner::Jwt { expiry, .. } | TokenSigner::Fallback { expiry, .. } => *expiry,
        }
    }

    /// Seconds a freshly issued token stays valid
    pub fn expires_in(&self) -> i64 {
        self.expiry().num_seconds()
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, user_id: i64, username: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = TokenClaims {
            user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiry()).timestamp(),
        };
        debug!("Issuing {:?} token for user {}", self.kind(), user_id);

        match self {
            TokenSigner::Jwt { secret, .. } => encode(
                &Header::new(Algorithm::HS256),
                &claims,
                &EncodingKey::from_secret(secret.as_bytes()),
            )
            .map_err(|e| {
                error!("Failed to encode JWT token: {}", e);
                TokenError::Signing(e.to_string())
            }),
            TokenSigner::Fallback { secret, .. } => {
                let payload = serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;
                let body = STANDARD.encode(payload);
                let signature = fallback_signature(&body, secret);
                Ok(format!("{}.{}", body, signature))
            }
        }
    }

    /// Verify a token and return its claims
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        match self {
            TokenSigner::Jwt { secret, .. } => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.validate_exp = true;
                validation.leeway = 0;
                validation.required_spec_claims.clear();
                validation.required_spec_claims.insert("exp".to_string());

                decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
                    .map(|data| data.claims)
                    .map_err(|e| match e.kind() {
                        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                        _ => TokenError::Invalid,
                    })
            }
            TokenSigner::Fallback { secret, .. } => decode_fallback(token, secret),
        }
    }
}

fn fallback_signature(body: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn decode_fallback(token: &str, secret: &str) -> Result<TokenClaims, TokenError> {
    let (body, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;
    if signature.contains('.') {
        return Err(TokenError::Invalid);
    }

    // Signature first, so nothing unsigned is ever parsed.
    let expected = fallback_signature(body, secret);
    if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        return Err(TokenError::Invalid);
    }

    let payload = STANDARD.decode(body).map_err(|_| TokenError::Invalid)?;
    let claims: TokenClaims = serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;

    if claims.exp < Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(kind: SignerKind) -> TokenSigner {
        TokenSigner::new(&TokenConfig {
            secret: "test_secret_key_for_testing_only".to_string(),
            expiry: Duration::hours(24),
            kind,
        })
    }

    #[test]
    fn test_generate_and_validate_token() {
        for kind in [SignerKind::Jwt, SignerKind::Fallback] {
            let signer = signer(kind);
            let token = signer.issue(7, "alice").unwrap();
            let claims = signer.decode(&token).unwrap();

            assert_eq!(claims.user_id, 7);
            assert_eq!(claims.username, "alice");
            assert_eq!(claims.exp - claims.iat, 24 * 3600);
        }
    }

    #[test]
    fn test_token_expiration() {
        for kind in [SignerKind::Jwt, SignerKind::Fallback] {
            let signer = signer(kind);
            let token = signer
                .issue_at(7, "alice", Utc::now() - Duration::hours(25))
                .unwrap();
            assert_eq!(signer.decode(&token), Err(TokenError::Expired));
        }
    }

    #[test]
    fn test_tampered_fallback_token() {
        let signer = signer(SignerKind::Fallback);
        let token = signer.issue(7, "alice").unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = TokenClaims {
            user_id: 1,
            username: "admin".to_string(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged_body = STANDARD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}", forged_body, signature);

        assert_eq!(signer.decode(&forged), Err(TokenError::Invalid));
        assert_eq!(signer.decode("no-dot-here"), Err(TokenError::Invalid));
        assert_eq!(signer.decode("a.b.c"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_secret_and_cross_scheme() {
        let jwt = signer(SignerKind::Jwt);
        let other = TokenSigner::Jwt {
            secret: "another".to_string(),
            expiry: Duration::hours(1),
        };
        let token = jwt.issue(3, "bob").unwrap();
        assert_eq!(other.decode(&token), Err(TokenError::Invalid));
        assert_eq!(signer(SignerKind::Fallback).decode(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_signer_kind_parsing() {
        assert_eq!("JWT".parse::<SignerKind>().unwrap(), SignerKind::Jwt);
        assert_eq!("fallback".parse::<SignerKind>().unwrap(), SignerKind::Fallback);
        assert!("hmac".parse::<SignerKind>().is_err());
    }

    #[test]
    fn test_out_of_range_expiry_uses_default() {
        env::set_var("JWT_EXPIRY_HOURS", i64::MAX.to_string());
        let config = TokenConfig::from_env();
        env::remove_var("JWT_EXPIRY_HOURS");

        assert_eq!(config.expiry, Duration::hours(24));
    }
}
