//! Authentication for the BP Monitor API
//!
//! Accounts, sessions and login auditing live in the auth database. Clients
//! authenticate with either an opaque session token or a signed token
//! (JWT or the fallback scheme), both sent as a Bearer credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::User;

pub mod logging;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod revocation;
pub mod service;
pub mod token;

pub use middleware::{auth_middleware, configure_auth, AuthMethod, AuthenticatedUser};
pub use revocation::RevocationList;
pub use service::{AuthConfig, AuthError, AuthService, Registration};
pub use token::{SignerKind, TokenClaims, TokenConfig, TokenError, TokenSigner};

/// Registration request body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Optional mobile number; a code is texted to it when SMS is configured
    pub mobile: Option<String>,
}

/// Registration response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: i64,
    pub message: String,
}

/// Login request body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

/// Login response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Opaque session token
    pub session_token: String,
    pub session_expires_at: DateTime<Utc>,
    /// Signed token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Seconds until the signed token expires
    pub expires_in: i64,
    pub user: User,
}

/// Account update request body; omitted or empty fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub mobile: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

/// Where a verification code is sent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Email,
    Mobile,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResendCodeRequest {
    pub channel: VerificationChannel,
}

/// Outcome of an auth operation that has nothing else to return
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
