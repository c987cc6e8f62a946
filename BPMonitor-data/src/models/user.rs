use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `users` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub salt: Option<String>,
    pub mobile: Option<String>,
    pub is_email_verified: bool,
    pub is_mobile_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expiry: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for inserting a user
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub mobile: Option<String>,
    pub is_email_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expiry: Option<DateTime<Utc>>,
}

/// Partial update of a user.
///
/// A changed email or mobile number clears the matching verification flag.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub mobile: Option<String>,
    /// New `(password_hash, salt)` pair
    pub password: Option<(String, String)>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.mobile.is_none() && self.password.is_none()
    }
}

/// Row of the `sessions` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Values for inserting a session
#[derive(Debug, Clone)]
pub struct NewSessionRecord {
    pub user_id: i64,
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}
