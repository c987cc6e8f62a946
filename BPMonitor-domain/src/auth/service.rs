use std::env;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::Validate;

use bp_monitor_data::models::{NewSessionRecord, NewUserRecord, UserChanges, UserRecord};
use bp_monitor_data::repository::{
    LoginAttemptRepository, LoginAttemptRepositoryTrait, RepositoryError, SessionRepository,
    SessionRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use bp_monitor_data::Database;

use crate::auth::logging::{log_auth_event, log_failed_login, log_logout, log_successful_login, AuthEvent, AuthEventType};
use crate::auth::password::{generate_salt, hash_password, random_hex, verify_password};
use crate::auth::revocation::RevocationList;
use crate::auth::token::{TokenClaims, TokenError, TokenSigner};
use crate::auth::{LoginResponse, RegisterRequest, UpdateUserRequest, VerificationChannel};
use crate::entities::conversions;
use crate::entities::{LoginHistoryEntry, User};
use crate::services::errors::validation_message;
use crate::sms::{Delivery, Notifier, SmsError};

/// Number of random bytes in a session token
const SESSION_TOKEN_BYTES: usize = 32;

/// Authentication errors. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid username/email or password")]
    InvalidCredentials,

    #[error("Too many failed login attempts. Please try again later.")]
    TooManyAttempts,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code expired")]
    CodeExpired,

    #[error("No mobile number on file")]
    NoMobile,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Sms(#[from] SmsError),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        error!("Auth storage failure: {}", err);
        AuthError::Repository(err.to_string())
    }
}

/// Auth tunables from environment variables
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl: Duration,
    pub verification_ttl: Duration,
    /// Failed attempts from one address before logins are refused
    pub max_failures: u32,
    pub lockout_window: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::days(30),
            verification_ttl: Duration::hours(24),
            max_failures: 5,
            lockout_window: Duration::minutes(15),
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Converts an env value with `to_duration`, keeping `default` when it overflows
fn env_duration(name: &str, default: i64, to_duration: fn(i64) -> Option<Duration>) -> Duration {
    let value = env_i64(name, default);
    to_duration(value).unwrap_or_else(|| {
        warn!("{}={} is out of range, using {}", name, value, default);
        to_duration(default).unwrap_or_default()
    })
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            session_ttl: env_duration("SESSION_TTL_DAYS", 30, Duration::try_days),
            verification_ttl: Duration::hours(24),
            max_failures: env_i64("LOGIN_MAX_FAILURES", 5).max(0) as u32,
            lockout_window: env_duration("LOGIN_LOCKOUT_MINUTES", 15, Duration::try_minutes),
        }
    }
}

/// Result of a registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: i64,
    pub verification_code: String,
}

/// A new session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// How a bearer credential was recognised
#[derive(Debug, Clone)]
pub enum Credential {
    Session,
    Signed(TokenClaims),
}

/// Users, sessions, verification codes and signed tokens
pub struct AuthService {
    users: Arc<dyn UserRepositoryTrait>,
    sessions: Arc<dyn SessionRepositoryTrait>,
    attempts: Arc<dyn LoginAttemptRepositoryTrait>,
    signer: TokenSigner,
    revoked: RevocationList,
    notifier: Notifier,
    config: AuthConfig,
}

/// Generate a zero padded six digit code
pub fn generate_verification_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

/// Session tokens are 64 lowercase hex characters; anything else is a signed token
pub fn looks_like_session_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepositoryTrait>,
        sessions: Arc<dyn SessionRepositoryTrait>,
        attempts: Arc<dyn LoginAttemptRepositoryTrait>,
        signer: TokenSigner,
        notifier: Notifier,
        config: AuthConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            attempts,
            signer,
            revoked: RevocationList::new(),
            notifier,
            config,
        }
    }

    /// Service over the auth database of `db`
    pub fn from_database(db: &Database, signer: TokenSigner, notifier: Notifier, config: AuthConfig) -> Self {
        let pool = db.auth_pool().clone();
        Self::new(
            Arc::new(UserRepository::new(pool.clone())),
            Arc::new(SessionRepository::new(pool.clone())),
            Arc::new(LoginAttemptRepository::new(pool)),
            signer,
            notifier,
            config,
        )
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    async fn require_user(&self, user_id: i64) -> Result<UserRecord, AuthError> {
        self.users.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Insert a user; a uniqueness conflict lost to a concurrent
    /// registration is reported against the value that was taken
    async fn insert_user(&self, user: NewUserRecord) -> Result<i64, AuthError> {
        let email = user.email.clone();
        match self.users.create_user(user).await {
            Ok(id) => Ok(id),
            Err(RepositoryError::Conflict(_)) => {
                if self.users.email_exists(&email).await? {
                    Err(AuthError::EmailTaken)
                } else {
                    Err(AuthError::UsernameTaken)
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Register a new user and send them a verification code
    pub async fn register_user(&self, request: RegisterRequest) -> Result<Registration, AuthError> {
        let request = RegisterRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            mobile: non_empty(request.mobile),
            ..request
        };
        request
            .validate()
            .map_err(|e| AuthError::Validation(validation_message(&e)))?;

        if self.users.username_exists(&request.username).await? {
            return Err(AuthError::UsernameTaken);
        }
        if self.users.email_exists(&request.email).await? {
            return Err(AuthError::EmailTaken);
        }

        let salt = generate_salt();
        let code = generate_verification_code();
        let user_id = self
            .insert_user(NewUserRecord {
                username: request.username.clone(),
                email: request.email.clone(),
                password_hash: hash_password(&request.password, &salt),
                salt,
                mobile: request.mobile.clone(),
                is_email_verified: false,
                verification_code: Some(code.clone()),
                verification_code_expiry: Some(Utc::now() + self.config.verification_ttl),
            })
            .await?;

        log_auth_event(
            AuthEvent::new(AuthEventType::Registration, Some(&request.username), true)
                .with_details(format!("user id {}", user_id)),
        );

        self.notifier.send_verification_email(&request.email, &code);
        if let Some(mobile) = &request.mobile {
            if let Err(e) = self.notifier.send_verification_sms(mobile, &code).await {
                warn!("Could not text verification code to user {}: {}", user_id, e);
            }
        }

        Ok(Registration {
            user_id,
            verification_code: code,
        })
    }

    /// Check a username or email and password, logging the attempt when an address is known
    pub async fn verify_credentials(
        &self,
        username_or_email: &str,
        password: &str,
        ip_address: Option<&str>,
    ) -> Result<User, AuthError> {
        let identifier = username_or_email.trim();
        let is_email = identifier.contains('@');

        let attempt_id = match ip_address {
            Some(ip) => {
                let since = Utc::now() - self.config.lockout_window;
                let failures = self.attempts.count_recent_failures(ip, since).await?;
                if self.config.max_failures > 0 && failures >= self.config.max_failures {
                    log_auth_event(
                        AuthEvent::new(AuthEventType::Lockout, Some(identifier), false)
                            .with_optional_ip(Some(ip))
                            .with_details(format!("{} recent failures", failures)),
                    );
                    return Err(AuthError::TooManyAttempts);
                }

                let (username, email) = if is_email {
                    (None, Some(identifier))
                } else {
                    (Some(identifier), None)
                };
                Some(self.attempts.record_attempt(username, email, ip).await?)
            }
            None => None,
        };

        let user = if is_email {
            self.users.find_by_email(identifier).await?
        } else {
            self.users.find_by_username(identifier).await?
        };

        let user = match user {
            Some(user) => user,
            None => {
                log_failed_login(identifier, ip_address, "unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let password_ok = match (&user.salt, &user.password_hash) {
            (Some(salt), Some(hash)) => verify_password(password, salt, hash),
            _ => false,
        };
        if !password_ok {
            log_failed_login(identifier, ip_address, "wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(id) = attempt_id {
            self.attempts.mark_success(id).await?;
        }
        self.users.touch_last_login(user.id).await?;

        let user = self.require_user(user.id).await?;
        Ok(conversions::convert_to_domain_user(user))
    }

    /// Create a 30 day session for a user
    pub async fn create_session(
        &self,
        user_id: i64,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SessionInfo, AuthError> {
        let session = self
            .sessions
            .create_session(NewSessionRecord {
                user_id,
                session_token: random_hex(SESSION_TOKEN_BYTES),
                ip_address: ip_address.map(String::from),
                user_agent: user_agent.map(String::from),
                expires_at: Utc::now() + self.config.session_ttl,
            })
            .await?;

        debug!("Created session {} for user {}", session.id, user_id);
        Ok(SessionInfo {
            session_token: session.session_token,
            expires_at: session.expires_at,
        })
    }

    /// Look up the user behind an unexpired session
    pub async fn validate_session(&self, session_token: &str) -> Result<User, AuthError> {
        match self.sessions.find_valid_session(session_token, Utc::now()).await? {
            Some((_, user)) => Ok(conversions::convert_to_domain_user(user)),
            None => Err(AuthError::InvalidSession),
        }
    }

    pub async fn end_session(&self, session_token: &str) -> Result<bool, AuthError> {
        Ok(self.sessions.delete_session(session_token).await?)
    }

    /// Issue a signed token for a user
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        Ok(self.signer.issue(user.id, &user.username)?)
    }

    async fn complete_login(
        &self,
        user: User,
        method: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let session = self.create_session(user.id, ip_address, user_agent).await?;
        let access_token = self.issue_token(&user)?;
        log_successful_login(&user.username, method, ip_address, user_agent);

        Ok(LoginResponse {
            session_token: session.session_token,
            session_expires_at: session.expires_at,
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.signer.expires_in(),
            user,
        })
    }

    /// Verify credentials and open a session
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let user = self.verify_credentials(username_or_email, password, ip_address).await?;
        self.complete_login(user, "password", ip_address, user_agent).await
    }

    /// Open a session for an existing account without a password
    pub async fn login_with_email(
        &self,
        email: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let user = self.users.find_by_email(email).await?.ok_or(AuthError::UserNotFound)?;
        self.users.touch_last_login(user.id).await?;
        let user = conversions::convert_to_domain_user(self.require_user(user.id).await?);
        self.complete_login(user, "google", ip_address, user_agent).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.find_by_email(email).await?.map(conversions::convert_to_domain_user))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.users.username_exists(username).await?)
    }

    /// Create an account on behalf of an external identity provider
    pub async fn register_external_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        email_verified: bool,
    ) -> Result<i64, AuthError> {
        if self.users.email_exists(email).await? {
            return Err(AuthError::EmailTaken);
        }
        let salt = generate_salt();
        let user_id = self
            .insert_user(NewUserRecord {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password, &salt),
                salt,
                mobile: None,
                is_email_verified: email_verified,
                verification_code: None,
                verification_code_expiry: None,
            })
            .await?;

        log_auth_event(
            AuthEvent::new(AuthEventType::Registration, Some(username), true)
                .with_auth_method("google")
                .with_details(format!("user id {}", user_id)),
        );
        Ok(user_id)
    }

    /// Resolve a bearer credential to its user
    pub async fn authenticate(&self, token: &str) -> Result<(User, Credential), AuthError> {
        if looks_like_session_token(token) {
            let user = self.validate_session(token).await?;
            return Ok((user, Credential::Session));
        }

        let claims = self.signer.decode(token)?;
        if self.revoked.is_revoked(token) {
            return Err(TokenError::Revoked.into());
        }
        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::InvalidSession)?;
        Ok((conversions::convert_to_domain_user(user), Credential::Signed(claims)))
    }

    /// End a session or revoke a signed token
    pub async fn logout(&self, token: &str, user: &User, credential: &Credential) -> Result<(), AuthError> {
        match credential {
            Credential::Session => {
                self.end_session(token).await?;
            }
            Credential::Signed(claims) => {
                let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
                self.revoked.revoke(token, expires_at);
                log_auth_event(AuthEvent::new(AuthEventType::TokenRevocation, Some(&user.username), true));
            }
        }
        log_logout(&user.username);
        Ok(())
    }

    /// Replace the pending verification code of a user
    pub async fn generate_verification_code(&self, user_id: i64) -> Result<String, AuthError> {
        let code = generate_verification_code();
        let updated = self
            .users
            .set_verification_code(user_id, &code, Utc::now() + self.config.verification_ttl)
            .await?;
        if !updated {
            return Err(AuthError::UserNotFound);
        }
        Ok(code)
    }

    /// Send a fresh code by email or text
    pub async fn resend_verification(
        &self,
        user_id: i64,
        channel: VerificationChannel,
    ) -> Result<Delivery, AuthError> {
        let user = self.require_user(user_id).await?;
        if channel == VerificationChannel::Mobile && user.mobile.is_none() {
            return Err(AuthError::NoMobile);
        }

        let code = self.generate_verification_code(user_id).await?;
        match (channel, user.mobile) {
            (VerificationChannel::Mobile, Some(mobile)) => {
                Ok(self.notifier.send_verification_sms(&mobile, &code).await?)
            }
            _ => Ok(self.notifier.send_verification_email(&user.email, &code)),
        }
    }

    async fn check_code(&self, user_id: i64, code: &str) -> Result<UserRecord, AuthError> {
        let user = self.require_user(user_id).await?;

        if user.verification_code.as_deref() != Some(code.trim()) {
            return Err(AuthError::InvalidCode);
        }
        match user.verification_code_expiry {
            Some(expiry) if expiry >= Utc::now() => Ok(user),
            _ => Err(AuthError::CodeExpired),
        }
    }

    pub async fn verify_email(&self, user_id: i64, code: &str) -> Result<(), AuthError> {
        let user = self.check_code(user_id, code).await?;
        self.users.mark_email_verified(user_id).await?;
        log_auth_event(
            AuthEvent::new(AuthEventType::Verification, Some(&user.username), true).with_details("email"),
        );
        Ok(())
    }

    pub async fn verify_mobile(&self, user_id: i64, code: &str) -> Result<(), AuthError> {
        let user = self.check_code(user_id, code).await?;
        self.users.mark_mobile_verified(user_id).await?;
        log_auth_event(
            AuthEvent::new(AuthEventType::Verification, Some(&user.username), true).with_details("mobile"),
        );
        Ok(())
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, AuthError> {
        Ok(conversions::convert_to_domain_user(self.require_user(user_id).await?))
    }

    /// Change email, mobile or password
    pub async fn update_user(&self, user_id: i64, request: UpdateUserRequest) -> Result<User, AuthError> {
        let request = UpdateUserRequest {
            email: non_empty(request.email),
            mobile: non_empty(request.mobile),
            password: request.password.filter(|p| !p.is_empty()),
        };
        request
            .validate()
            .map_err(|e| AuthError::Validation(validation_message(&e)))?;

        let current = self.require_user(user_id).await?;
        if let Some(email) = &request.email {
            if email != &current.email && self.users.email_exists(email).await? {
                return Err(AuthError::EmailTaken);
            }
        }

        let changes = UserChanges {
            email: request.email,
            mobile: request.mobile,
            password: request.password.map(|password| {
                let salt = generate_salt();
                (hash_password(&password, &salt), salt)
            }),
        };

        if !changes.is_empty() {
            let updated = self.users.update_user(user_id, changes).await.map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => other.into(),
            })?;
            if !updated {
                return Err(AuthError::UserNotFound);
            }
            log_auth_event(AuthEvent::new(AuthEventType::AccountUpdate, Some(&current.username), true));
            info!("Updated account {}", user_id);
        }

        self.get_user(user_id).await
    }

    /// Most recent sessions of a user
    pub async fn login_history(&self, user_id: i64, limit: u32) -> Result<Vec<LoginHistoryEntry>, AuthError> {
        let sessions = self.sessions.sessions_for_user(user_id, limit).await?;
        Ok(sessions.into_iter().map(conversions::convert_to_domain_history).collect())
    }

    /// Remove sessions past their expiry and forget revoked tokens that have expired
    pub async fn purge_expired_sessions(&self) -> Result<usize, AuthError> {
        let pruned = self.revoked.cleanup_expired();
        if pruned > 0 {
            debug!("Pruned {} expired revocations", pruned);
        }
        Ok(self.sessions.delete_expired(Utc::now()).await?)
    }
}
