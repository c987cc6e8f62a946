use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Types of authentication events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventType {
    /// User login attempt
    Login,
    /// User logout
    Logout,
    /// User registration
    Registration,
    /// Failed login attempt
    FailedLogin,
    /// Login refused because of too many failures
    Lockout,
    /// Email or mobile verification
    Verification,
    /// Account details changed
    AccountUpdate,
    /// Google OAuth callback
    OAuthCallback,
    /// Session or signed token check
    TokenValidation,
    /// Signed token revoked at logout
    TokenRevocation,
}

impl AuthEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventType::Login => "LOGIN",
            AuthEventType::Logout => "LOGOUT",
            AuthEventType::Registration => "REGISTRATION",
            AuthEventType::FailedLogin => "FAILED_LOGIN",
            AuthEventType::Lockout => "LOCKOUT",
            AuthEventType::Verification => "VERIFICATION",
            AuthEventType::AccountUpdate => "ACCOUNT_UPDATE",
            AuthEventType::OAuthCallback => "OAUTH_CALLBACK",
            AuthEventType::TokenValidation => "TOKEN_VALIDATION",
            AuthEventType::TokenRevocation => "TOKEN_REVOCATION",
        }
    }
}

impl fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    pub event_type: AuthEventType,
    /// Username or user id, when known
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub details: Option<String>,
    /// The resource being accessed (if applicable)
    pub resource: Option<String>,
    /// Duration of the operation in milliseconds (if applicable)
    pub duration_ms: Option<u64>,
    /// password, session, jwt, fallback or google
    pub auth_method: Option<String>,
}

impl AuthEvent {
    pub fn new(event_type: AuthEventType, user: Option<&str>, success: bool) -> Self {
        Self {
            event_type,
            user: user.map(String::from),
            timestamp: Utc::now(),
            ip_address: None,
            user_agent: None,
            success,
            details: None,
            resource: None,
            duration_ms: None,
            auth_method: None,
        }
    }

    /// Client address, when the request carried one
    pub fn with_optional_ip(mut self, ip: Option<&str>) -> Self {
        self.ip_address = ip.map(String::from);
        self
    }

    pub fn with_optional_user_agent(mut self, user_agent: Option<&str>) -> Self {
        self.user_agent = user_agent.map(String::from);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }

    /// One-line rendering used in the log
    pub fn summary(&self) -> String {
        format!(
            "AUTH-LOG [{}] [{}] [{}] [{}] {}",
            self.event_type,
            self.user.as_deref().unwrap_or("anonymous"),
            if self.success { "SUCCESS" } else { "FAILURE" },
            self.ip_address.as_deref().unwrap_or("-"),
            self.details.as_deref().unwrap_or("")
        )
    }
}

/// Emit an event at info level on success, warn otherwise
pub fn log_auth_event(event: AuthEvent) {
    let method = event.auth_method.as_deref().unwrap_or("");
    let resource = event.resource.as_deref().unwrap_or("");
    let line = event.summary();

    if event.success {
        info!(method, resource, "{}", line);
    } else {
        warn!(method, resource, "{}", line);
    }
}

pub fn log_successful_login(user: &str, method: &str, ip_address: Option<&str>, user_agent: Option<&str>) {
    log_auth_event(
        AuthEvent::new(AuthEventType::Login, Some(user), true)
            .with_auth_method(method)
            .with_optional_ip(ip_address)
            .with_optional_user_agent(user_agent),
    );
}

/// Password logins only; provider failures are logged as OAuth callbacks
pub fn log_failed_login(user: &str, ip_address: Option<&str>, reason: &str) {
    log_auth_event(
        AuthEvent::new(AuthEventType::FailedLogin, Some(user), false)
            .with_details(reason)
            .with_auth_method("password")
            .with_optional_ip(ip_address),
    );
}

pub fn log_logout(user: &str) {
    log_auth_event(AuthEvent::new(AuthEventType::Logout, Some(user), true));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_auth_event() {
        let event = AuthEvent::new(AuthEventType::Login, Some("user123"), true)
            .with_optional_ip(Some("192.168.1.1"))
            .with_optional_user_agent(Some("Mozilla/5.0"))
            .with_details("Login from dashboard")
            .with_resource("/api/v1/profiles")
            .with_duration(150)
            .with_auth_method("password");

        assert_eq!(event.event_type, AuthEventType::Login);
        assert_eq!(event.user, Some("user123".to_string()));
        assert!(event.success);
        assert_eq!(event.ip_address, Some("192.168.1.1".to_string()));
        assert_eq!(event.user_agent, Some("Mozilla/5.0".to_string()));
        assert_eq!(event.resource, Some("/api/v1/profiles".to_string()));
        assert_eq!(event.duration_ms, Some(150));
        assert_eq!(event.auth_method, Some("password".to_string()));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(AuthEventType::Login.to_string(), "LOGIN");
        assert_eq!(AuthEventType::FailedLogin.to_string(), "FAILED_LOGIN");
        assert_eq!(AuthEventType::OAuthCallback.to_string(), "OAUTH_CALLBACK");
    }

    #[test]
    fn test_summary_line() {
        let event = AuthEvent::new(AuthEventType::FailedLogin, None, false)
            .with_optional_ip(Some("10.1.1.1"))
            .with_details("Invalid username/email or password");
        assert_eq!(
            event.summary(),
            "AUTH-LOG [FAILED_LOGIN] [anonymous] [FAILURE] [10.1.1.1] Invalid username/email or password"
        );
    }
}
