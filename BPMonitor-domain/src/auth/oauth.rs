//! Google sign-in
//!
//! Authorization code flow through the `oauth2` crate. The CSRF `state`
//! handed to Google is remembered for a few minutes and must come back on
//! the callback, after which the profile is fetched from the userinfo
//! endpoint and mapped onto a local account.

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};
use crate::auth::password::generate_random_password;
use crate::auth::service::{AuthError, AuthService};
use crate::auth::LoginResponse;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/api/v1/auth/google/callback";

/// How long an issued `state` stays redeemable
const STATE_TTL: Duration = Duration::from_secs(600);

/// Unredeemed states held at once before new sign-ins are refused
const MAX_PENDING_STATES: usize = 1_000;

/// Length of the password given to accounts created through Google
const GENERATED_PASSWORD_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Google sign-in is not configured")]
    NotConfigured,

    #[error("Authentication error: {0}")]
    Provider(String),

    #[error("Invalid OAuth state")]
    InvalidState,

    #[error("Too many Google sign-ins in progress. Please try again later.")]
    TooManyPending,

    #[error("Missing authorization code")]
    MissingCode,

    #[error("Failed to exchange code for token: {0}")]
    TokenExchange(String),

    #[error("Failed to get user info: {0}")]
    UserInfo(String),

    #[error("No email provided by Google")]
    MissingEmail,

    #[error("Invalid OAuth configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Google client settings from environment variables
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub userinfo_url: String,
}

impl GoogleOAuthConfig {
    pub fn from_env() -> Self {
        Self {
            client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| {
                debug!("GOOGLE_REDIRECT_URI not set - using localhost default.");
                DEFAULT_REDIRECT_URI.to_string()
            }),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Query string of the provider redirect
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied access
    pub error: Option<String>,
}

/// Profile returned by the userinfo endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct GoogleUserInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub locale: Option<String>,
    #[serde(default)]
    pub verified_email: bool,
}

/// States handed out with authorization URLs that have not come back yet
#[derive(Debug)]
pub struct PendingStates {
    ttl: Duration,
    capacity: usize,
    states: Mutex<HashMap<String, Instant>>,
}

impl PendingStates {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_PENDING_STATES)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Remember a state; expired states are swept first and a full map
    /// refuses new ones rather than dropping live ones
    pub fn insert(&self, state: &str) -> Result<(), OAuthError> {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let ttl = self.ttl;
        states.retain(|_, issued| issued.elapsed() < ttl);
        if states.len() >= self.capacity {
            warn!("{} OAuth states pending, refusing a new sign-in", states.len());
            return Err(OAuthError::TooManyPending);
        }

        states.insert(state.to_string(), Instant::now());
        Ok(())
    }

    /// Consume a state; true when it was issued and has not expired
    pub fn take(&self, state: &str) -> bool {
        match self.states.lock() {
            Ok(mut states) => states
                .remove(state)
                .map(|issued| issued.elapsed() < self.ttl)
                .unwrap_or(false),
            Err(e) => {
                error!("Failed to acquire OAuth state lock: {}", e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.states.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Google authorization code client
pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    client: BasicClient,
    http: reqwest::Client,
    pending: PendingStates,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, OAuthError> {
        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| OAuthError::Config(e.to_string()))?;
        let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
            .map_err(|e| OAuthError::Config(e.to_string()))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| OAuthError::Config(format!("GOOGLE_REDIRECT_URI: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url);

        Ok(Self {
            config,
            client,
            http: reqwest::Client::new(),
            pending: PendingStates::new(STATE_TTL),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn pending_states(&self) -> &PendingStates {
        &self.pending
    }

    /// URL to send the browser to; its `state` is remembered for the callback
    pub fn authorization_url(&self) -> Result<String, OAuthError> {
        if !self.is_configured() {
            return Err(OAuthError::NotConfigured);
        }

        let (url, state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        self.pending.insert(state.secret())?;
        Ok(url.to_string())
    }

    /// Trade an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                error!("Google token exchange failed: {}", e);
                OAuthError::TokenExchange(e.to_string())
            })?;

        Ok(token.access_token().secret().clone())
    }

    pub async fn fetch_user_info(&self, access_token: &str) -> Result<GoogleUserInfo, OAuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Google userinfo request failed: {} {}", status, body);
            return Err(OAuthError::UserInfo(status.to_string()));
        }

        response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))
    }

    /// Check the redirect parameters, then exchange the code and fetch the profile
    pub async fn handle_callback(&self, params: &CallbackParams) -> Result<GoogleUserInfo, OAuthError> {
        let code = self.check_callback(params)?;
        let access_token = self.exchange_code(code).await?;
        self.fetch_user_info(&access_token).await
    }

    fn check_callback<'a>(&self, params: &'a CallbackParams) -> Result<&'a str, OAuthError> {
        if let Some(error) = &params.error {
            log_auth_event(
                AuthEvent::new(AuthEventType::OAuthCallback, None, false)
                    .with_auth_method("google")
                    .with_details(error.clone()),
            );
            return Err(OAuthError::Provider(error.clone()));
        }

        let state = params.state.as_deref().ok_or(OAuthError::InvalidState)?;
        if !self.pending.take(state) {
            warn!("OAuth callback with unknown or expired state");
            return Err(OAuthError::InvalidState);
        }

        params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(OAuthError::MissingCode)
    }
}

/// Local part of an email plus a random four digit suffix
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    format!("{}_{}", local, OsRng.gen_range(1000..=9999))
}

/// Log in the account with the Google email, creating it on first sign-in
pub async fn login_or_register_with_google(
    auth: &AuthService,
    user_info: &GoogleUserInfo,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<LoginResponse, OAuthError> {
    let email = user_info
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(OAuthError::MissingEmail)?;

    if auth.find_user_by_email(email).await?.is_none() {
        let mut username = username_from_email(email);
        for _ in 0..5 {
            if !auth.username_exists(&username).await? {
                break;
            }
            username = username_from_email(email);
        }

        let password = generate_random_password(GENERATED_PASSWORD_LENGTH);
        let user_id = auth
            .register_external_user(&username, email, &password, user_info.verified_email)
            .await?;
        info!("Created account {} for Google user", user_id);
    }

    let login = auth.login_with_email(email, ip_address, user_agent).await?;
    log_auth_event(
        AuthEvent::new(AuthEventType::OAuthCallback, Some(&login.user.username), true)
            .with_auth_method("google")
            .with_optional_ip(ip_address),
    );
    Ok(login)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::service::AuthConfig;
    use crate::auth::token::{SignerKind, TokenConfig, TokenSigner};
    use crate::sms::Notifier;
    use bp_monitor_data::Database;

    fn configured() -> GoogleOAuth {
        GoogleOAuth::new(GoogleOAuthConfig {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:3000/api/v1/auth/google/callback".to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        })
        .unwrap()
    }

    fn auth_service() -> (AuthService, Database) {
        let db = Database::in_memory().unwrap();
        let signer = TokenSigner::new(&TokenConfig {
            secret: "oauth-test".to_string(),
            expiry: chrono::Duration::hours(1),
            kind: SignerKind::Jwt,
        });
        let auth = AuthService::from_database(&db, signer, Notifier::log_only(), AuthConfig::default());
        (auth, db)
    }

    #[test]
    fn test_authorization_url_parameters() {
        let oauth = configured();
        let url = oauth.authorization_url().unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(oauth.pending_states().len(), 1);
        assert!(oauth.pending_states().take(&params["state"]));
    }

    #[test]
    fn test_unconfigured_client_refuses() {
        let oauth = GoogleOAuth::new(GoogleOAuthConfig {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        })
        .unwrap();
        assert!(matches!(oauth.authorization_url(), Err(OAuthError::NotConfigured)));
    }

    #[test]
    fn test_callback_checks() {
        let oauth = configured();

        let err = oauth
            .check_callback(&CallbackParams {
                error: Some("access_denied".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: access_denied");

        let err = oauth
            .check_callback(&CallbackParams {
                code: Some("abc".to_string()),
                state: Some("forged".to_string()),
                error: None,
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid OAuth state");

        oauth.pending_states().insert("good").unwrap();
        let params = CallbackParams {
            code: Some("abc".to_string()),
            state: Some("good".to_string()),
            error: None,
        };
        let code = oauth.check_callback(&params).unwrap();
        assert_eq!(code, "abc");

        // A state can only be redeemed once
        assert!(!oauth.pending_states().take("good"));
    }

    #[test]
    fn test_expired_state_is_rejected() {
        let states = PendingStates::new(Duration::from_millis(0));
        states.insert("stale").unwrap();
        assert!(!states.take("stale"));
    }

    #[test]
    fn test_pending_states_are_bounded() {
        let states = PendingStates::with_capacity(STATE_TTL, 2);
        states.insert("one").unwrap();
        states.insert("two").unwrap();

        assert!(matches!(states.insert("three"), Err(OAuthError::TooManyPending)));
        assert_eq!(states.len(), 2);
        assert!(states.take("one"));

        // Redeeming a state frees its slot
        states.insert("three").unwrap();
        assert!(states.take("three"));
    }

    #[test]
    fn test_expired_states_free_capacity() {
        let states = PendingStates::with_capacity(Duration::from_millis(0), 1);
        states.insert("stale").unwrap();
        states.insert("fresh").unwrap();
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn test_username_from_email() {
        let name = username_from_email("jane.doe@gmail.com");
        let (local, suffix) = name.rsplit_once('_').unwrap();
        assert_eq!(local, "jane.doe");
        let n: u32 = suffix.parse().unwrap();
        assert!((1000..=9999).contains(&n));
    }

    #[tokio::test]
    async fn test_first_google_login_creates_verified_account() {
        let (auth, _db) = auth_service();
        let info = GoogleUserInfo {
            email: Some("pat@gmail.com".to_string()),
            verified_email: true,
            ..Default::default()
        };

        let first = login_or_register_with_google(&auth, &info, Some("1.1.1.1"), None).await.unwrap();
        assert!(first.user.username.starts_with("pat_"));
        assert!(first.user.is_email_verified);

        let second = login_or_register_with_google(&auth, &info, None, None).await.unwrap();
        assert_eq!(second.user.id, first.user.id);
        assert_ne!(second.session_token, first.session_token);
    }

    #[tokio::test]
    async fn test_google_login_without_email() {
        let (auth, _db) = auth_service();
        let err = login_or_register_with_google(&auth, &GoogleUserInfo::default(), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No email provided by Google");
    }
}
