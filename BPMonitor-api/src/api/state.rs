use std::sync::Arc;

use tracing::{info, warn};

use bp_monitor_data::Database;
use bp_monitor_domain::auth::oauth::{GoogleOAuth, GoogleOAuthConfig};
use bp_monitor_domain::auth::{AuthConfig, AuthService, TokenConfig, TokenSigner};
use bp_monitor_domain::health::{HealthService, HealthServiceTrait};
use bp_monitor_domain::services::{
    create_default_profile_service, create_default_reading_service, ProfileServiceTrait,
    ReadingServiceTrait,
};
use bp_monitor_domain::sms::Notifier;

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub profiles: Arc<dyn ProfileServiceTrait>,
    pub readings: Arc<dyn ReadingServiceTrait>,
    pub health: Arc<dyn HealthServiceTrait>,
    pub notifier: Notifier,
    /// Absent when the Google client could not be built
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    /// Wire every service over `db` with explicit configuration
    pub fn new(
        db: Database,
        token_config: TokenConfig,
        auth_config: AuthConfig,
        notifier: Notifier,
        google_config: GoogleOAuthConfig,
    ) -> Self {
        let signer = TokenSigner::new(&token_config);
        let auth = AuthService::from_database(&db, signer, notifier.clone(), auth_config);

        let google = match GoogleOAuth::new(google_config) {
            Ok(client) => {
                if !client.is_configured() {
                    info!("Google sign-in disabled: GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set");
                }
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("Google sign-in unavailable: {}", e);
                None
            }
        };

        Self {
            auth: Arc::new(auth),
            profiles: Arc::new(create_default_profile_service(&db)),
            readings: Arc::new(create_default_reading_service(&db)),
            health: Arc::new(HealthService::new(db)),
            notifier,
            google,
        }
    }

    /// Configuration read from the environment
    pub fn from_env(db: Database) -> Self {
        Self::new(
            db,
            TokenConfig::from_env(),
            AuthConfig::from_env(),
            Notifier::from_env(),
            GoogleOAuthConfig::from_env(),
        )
    }
}
