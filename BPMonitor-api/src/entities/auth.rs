use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Where to send the browser to sign in with Google
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GoogleLoginResponse {
    pub auth_url: String,
}

/// Query parameters for the login history
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Number of sessions to return (default: 10, max: 100)
    pub limit: Option<u32>,
}

impl HistoryParams {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}
