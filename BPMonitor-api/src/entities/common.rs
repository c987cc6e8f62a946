use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use bp_monitor_domain::auth::oauth::OAuthError;
use bp_monitor_domain::auth::{AuthError, TokenError};
use bp_monitor_domain::services::export::ExportError;
use bp_monitor_domain::services::ServiceError;
use bp_monitor_domain::sms::SmsError;

/// Error response format for the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    pub fn limit_reached(message: impl Into<String>) -> Self {
        Self::new("limit_reached", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("too_many_requests", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new("bad_gateway", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }

    pub fn internal_error() -> Self {
        Self::new("internal_error", "An unexpected error occurred")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "conflict" | "limit_reached" => StatusCode::CONFLICT,
            "too_many_requests" => StatusCode::TOO_MANY_REQUESTS,
            "bad_gateway" => StatusCode::BAD_GATEWAY,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ErrorResponse {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => Self::validation_error(msg),
            ServiceError::NotFound(msg) => Self::not_found(msg),
            ServiceError::LimitReached(msg) => Self::limit_reached(msg),
            ServiceError::Conflict(msg) => Self::conflict(msg),
            ServiceError::Repository(msg) => {
                error!("Service storage failure: {}", msg);
                Self::internal_error()
            }
        }
    }
}

impl From<SmsError> for ErrorResponse {
    fn from(err: SmsError) -> Self {
        match err {
            SmsError::NotConfigured => Self::service_unavailable(err.to_string()),
            SmsError::InvalidNumber(_) => Self::validation_error(err.to_string()),
            SmsError::Delivery(_) => Self::bad_gateway(err.to_string()),
        }
    }
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UsernameTaken | AuthError::EmailTaken => Self::conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidSession => Self::unauthorized(err.to_string()),
            AuthError::Token(TokenError::Signing(msg)) => {
                error!("Token signing failed: {}", msg);
                Self::internal_error()
            }
            AuthError::Token(_) => Self::unauthorized(err.to_string()),
            AuthError::TooManyAttempts => Self::too_many_requests(err.to_string()),
            AuthError::UserNotFound => Self::not_found(err.to_string()),
            AuthError::InvalidCode
            | AuthError::CodeExpired
            | AuthError::NoMobile
            | AuthError::Validation(_) => Self::validation_error(err.to_string()),
            AuthError::Sms(e) => e.into(),
            AuthError::Repository(_) => Self::internal_error(),
        }
    }
}

impl From<OAuthError> for ErrorResponse {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::NotConfigured => Self::service_unavailable(err.to_string()),
            OAuthError::TooManyPending => Self::too_many_requests(err.to_string()),
            OAuthError::Provider(_)
            | OAuthError::InvalidState
            | OAuthError::MissingCode
            | OAuthError::MissingEmail => Self::validation_error(err.to_string()),
            OAuthError::TokenExchange(_) | OAuthError::UserInfo(_) => Self::bad_gateway(err.to_string()),
            OAuthError::Config(msg) => {
                error!("Google sign-in misconfigured: {}", msg);
                Self::internal_error()
            }
            OAuthError::Auth(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ErrorResponse {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ErrorResponse {
    fn from(rejection: PathRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

/// `Json` extractor whose rejections are `ErrorResponse` bodies
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ErrorResponse))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections are `ErrorResponse` bodies
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ErrorResponse))]
pub struct ApiQuery<T>(pub T);

/// `Path` extractor whose rejections are `ErrorResponse` bodies
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ErrorResponse))]
pub struct ApiPath<T>(pub T);

impl From<ExportError> for ErrorResponse {
    fn from(err: ExportError) -> Self {
        error!("CSV export failed: {}", err);
        Self::internal_error()
    }
}

/// Outcome of an operation with nothing else to return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ErrorResponse::from(ServiceError::LimitReached("x".into())), StatusCode::CONFLICT),
            (ErrorResponse::from(ServiceError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (ErrorResponse::from(AuthError::TooManyAttempts), StatusCode::TOO_MANY_REQUESTS),
            (ErrorResponse::from(AuthError::Token(TokenError::Expired)), StatusCode::UNAUTHORIZED),
            (ErrorResponse::from(SmsError::Delivery("boom".into())), StatusCode::BAD_GATEWAY),
            (ErrorResponse::from(OAuthError::InvalidState), StatusCode::BAD_REQUEST),
            (ErrorResponse::from(OAuthError::TooManyPending), StatusCode::TOO_MANY_REQUESTS),
            (ErrorResponse::from(AuthError::Repository("disk".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (response, status) in cases {
            assert_eq!(response.status(), status, "{:?}", response);
        }
    }

    #[test]
    fn test_messages_are_preserved() {
        let response = ErrorResponse::from(AuthError::EmailTaken);
        assert_eq!(response.error, "conflict");
        assert_eq!(response.message, "Email already exists");

        let response = ErrorResponse::from(AuthError::Repository("disk full".into()));
        assert_eq!(response.message, "An unexpected error occurred");
    }
}
