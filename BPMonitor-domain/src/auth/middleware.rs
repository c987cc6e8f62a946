use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};
use crate::auth::service::{AuthService, Credential};
use crate::auth::token::{SignerKind, TokenClaims};
use crate::entities::User;

/// Which kind of bearer credential authenticated a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    Signed,
}

impl AuthMethod {
    fn label(self, kind: SignerKind) -> &'static str {
        match (self, kind) {
            (AuthMethod::Session, _) => "session",
            (AuthMethod::Signed, SignerKind::Jwt) => "jwt",
            (AuthMethod::Signed, SignerKind::Fallback) => "fallback",
        }
    }
}

/// The caller of an authenticated request, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub method: AuthMethod,
    /// The raw bearer credential
    pub token: String,
    /// Claims when a signed token was used
    pub claims: Option<TokenClaims>,
}

impl AuthenticatedUser {
    pub fn credential(&self) -> Credential {
        match &self.claims {
            Some(claims) => Credential::Signed(claims.clone()),
            None => Credential::Session,
        }
    }
}

/// Best-effort client address from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err("Authorization header does not contain Bearer token"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized", "message": message })),
    )
        .into_response()
}

/// Authentication middleware for protected routes
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let request_path = req.uri().path().to_string();
    let start_time = Instant::now();
    let ip = client_ip(req.headers());

    let token = match bearer_token(req.headers()) {
        Ok(token) => token.to_string(),
        Err(reason) => {
            debug!("Rejecting {}: {}", request_path, reason);
            log_auth_event(
                AuthEvent::new(AuthEventType::TokenValidation, None, false)
                    .with_details(reason)
                    .with_resource(request_path)
                    .with_optional_ip(ip.as_deref())
                    .with_duration(start_time.elapsed().as_millis() as u64),
            );
            return unauthorized(reason);
        }
    };

    match auth.authenticate(&token).await {
        Ok((user, credential)) => {
            let (method, claims) = match credential {
                Credential::Session => (AuthMethod::Session, None),
                Credential::Signed(claims) => (AuthMethod::Signed, Some(claims)),
            };

            log_auth_event(
                AuthEvent::new(AuthEventType::TokenValidation, Some(&user.username), true)
                    .with_resource(request_path)
                    .with_optional_ip(ip.as_deref())
                    .with_duration(start_time.elapsed().as_millis() as u64)
                    .with_auth_method(method.label(auth.signer().kind())),
            );

            req.extensions_mut().insert(AuthenticatedUser {
                user,
                method,
                token,
                claims,
            });
            next.run(req).await
        }
        Err(e) => {
            warn!("Authentication failed for {}: {}", request_path, e);
            let message = e.to_string();
            log_auth_event(
                AuthEvent::new(AuthEventType::TokenValidation, None, false)
                    .with_details(message.clone())
                    .with_resource(request_path)
                    .with_optional_ip(ip.as_deref())
                    .with_duration(start_time.elapsed().as_millis() as u64),
            );
            unauthorized(&message)
        }
    }
}

fn allowed_origins() -> AllowOrigin {
    let configured = env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default();
    let origins: Vec<HeaderValue> = configured
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    }
}

/// Add CORS and security headers to the application
pub fn configure_auth(app: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
        ));

    app.layer(cors).layer(security_headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err("Missing Authorization header"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(
            bearer_token(&headers),
            Err("Authorization header does not contain Bearer token")
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Ok("abc.def"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_method_labels() {
        assert_eq!(AuthMethod::Session.label(SignerKind::Jwt), "session");
        assert_eq!(AuthMethod::Signed.label(SignerKind::Fallback), "fallback");
    }
}
