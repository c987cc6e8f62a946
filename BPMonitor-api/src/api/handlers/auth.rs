use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use tracing::{info, instrument};

use bp_monitor_domain::auth::middleware::{client_ip, user_agent};
use bp_monitor_domain::auth::oauth::{login_or_register_with_google, CallbackParams, OAuthError};
use bp_monitor_domain::auth::{
    AuthenticatedUser, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
    ResendCodeRequest, UpdateUserRequest, VerificationChannel, VerifyCodeRequest,
};
use bp_monitor_domain::entities::{LoginHistoryEntry, User};

use crate::api::state::AppState;
use crate::entities::auth::{GoogleLoginResponse, HistoryParams};
use crate::entities::{ApiJson, ApiQuery, ErrorResponse};

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; a verification code was sent", body = RegisterResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Username or email already exists", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let registration = state.auth.register_user(request).await?;
    info!("Registered user {}", registration.user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user_id: registration.user_id,
            message: "Registration successful. Please check your email for the verification code.".to_string(),
        }),
    ))
}

/// Log in with a username or email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful. Use either token as 'Bearer {token}'.", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(state, headers, request))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ErrorResponse> {
    let ip = client_ip(&headers);
    let agent = user_agent(&headers);

    let response = state
        .auth
        .login(&request.username, &request.password, ip.as_deref(), agent.as_deref())
        .await?;
    Ok(Json(response))
}

/// Start Google sign-in
#[utoipa::path(
    get,
    path = "/api/v1/auth/google/login",
    responses(
        (status = 200, description = "Authorization URL", body = GoogleLoginResponse),
        (status = 503, description = "Google sign-in is not configured", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn google_login(State(state): State<AppState>) -> Result<Json<GoogleLoginResponse>, ErrorResponse> {
    let google = state.google.as_ref().ok_or(OAuthError::NotConfigured)?;
    let auth_url = google.authorization_url()?;
    Ok(Json(GoogleLoginResponse { auth_url }))
}

/// Google redirect target
#[utoipa::path(
    get,
    path = "/api/v1/auth/google/callback",
    params(CallbackParams),
    responses(
        (status = 200, description = "Signed in with Google", body = LoginResponse),
        (status = 400, description = "Provider error or invalid state", body = ErrorResponse),
        (status = 502, description = "Google could not be reached", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(state, headers, params))]
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<CallbackParams>,
) -> Result<Json<LoginResponse>, ErrorResponse> {
    let google = state.google.as_ref().ok_or(OAuthError::NotConfigured)?;
    let user_info = google.handle_callback(&params).await?;

    let ip = client_ip(&headers);
    let agent = user_agent(&headers);
    let response = login_or_register_with_google(&state.auth, &user_info, ip.as_deref(), agent.as_deref()).await?;
    Ok(Json(response))
}

/// The signed-in account
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current account", body = User),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller), fields(user_id = caller.user.id))]
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<User>, ErrorResponse> {
    Ok(Json(state.auth.get_user(caller.user.id).await?))
}

/// Change email, mobile number or password
#[utoipa::path(
    put,
    path = "/api/v1/auth/me",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = User),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<User>, ErrorResponse> {
    Ok(Json(state.auth.update_user(caller.user.id, request).await?))
}

/// End the session or revoke the signed token used for this request
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller), fields(user_id = caller.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    state
        .auth
        .logout(&caller.token, &caller.user, &caller.credential())
        .await?;
    Ok(Json(MessageResponse::ok("Logged out successfully")))
}

/// Confirm the email address with the emailed code
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify/email",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.user.id))]
pub async fn verify_email(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<VerifyCodeRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    state.auth.verify_email(caller.user.id, &request.code).await?;
    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

/// Confirm the mobile number with the texted code
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify/mobile",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Mobile number verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.user.id))]
pub async fn verify_mobile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<VerifyCodeRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    state.auth.verify_mobile(caller.user.id, &request.code).await?;
    Ok(Json(MessageResponse::ok("Mobile number verified successfully")))
}

/// Send a fresh verification code
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify/resend",
    request_body = ResendCodeRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "No mobile number on file", body = ErrorResponse),
        (status = 502, description = "SMS delivery failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.user.id))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<ResendCodeRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    state.auth.resend_verification(caller.user.id, request.channel).await?;

    let message = match request.channel {
        VerificationChannel::Email => "Verification code sent to your email",
        VerificationChannel::Mobile => "Verification code sent to your mobile number",
    };
    Ok(Json(MessageResponse::ok(message)))
}

/// Recent sessions of the signed-in account
#[utoipa::path(
    get,
    path = "/api/v1/auth/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Most recent sessions first", body = [LoginHistoryEntry]),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, caller), fields(user_id = caller.user.id))]
pub async fn login_history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<Vec<LoginHistoryEntry>>, ErrorResponse> {
    Ok(Json(state.auth.login_history(caller.user.id, params.limit()).await?))
}
