use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument};

use bp_monitor_domain::entities::{Profile, ProfileRequest};

use crate::api::state::AppState;
use crate::entities::{ApiJson, ApiPath, ErrorResponse, SuccessResponse};

/// List every profile, ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    responses(
        (status = 200, description = "All profiles", body = [Profile]),
    ),
    security(("bearer" = [])),
    tag = "profiles"
)]
#[instrument(skip(state))]
pub async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, ErrorResponse> {
    Ok(Json(state.profiles.list_profiles().await?))
}

/// Create a profile (at most five exist)
#[utoipa::path(
    post,
    path = "/api/v1/profiles",
    request_body = ProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = Profile),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Maximum number of profiles reached", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profiles"
)]
#[instrument(skip(state, request))]
pub async fn create_profile(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let profile = state.profiles.create_profile(request).await?;
    info!("Created profile {}", profile.id);
    Ok((StatusCode::CREATED, Json(profile)))
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}",
    params(("id" = i64, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Profile found", body = Profile),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profiles"
)]
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Profile>, ErrorResponse> {
    Ok(Json(state.profiles.get_profile(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/{id}",
    params(("id" = i64, Path, description = "Profile id")),
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profiles"
)]
#[instrument(skip(state, request))]
pub async fn update_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<Json<Profile>, ErrorResponse> {
    Ok(Json(state.profiles.update_profile(id, request).await?))
}

/// Delete a profile together with its readings
#[utoipa::path(
    delete,
    path = "/api/v1/profiles/{id}",
    params(("id" = i64, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Profile deleted", body = SuccessResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profiles"
)]
#[instrument(skip(state))]
pub async fn delete_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<SuccessResponse>, ErrorResponse> {
    state.profiles.delete_profile(id).await?;
    info!("Deleted profile {}", id);
    Ok(Json(SuccessResponse::new("Profile deleted successfully")))
}
