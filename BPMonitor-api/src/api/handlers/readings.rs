use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{info, instrument, warn};

use bp_monitor_domain::auth::AuthenticatedUser;
use bp_monitor_domain::entities::{BloodPressureReading, CreateReadingRequest};

use crate::api::state::AppState;
use crate::entities::readings::{AlertRequest, AlertResponse, ReadingListParams};
use crate::entities::{ApiJson, ApiPath, ApiQuery, ErrorResponse, SuccessResponse};

/// Readings of one profile, newest first
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}/readings",
    params(("id" = i64, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Readings of the profile", body = [BloodPressureReading]),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
#[instrument(skip(state))]
pub async fn profile_readings(
    State(state): State<AppState>,
    ApiPath(profile_id): ApiPath<i64>,
) -> Result<Json<Vec<BloodPressureReading>>, ErrorResponse> {
    Ok(Json(state.readings.readings_for_profile(profile_id).await?))
}

/// Record a reading; its category is derived from the profile's gender and age
#[utoipa::path(
    post,
    path = "/api/v1/profiles/{id}/readings",
    params(("id" = i64, Path, description = "Profile id")),
    request_body = CreateReadingRequest,
    responses(
        (status = 201, description = "Reading recorded", body = BloodPressureReading),
        (status = 400, description = "Invalid reading", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
#[instrument(skip(state, request))]
pub async fn create_reading(
    State(state): State<AppState>,
    ApiPath(profile_id): ApiPath<i64>,
    ApiJson(request): ApiJson<CreateReadingRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let reading = state.readings.record_reading(profile_id, request).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}/readings/latest",
    params(("id" = i64, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Most recent reading", body = BloodPressureReading),
        (status = 404, description = "Profile not found or no readings yet", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
#[instrument(skip(state))]
pub async fn latest_reading(
    State(state): State<AppState>,
    ApiPath(profile_id): ApiPath<i64>,
) -> Result<Json<BloodPressureReading>, ErrorResponse> {
    state
        .readings
        .latest_reading(profile_id)
        .await?
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found("No readings recorded for this profile yet"))
}

/// Readings of every profile, or of one with `profile_id`
#[utoipa::path(
    get,
    path = "/api/v1/readings",
    params(ReadingListParams),
    responses(
        (status = 200, description = "Readings, newest first", body = [BloodPressureReading]),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
#[instrument(skip(state))]
pub async fn list_readings(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ReadingListParams>,
) -> Result<Json<Vec<BloodPressureReading>>, ErrorResponse> {
    let readings = match params.profile_id {
        Some(profile_id) => state.readings.readings_for_profile(profile_id).await?,
        None => state.readings.all_readings().await?,
    };
    Ok(Json(readings))
}

#[utoipa::path(
    delete,
    path = "/api/v1/readings/{id}",
    params(("id" = i64, Path, description = "Reading id")),
    responses(
        (status = 200, description = "Reading deleted", body = SuccessResponse),
        (status = 404, description = "Reading not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
#[instrument(skip(state))]
pub async fn delete_reading(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<SuccessResponse>, ErrorResponse> {
    state.readings.delete_reading(id).await?;
    Ok(Json(SuccessResponse::new("Reading deleted successfully")))
}

/// Text an alert about a reading
#[utoipa::path(
    post,
    path = "/api/v1/readings/{id}/alert",
    params(("id" = i64, Path, description = "Reading id")),
    request_body = AlertRequest,
    responses(
        (status = 200, description = "Alert sent", body = AlertResponse),
        (status = 400, description = "No mobile number to send to", body = ErrorResponse),
        (status = 404, description = "Reading not found", body = ErrorResponse),
        (status = 502, description = "SMS delivery failed", body = ErrorResponse),
        (status = 503, description = "SMS is not configured", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "readings"
)]
#[instrument(skip(state, caller, request), fields(user_id = caller.user.id))]
pub async fn send_alert(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<AlertRequest>,
) -> Result<Json<AlertResponse>, ErrorResponse> {
    let reading = state.readings.get_reading(id).await?;

    let mobile = request
        .mobile
        .filter(|m| !m.trim().is_empty())
        .or_else(|| caller.user.mobile.clone())
        .ok_or_else(|| ErrorResponse::validation_error("No mobile number on file"))?;

    if !reading.category.is_alarming() {
        warn!("Alert requested for reading {} categorized as {}", id, reading.category);
    }

    let receipt = state
        .notifier
        .send_alert(
            &mobile,
            &reading.profile_name,
            reading.systolic,
            reading.diastolic,
            reading.category.as_str(),
        )
        .await?;

    info!("Alert for reading {} sent: {}", id, receipt.sid);
    Ok(Json(AlertResponse {
        success: true,
        message: receipt.message.clone(),
        receipt,
    }))
}
