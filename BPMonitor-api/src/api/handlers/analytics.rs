use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Local;
use tracing::{info, instrument};

use bp_monitor_domain::entities::AnalyticsQuery;
use bp_monitor_domain::services::charts::ChartBundle;
use bp_monitor_domain::services::export::{export_csv, export_filename};
use bp_monitor_domain::services::insights::{category_guides, educational_info, CategoryGuide, EducationalInfo};

use crate::api::state::AppState;
use crate::entities::readings::StatisticsResponse;
use crate::entities::{ApiQuery, ErrorResponse};

/// Summary statistics over a time range
#[utoipa::path(
    get,
    path = "/api/v1/analytics/statistics",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Statistics; `statistics` is null when there are no readings", body = StatisticsResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "analytics"
)]
#[instrument(skip(state))]
pub async fn statistics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<StatisticsResponse>, ErrorResponse> {
    let statistics = state.readings.statistics(&query).await?;
    Ok(Json(StatisticsResponse {
        profile_id: query.profile_id,
        range: query.range,
        statistics,
    }))
}

/// Trend and category distribution chart data
#[utoipa::path(
    get,
    path = "/api/v1/analytics/charts",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Chart data", body = ChartBundle),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "analytics"
)]
#[instrument(skip(state))]
pub async fn charts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ChartBundle>, ErrorResponse> {
    Ok(Json(state.readings.charts(&query).await?))
}

/// Download the selected readings as CSV
#[utoipa::path(
    get,
    path = "/api/v1/export/csv",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "analytics"
)]
#[instrument(skip(state))]
pub async fn export_readings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let readings = state.readings.export_readings(&query).await?;
    let csv = export_csv(&readings)?;
    let filename = export_filename(&Local::now());
    info!("Exporting {} readings as {}", readings.len(), filename);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        csv,
    ))
}

/// Background reading about blood pressure
#[utoipa::path(
    get,
    path = "/api/v1/education",
    responses(
        (status = 200, description = "Educational content", body = EducationalInfo),
    ),
    tag = "education"
)]
pub async fn education() -> Json<EducationalInfo> {
    Json(educational_info())
}

/// Reference ranges, colors and advice for each category
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Category reference table", body = [CategoryGuide]),
    ),
    tag = "education"
)]
pub async fn categories() -> Json<Vec<CategoryGuide>> {
    Json(category_guides())
}
