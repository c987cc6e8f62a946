use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

/// Registers the bearer scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Session token or signed access token"))
                        .build(),
                ),
            );
        }
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Auth endpoints
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::google_login,
        crate::api::handlers::auth::google_callback,
        crate::api::handlers::auth::me,
        crate::api::handlers::auth::update_me,
        crate::api::handlers::auth::logout,
        crate::api::handlers::auth::verify_email,
        crate::api::handlers::auth::verify_mobile,
        crate::api::handlers::auth::resend_verification,
        crate::api::handlers::auth::login_history,

        // Profile endpoints
        crate::api::handlers::profiles::list_profiles,
        crate::api::handlers::profiles::create_profile,
        crate::api::handlers::profiles::get_profile,
        crate::api::handlers::profiles::update_profile,
        crate::api::handlers::profiles::delete_profile,

        // Reading endpoints
        crate::api::handlers::readings::profile_readings,
        crate::api::handlers::readings::create_reading,
        crate::api::handlers::readings::latest_reading,
        crate::api::handlers::readings::list_readings,
        crate::api::handlers::readings::delete_reading,
        crate::api::handlers::readings::send_alert,

        // Analytics and education
        crate::api::handlers::analytics::statistics,
        crate::api::handlers::analytics::charts,
        crate::api::handlers::analytics::export_readings,
        crate::api::handlers::analytics::education,
        crate::api::handlers::analytics::categories,
    ),
    components(
        schemas(
            crate::entities::ErrorResponse,
            crate::entities::SuccessResponse,
            crate::entities::auth::GoogleLoginResponse,
            crate::entities::readings::StatisticsResponse,
            crate::entities::readings::AlertRequest,
            crate::entities::readings::AlertResponse,

            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentStatus,
            crate::api::handlers::health::ComponentHealthStatus,

            bp_monitor_domain::auth::RegisterRequest,
            bp_monitor_domain::auth::RegisterResponse,
            bp_monitor_domain::auth::LoginRequest,
            bp_monitor_domain::auth::LoginResponse,
            bp_monitor_domain::auth::UpdateUserRequest,
            bp_monitor_domain::auth::VerificationChannel,
            bp_monitor_domain::auth::VerifyCodeRequest,
            bp_monitor_domain::auth::ResendCodeRequest,
            bp_monitor_domain::auth::MessageResponse,

            bp_monitor_domain::entities::User,
            bp_monitor_domain::entities::LoginHistoryEntry,
            bp_monitor_domain::entities::Profile,
            bp_monitor_domain::entities::ProfileRequest,
            bp_monitor_domain::entities::Gender,
            bp_monitor_domain::entities::BloodPressureCategory,
            bp_monitor_domain::entities::BloodPressureReading,
            bp_monitor_domain::entities::CreateReadingRequest,
            bp_monitor_domain::entities::CategoryCount,
            bp_monitor_domain::entities::ReadingStatistics,
            bp_monitor_domain::entities::TimeRange,

            bp_monitor_domain::services::charts::ChartBundle,
            bp_monitor_domain::services::charts::TrendChart,
            bp_monitor_domain::services::charts::DistributionChart,
            bp_monitor_domain::services::charts::ChartSeries,
            bp_monitor_domain::services::charts::ChartPoint,
            bp_monitor_domain::services::charts::ChartAxis,
            bp_monitor_domain::services::charts::ReferenceLine,
            bp_monitor_domain::services::charts::AxisRange,
            bp_monitor_domain::services::insights::CategoryGuide,
            bp_monitor_domain::services::insights::EducationalInfo,
            bp_monitor_domain::services::insights::Tip,
            bp_monitor_domain::sms::SmsReceipt,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "auth", description = "Accounts, sessions and verification"),
        (name = "profiles", description = "People whose blood pressure is tracked"),
        (name = "readings", description = "Blood pressure readings and SMS alerts"),
        (name = "analytics", description = "Statistics, charts and CSV export"),
        (name = "education", description = "Reference material about blood pressure")
    ),
    info(
        title = "BP Monitor API",
        version = "0.1.0",
        description = "Blood pressure tracking for up to five profiles",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_doc_generation() {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "BP Monitor API");
        assert_eq!(openapi.info.version, "0.1.0");

        let tags = openapi.tags.as_ref().expect("tags defined");
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "readings"));

        let paths = &openapi.paths.paths;
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/api/v1/auth/login"));
        assert!(paths.contains_key("/api/v1/profiles/{id}/readings"));
        assert!(paths.contains_key("/api/v1/analytics/statistics"));
        assert!(paths.contains_key("/api/v1/export/csv"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.expect("components defined");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
