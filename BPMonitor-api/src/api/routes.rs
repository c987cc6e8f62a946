use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use bp_monitor_domain::auth::{auth_middleware, configure_auth};

use crate::api::handlers::{analytics, auth, health, profiles, readings};
use crate::api::state::AppState;
use crate::openapi::configure_swagger_routes;

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");

    // Routes reachable without a token
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/google/login", get(auth::google_login))
        .route("/auth/google/callback", get(auth::google_callback))
        .route("/education", get(analytics::education))
        .route("/categories", get(analytics::categories));

    debug!("Public routes configured");

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify/email", post(auth::verify_email))
        .route("/auth/verify/mobile", post(auth::verify_mobile))
        .route("/auth/verify/resend", post(auth::resend_verification))
        .route("/auth/history", get(auth::login_history))
        .route("/profiles", get(profiles::list_profiles).post(profiles::create_profile))
        .route(
            "/profiles/:id",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        )
        .route(
            "/profiles/:id/readings",
            get(readings::profile_readings).post(readings::create_reading),
        )
        .route("/profiles/:id/readings/latest", get(readings::latest_reading))
        .route("/readings", get(readings::list_readings))
        .route("/readings/:id", delete(readings::delete_reading))
        .route("/readings/:id/alert", post(readings::send_alert))
        .route("/analytics/statistics", get(analytics::statistics))
        .route("/analytics/charts", get(analytics::charts))
        .route("/export/csv", get(analytics::export_readings))
        .route_layer(middleware::from_fn_with_state(state.auth.clone(), auth_middleware));

    debug!("Protected routes configured");

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", public_routes.merge(protected_routes))
        .with_state(state)
        .merge(configure_swagger_routes());

    debug!("Swagger UI merged");

    let app = configure_auth(app).layer(TraceLayer::new_for_http());
    debug!("Security configuration applied");

    app
}
