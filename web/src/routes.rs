//! Router for the lifecycle API.

use crate::handlers::{analytics, events, health};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Build the API router.
///
/// # Routes
///
/// - `GET /api/health`
/// - `GET|POST /api/events`
/// - `GET /api/events/analytics`
/// - `GET|DELETE /api/events/:id`
/// - `POST /api/events/:id/checkin`
/// - `POST /api/events/:id/start-otp`, `/verify-start-otp`
/// - `POST /api/events/:id/setup-photos`
/// - `POST /api/events/:id/closing-otp`, `/verify-closing-otp`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/events",
            post(events::create_event).get(events::list_events),
        )
        .route("/events/analytics", get(analytics::get_analytics))
        .route(
            "/events/:id",
            get(events::get_event).delete(events::delete_event),
        )
        .route("/events/:id/checkin", post(events::check_in))
        .route("/events/:id/start-otp", post(events::start_otp))
        .route("/events/:id/verify-start-otp", post(events::verify_start_otp))
        .route("/events/:id/setup-photos", post(events::upload_setup_photos))
        .route("/events/:id/closing-otp", post(events::closing_otp))
        .route(
            "/events/:id/verify-closing-otp",
            post(events::verify_closing_otp),
        );

    Router::new().nest("/api", api_routes).with_state(state)
}
