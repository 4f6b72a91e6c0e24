//! Per-vendor analytics.

use crate::dto::AnalyticsResponse;
use crate::error::AppError;
use crate::extractors::AuthenticatedVendor;
use crate::state::AppState;
use axum::{Json, extract::State};

/// `GET /api/events/analytics`
///
/// Status counts over the caller's live events plus average durations over
/// completed ones.
///
/// # Errors
///
/// 500 on storage failure.
#[tracing::instrument(skip_all)]
pub async fn get_analytics(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let analytics = state.engine.analytics(vendor).await?;
    Ok(Json(AnalyticsResponse {
        success: true,
        analytics,
    }))
}
