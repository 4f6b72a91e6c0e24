//! Liveness endpoint, used by load balancers and uptime checks.

use crate::dto::HealthResponse;
use axum::Json;

/// Liveness message returned by [`health_check`].
pub const HEALTH_MESSAGE: &str = "Eventday API is running";

/// `GET /api/health`
///
/// Does not touch the record store or any other collaborator.
///
/// ```json
/// { "success": true, "message": "Eventday API is running", "version": "0.1.0" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: HEALTH_MESSAGE,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check().await;
        assert!(body.success);
        assert_eq!(body.message, HEALTH_MESSAGE);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
