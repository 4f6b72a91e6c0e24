//! Error types for web handlers.
//!
//! Bridges [`LifecycleError`] and request-parsing failures to HTTP responses
//! through Axum's `IntoResponse`. Every error body has the same shape:
//!
//! ```json
//! { "success": false, "code": "PRECONDITION_FAILED", "message": "Please check-in first" }
//! ```
//!
//! Dependency failures may add a `hint` with operator remediation.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use eventday_core::{DependencyFailure, LifecycleError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Data>, AppError> {
///     let event = state.engine.get_event(vendor, id, false).await?;
///     Ok(Json(event))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Operator remediation, shown to the caller
    hint: Option<String>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            hint: None,
            source: None,
        }
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Create a 400 Bad Request validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Remediation hint, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                );
            }
        }

        let body = ErrorResponse {
            success: false,
            code: self.code,
            message: self.message,
            hint: self.hint,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(message) => Self::validation(message),
            // Another vendor's event is indistinguishable from a missing one.
            LifecycleError::NotFound | LifecycleError::Forbidden => {
                Self::not_found(LifecycleError::NotFound.to_string())
            },
            LifecycleError::Gone => Self::new(StatusCode::GONE, err.to_string(), "GONE"),
            LifecycleError::PreconditionFailed(message) => {
                Self::new(StatusCode::CONFLICT, message, "PRECONDITION_FAILED")
            },
            LifecycleError::OtpExpired | LifecycleError::OtpMismatch => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string(), err.kind().as_str())
            },
            LifecycleError::Dependency {
                failure,
                message,
                remediation,
                ..
            } => {
                let error = match failure {
                    DependencyFailure::Misconfigured => Self::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        message,
                        "DEPENDENCY_UNAVAILABLE",
                    ),
                    DependencyFailure::Rejected | DependencyFailure::Unavailable => {
                        Self::new(StatusCode::BAD_GATEWAY, message, "DEPENDENCY_FAILED")
                    },
                };
                match remediation {
                    Some(hint) => error.with_hint(hint),
                    None => error,
                }
            },
            LifecycleError::Internal(detail) => Self::internal("An internal error occurred")
                .with_source(anyhow::anyhow!(detail)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(err.status(), err.body_text(), "VALIDATION_ERROR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventday_core::Dependency;

    #[test]
    fn test_error_display() {
        let err = AppError::validation("Invalid input");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] Invalid input");
    }

    #[test]
    fn test_forbidden_looks_like_not_found() {
        let forbidden = AppError::from(LifecycleError::Forbidden);
        let missing = AppError::from(LifecycleError::NotFound);
        assert_eq!(forbidden.status, StatusCode::NOT_FOUND);
        assert_eq!(forbidden.to_string(), missing.to_string());
    }

    #[test]
    fn test_lifecycle_status_mapping() {
        let cases = [
            (LifecycleError::Validation("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (LifecycleError::Gone, StatusCode::GONE, "GONE"),
            (
                LifecycleError::PreconditionFailed("x".into()),
                StatusCode::CONFLICT,
                "PRECONDITION_FAILED",
            ),
            (LifecycleError::OtpExpired, StatusCode::BAD_REQUEST, "OTP_EXPIRED"),
            (LifecycleError::OtpMismatch, StatusCode::BAD_REQUEST, "OTP_INVALID"),
            (
                LifecycleError::Internal("db down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }

    #[test]
    fn test_dependency_mapping_keeps_hint() {
        let misconfigured = AppError::from(LifecycleError::Dependency {
            dependency: Dependency::ImageStore,
            failure: DependencyFailure::Misconfigured,
            message: "Image upload failed".into(),
            remediation: Some("Set CLOUDINARY_API_KEY".into()),
        });
        assert_eq!(misconfigured.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(misconfigured.code, "DEPENDENCY_UNAVAILABLE");
        assert_eq!(misconfigured.hint(), Some("Set CLOUDINARY_API_KEY"));

        let transient = AppError::from(LifecycleError::Dependency {
            dependency: Dependency::Notifier,
            failure: DependencyFailure::Unavailable,
            message: "OTP delivery failed".into(),
            remediation: None,
        });
        assert_eq!(transient.status, StatusCode::BAD_GATEWAY);
        assert_eq!(transient.hint(), None);
    }

    #[tokio::test]
    async fn test_body_rejection_is_a_validation_error() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        #[derive(Debug, serde::Deserialize)]
        struct Payload {
            #[allow(dead_code)]
            otp: String,
        }

        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"otp":123456}"#))
            .unwrap();
        let rejection = Json::<Payload>::from_request(request, &()).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::from(rejection);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = AppError::from(LifecycleError::Internal("connection refused".into()));
        assert!(!err.to_string().contains("connection refused"));
    }
}
