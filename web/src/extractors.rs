//! Custom Axum extractors.
//!
//! - [`BearerToken`]: the raw token from `Authorization: Bearer <token>`
//! - [`AuthenticatedVendor`]: the vendor that token belongs to
//! - [`ApiJson`] and [`ApiQuery`]: `Json` and `Query` whose rejections use
//!   the [`AppError`] body
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     AuthenticatedVendor(vendor): AuthenticatedVendor,
//! ) -> Result<Json<Response>, AppError> {
//!     let events = state.engine.list_events(vendor, DeletedFilter::default()).await?;
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use eventday_core::VendorId;

/// Bearer token extracted from `Authorization: Bearer <token>` header.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Not authorized, no token"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'")
            })?
            .trim();

        if token.is_empty() {
            return Err(AppError::unauthorized("Not authorized, no token"));
        }

        Ok(Self(token.to_string()))
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedVendor(pub VendorId);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedVendor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = BearerToken::from_request_parts(parts, state).await?;
        let vendor = state.vendors.resolve(&bearer.0).ok_or_else(|| {
            tracing::debug!("Unknown bearer token");
            AppError::unauthorized("Not authorized, token failed")
        })?;
        tracing::Span::current().record("vendor_id", tracing::field::display(vendor));
        Ok(Self(vendor))
    }
}

/// JSON body; malformed input is a 400 `VALIDATION_ERROR`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string; malformed input is a 400 `VALIDATION_ERROR`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<BearerToken, AppError> {
        let mut builder = Request::builder();
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        let (mut parts, ()) = builder.body(()).expect("Valid request").into_parts();
        BearerToken::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_bearer_token_from_header() {
        let token = extract(Some("Bearer abc123")).await.expect("Should extract");
        assert_eq!(token.0, "abc123");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let err = extract(None).await.expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_unauthorized() {
        let err = extract(Some("Basic abc")).await.expect_err("Should reject");
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_empty_token_is_unauthorized() {
        assert!(extract(Some("Bearer   ")).await.is_err());
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Flags {
        include_deleted: Option<bool>,
    }

    #[tokio::test]
    async fn test_malformed_query_is_validation_error() {
        let (mut parts, ()) = Request::builder()
            .uri("/events?includeDeleted=yes")
            .body(())
            .expect("Valid request")
            .into_parts();
        let err = ApiQuery::<Flags>::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let (mut parts, ()) = Request::builder()
            .uri("/events?includeDeleted=true")
            .body(())
            .expect("Valid request")
            .into_parts();
        let ApiQuery(flags) = ApiQuery::<Flags>::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");
        assert_eq!(flags.include_deleted, Some(true));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", BearerToken("secret".into())), "BearerToken(***)");
    }
}
