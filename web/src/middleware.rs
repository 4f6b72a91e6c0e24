//! HTTP layers applied to every route.
//!
//! - **Request id**: `x-request-id` is taken from the request or generated,
//!   recorded on the request span, and echoed on the response
//! - **Tracing**: one `http_request` span per request; the authenticated
//!   vendor is recorded on it once known
//! - **CORS**: explicit origins with credentials
//! - **Body limit**: large enough for a full batch of setup photos

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, Request, header},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Largest accepted request body: ten 10 MiB photos plus form overhead.
pub const MAX_BODY_BYTES: usize = 10 * 10 * 1024 * 1024 + 1024 * 1024;

/// CORS for the given origins. Origins that are not valid header values are
/// skipped with a warning.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn make_span<B>(request: &Request<B>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
        vendor_id = tracing::field::Empty,
    )
}

/// Wrap `router` in the standard layer stack.
///
/// # Example
///
/// ```ignore
/// let app = apply_layers(build_router(state), &config.server.cors_origins);
/// ```
pub fn apply_layers(router: Router, cors_origins: &[String]) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Applied bottom-up: the request id is set before the span is created.
    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        apply_layers(
            Router::new().route("/ping", get(|| async { "pong" })),
            &["http://localhost:3000".to_string(), "bad\norigin".to_string()],
        )
    }

    #[tokio::test]
    async fn request_id_is_generated_and_echoed() {
        let response = app()
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = app()
            .oneshot(
                Request::get("/ping")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn allowed_origin_gets_credentials() {
        let response = app()
            .oneshot(
                Request::get("/ping")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_headers() {
        let response = app()
            .oneshot(
                Request::get("/ping")
                    .header(header::ORIGIN, "http://evil.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
