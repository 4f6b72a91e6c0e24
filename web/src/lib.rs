//! HTTP API for the eventday lifecycle service.
//!
//! Handlers are thin: they authenticate the vendor, decode the request,
//! call one [`LifecycleEngine`](eventday_runtime::LifecycleEngine) operation
//! and map the result to JSON.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         HTTP (Axum)                     │  ← bearer auth, JSON, multipart
//! │  - CORS, request ids, tracing           │  ← error → status mapping
//! ├─────────────────────────────────────────┤
//! │         LifecycleEngine                 │  ← ownership, ordering, OTP gates
//! ├─────────────────────────────────────────┤
//! │  RecordStore · ImageStore · Notifier    │  ← postgres / cloudinary / smtp
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let config = Config::from_env()?;
//! let state = bootstrap::build_state(&config).await?;
//! let app = eventday_web::app(state, &config.server.cors_origins);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod config;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::AppError;
pub use extractors::{ApiJson, ApiQuery, AuthenticatedVendor, BearerToken};
pub use identity::VendorTokens;
pub use routes::build_router;
pub use state::AppState;

/// The full application: routes plus the standard layer stack.
#[must_use]
pub fn app(state: AppState, cors_origins: &[String]) -> axum::Router {
    middleware::apply_layers(build_router(state), cors_origins)
}
