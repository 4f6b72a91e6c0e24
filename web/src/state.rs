//! Application state for Axum handlers.

use crate::identity::VendorTokens;
use eventday_core::CodeExposure;
use eventday_runtime::LifecycleEngine;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle orchestration
    pub engine: Arc<LifecycleEngine>,
    /// Bearer token registry
    pub vendors: Arc<VendorTokens>,
    /// Whether OTP codes appear in responses
    pub exposure: CodeExposure,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: LifecycleEngine, vendors: VendorTokens, exposure: CodeExposure) -> Self {
        Self {
            engine: Arc::new(engine),
            vendors: Arc::new(vendors),
            exposure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires state to be Clone
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
