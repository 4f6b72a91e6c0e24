//! # Eventday Runtime
//!
//! The [`LifecycleEngine`] turns caller requests into lifecycle transitions.
//!
//! It owns no state of its own: each call loads one record from the injected
//! [`RecordStore`](eventday_core::environment::RecordStore), runs any external
//! side effect (image upload, OTP dispatch), applies the pure reducer from
//! `eventday-core` and saves the result in a single write.
//!
//! ## Example
//!
//! ```ignore
//! use eventday_runtime::{EngineConfig, EngineEnvironment, LifecycleEngine};
//!
//! let engine = LifecycleEngine::new(
//!     EngineEnvironment::new(store, images, notifier, clock, codes),
//!     EngineConfig::default(),
//! );
//!
//! let event = engine.create_event(vendor, new_event).await?;
//! let issued = engine.issue_otp(vendor, event.id, OtpPurpose::Start).await?;
//! ```

pub mod engine;
pub mod metrics;

pub use engine::{
    DEFAULT_MAX_SETUP_PHOTOS, EngineConfig, EngineEnvironment, IssuedOtp, LifecycleEngine,
};
