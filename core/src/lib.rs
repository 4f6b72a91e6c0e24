//! # Eventday Core
//!
//! Domain model and lifecycle state machine for vendor-serviced events.
//!
//! An event moves through a fixed sequence of states, two of them gated by a
//! one-time password the customer reads back to the vendor:
//!
//! ```text
//! pending ─check-in─▶ checked-in ─start OTP─▶ started ─post photos─▶ in-progress ─closing OTP─▶ completed
//! ```
//!
//! Soft-deletion overlays any state and freezes the record.
//!
//! ## Layout
//!
//! - [`types`]: the [`Event`] record and its value objects
//! - [`otp`]: code generation rules, expiry and verification
//! - [`lifecycle`]: transition guards and the pure [`LifecycleReducer`]
//! - [`analytics`]: per-vendor counts and milestone durations
//! - [`view`]: caller-facing projection with codes sanitized
//! - [`environment`]: traits for every external collaborator
//! - [`error`]: the [`LifecycleError`] taxonomy
//!
//! This crate performs no I/O. The async engine that drives collaborators
//! lives in `eventday-runtime`.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use eventday_core::{
//!     create_event, Coordinates, EventId, EventStatus, LifecycleAction, LifecycleReducer,
//!     NewEvent, StoredImage, VendorId,
//! };
//!
//! let now = Utc::now();
//! let mut event = create_event(
//!     EventId::new(),
//!     VendorId::new(),
//!     NewEvent {
//!         event_name: "Product launch".into(),
//!         customer_name: "Ana".into(),
//!         customer_email: "ana@example.com".into(),
//!         customer_phone: "+15550199".into(),
//!         event_date: now,
//!         location: "123 Main St".into(),
//!         event_location: None,
//!     },
//!     now,
//! )?;
//!
//! LifecycleReducer::default().reduce(
//!     &mut event,
//!     LifecycleAction::CheckIn {
//!         photo: StoredImage { url: "https://img/1.jpg".into(), id: "1".into() },
//!         coordinates: Coordinates::new(40.7, -74.0)?,
//!     },
//!     now,
//! )?;
//! assert_eq!(event.status, EventStatus::CheckedIn);
//! # Ok::<(), eventday_core::LifecycleError>(())
//! ```

pub mod analytics;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod otp;
pub mod types;
pub mod view;

pub use analytics::{DurationAverages, DurationSamples, VendorAnalytics};
pub use error::{Dependency, DependencyFailure, ErrorKind, LifecycleError, Result};
pub use lifecycle::{
    Applied, LifecycleAction, LifecycleReducer, Operation, check_preconditions, create_event,
};
pub use otp::{DEFAULT_OTP_TTL_SECS, OtpChallenge, OtpCode, OtpPurpose, default_otp_ttl};
pub use types::{
    CheckIn, Coordinates, DeletedFilter, Event, EventId, EventLocation, EventSetup, EventStatus,
    NewEvent, SetupPhoto, SetupPhotoKind, StoredImage, VendorId,
};
pub use view::{CodeExposure, EventView, OtpView};
