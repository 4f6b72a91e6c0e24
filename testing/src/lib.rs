//! # Eventday Testing
//!
//! Testing utilities for the eventday workspace.
//!
//! This crate provides:
//! - Deterministic collaborators ([`mocks`]): clocks, code sequences, a
//!   recording notifier and image store
//! - Fixtures and a fully wired [`TestHarness`]
//! - [`TransitionTest`], a Given-When-Then API over the pure reducer
//!
//! ## Example
//!
//! ```ignore
//! use eventday_testing::TestHarness;
//!
//! #[tokio::test]
//! async fn test_event_flow() {
//!     let harness = TestHarness::new();
//!     let event = harness.event_at(EventStatus::InProgress).await;
//!
//!     harness.engine.issue_otp(harness.vendor, event.id, OtpPurpose::Closing).await?;
//!     assert_eq!(harness.notifier.sent().len(), 2);
//! }
//! ```

pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use fixtures::TestHarness;
pub use mocks::{
    FixedClock, ManualClock, MockImageStore, MockNotifier, SequenceCodes, test_clock, test_time,
};
pub use transition_test::{TransitionTest, assertions};
