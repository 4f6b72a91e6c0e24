//! Deterministic collaborators for tests.
//!
//! - [`FixedClock`] / [`ManualClock`]: controlled time
//! - [`SequenceCodes`]: predictable, never-repeating OTP codes
//! - [`MockNotifier`]: records deliveries, can be told to fail
//! - [`MockImageStore`]: records uploads, can be told to fail

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Mutex poisoning only happens after a test already failed

use chrono::{DateTime, Duration, Utc};
use eventday_core::environment::{
    BoxFuture, Clock, CodeGenerator, DeliveryError, DeliveryReceipt, ImageFolder, ImagePayload,
    ImageStore, Notifier, OtpDelivery, UploadConstraints, UploadError,
};
use eventday_core::{OtpCode, OtpPurpose, StoredImage};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use eventday_testing::mocks::FixedClock;
/// use eventday_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// The instant every test starts from: 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_time())
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
    step: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Start at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
            step: Arc::new(Mutex::new(Duration::zero())),
        }
    }

    /// Move forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        *self.time.lock().unwrap() += by;
    }

    /// Move forward by `step` after every read, so no two reads agree.
    pub fn step_on_read(&self, step: Duration) {
        *self.step.lock().unwrap() = step;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(test_time())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut time = self.time.lock().unwrap();
        let now = *time;
        *time += *self.step.lock().unwrap();
        now
    }
}

/// Code generator yielding `start, start + 1, ...`, wrapping inside the
/// valid range.
#[derive(Debug, Clone)]
pub struct SequenceCodes {
    next: Arc<AtomicU32>,
}

impl SequenceCodes {
    /// First code will be `start` (clamped into range).
    #[must_use]
    pub fn starting_at(start: u32) -> Self {
        Self {
            next: Arc::new(AtomicU32::new(start.clamp(OtpCode::MIN, OtpCode::MAX))),
        }
    }

    /// The code the next `generate` call will return.
    #[must_use]
    pub fn peek(&self) -> OtpCode {
        OtpCode::from_number(self.next.load(Ordering::SeqCst))
    }
}

impl Default for SequenceCodes {
    fn default() -> Self {
        Self::starting_at(100_000)
    }
}

impl CodeGenerator for SequenceCodes {
    fn generate(&self) -> OtpCode {
        let n = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n >= OtpCode::MAX { OtpCode::MIN } else { n + 1 })
            })
            .unwrap_or(OtpCode::MIN);
        OtpCode::from_number(n)
    }
}

/// Notifier that records every delivery.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<OtpDelivery>>>,
    failure: Arc<Mutex<Option<DeliveryError>>>,
}

impl MockNotifier {
    /// Create a notifier that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send (and `verify`) fail with `error`.
    pub fn fail_with(&self, error: DeliveryError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Make sends succeed again.
    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Every successful delivery, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<OtpDelivery> {
        self.sent.lock().unwrap().clone()
    }

    /// The last code delivered for `purpose`.
    #[must_use]
    pub fn last_code(&self, purpose: OtpPurpose) -> Option<OtpCode> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.purpose == purpose)
            .map(|d| d.code.clone())
    }
}

impl Notifier for MockNotifier {
    fn send_otp(
        &self,
        delivery: OtpDelivery,
    ) -> BoxFuture<'_, Result<DeliveryReceipt, DeliveryError>> {
        let result = match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => {
                let mut sent = self.sent.lock().unwrap();
                sent.push(delivery);
                Ok(DeliveryReceipt {
                    channel: "mock",
                    reference: Some(format!("mock-{}", sent.len())),
                })
            },
        };
        Box::pin(async move { result })
    }

    fn verify(&self) -> BoxFuture<'_, Result<(), DeliveryError>> {
        let result = self.failure.lock().unwrap().clone().map_or(Ok(()), Err);
        Box::pin(async move { result })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    /// Destination folder
    pub folder: ImageFolder,
    /// Payload size
    pub bytes: usize,
    /// What the store returned
    pub stored: StoredImage,
}

/// Image store that records uploads and returns predictable URLs.
#[derive(Debug, Clone, Default)]
pub struct MockImageStore {
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    failure: Arc<Mutex<Option<UploadError>>>,
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl MockImageStore {
    /// Create a store that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upload fail with `error`.
    pub fn fail_with(&self, error: UploadError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Let `n` more uploads succeed, then fail with a transient error.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    /// Make uploads succeed again.
    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
        *self.fail_after.lock().unwrap() = None;
    }

    /// Every successful upload, oldest first.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    fn record(&self, payload: ImagePayload, folder: ImageFolder) -> Result<StoredImage, UploadError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        let mut budget = self.fail_after.lock().unwrap();
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(UploadError::Transient("mock upload budget exhausted".into()));
            }
            *remaining -= 1;
        }
        let mut uploads = self.uploads.lock().unwrap();
        let n = uploads.len() + 1;
        let path = folder.path("test");
        let stored = StoredImage {
            url: format!("https://images.test/{path}/{n}.jpg"),
            id: format!("{path}/{n}"),
        };
        uploads.push(RecordedUpload {
            folder,
            bytes: payload.len(),
            stored: stored.clone(),
        });
        Ok(stored)
    }
}

impl ImageStore for MockImageStore {
    fn upload(
        &self,
        payload: ImagePayload,
        folder: ImageFolder,
        _constraints: UploadConstraints,
    ) -> BoxFuture<'_, Result<StoredImage, UploadError>> {
        let result = self.record(payload, folder);
        Box::pin(async move { result })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        handle.advance(Duration::minutes(5));
        assert_eq!(clock.now(), test_time() + Duration::minutes(5));
    }

    #[test]
    fn manual_clock_steps_on_read() {
        let clock = ManualClock::default();
        clock.step_on_read(Duration::seconds(1));
        assert_eq!(clock.now(), test_time());
        assert_eq!(clock.now(), test_time() + Duration::seconds(1));
    }

    #[test]
    fn sequence_codes_never_repeat_consecutively() {
        let codes = SequenceCodes::starting_at(999_998);
        assert_eq!(codes.peek().as_str(), "999998");
        assert_eq!(codes.generate().as_str(), "999998");
        assert_eq!(codes.peek().as_str(), "999999");
        assert_eq!(codes.generate().as_str(), "999999");
        assert_eq!(codes.generate().as_str(), "100000");
    }

    #[tokio::test]
    async fn image_store_budget_fails_later_uploads() {
        let store = MockImageStore::new();
        store.fail_after(1);
        let ok = store
            .upload(
                ImagePayload::new(vec![1]),
                ImageFolder::VendorCheckins,
                UploadConstraints::default(),
            )
            .await;
        assert!(ok.is_ok());
        let err = store
            .upload(
                ImagePayload::new(vec![1]),
                ImageFolder::VendorCheckins,
                UploadConstraints::default(),
            )
            .await;
        assert!(matches!(err, Err(UploadError::Transient(_))));
        assert_eq!(store.uploads().len(), 1);
    }
}
