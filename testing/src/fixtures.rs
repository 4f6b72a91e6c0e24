//! Ready-made inputs and a fully wired engine for tests.

#![allow(clippy::unwrap_used)] // Test fixtures
#![allow(clippy::missing_panics_doc)] // Fixtures panic only on broken setup

use crate::mocks::{ManualClock, MockImageStore, MockNotifier, SequenceCodes, test_time};
use eventday_core::environment::ImagePayload;
use eventday_core::{
    Coordinates, Event, EventLocation, EventStatus, NewEvent, OtpPurpose, SetupPhotoKind,
    VendorId,
};
use eventday_providers::InMemoryRecordStore;
use eventday_runtime::{EngineConfig, EngineEnvironment, LifecycleEngine};
use std::sync::Arc;

/// A valid creation request at `123 Main St`.
#[must_use]
pub fn new_event() -> NewEvent {
    NewEvent {
        event_name: "Product Launch".to_string(),
        customer_name: "Priya Sharma".to_string(),
        customer_email: "priya@example.com".to_string(),
        customer_phone: "+919876543210".to_string(),
        event_date: test_time() + chrono::Duration::days(7),
        location: "123 Main St".to_string(),
        event_location: Some(EventLocation {
            address: Some("123 Main St".to_string()),
            city: Some("Bengaluru".to_string()),
            state: Some("KA".to_string()),
        }),
    }
}

/// A small JPEG-looking payload.
#[must_use]
pub fn photo() -> ImagePayload {
    ImagePayload::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'])
        .with_content_type("image/jpeg")
        .with_file_name("photo.jpg")
}

/// Coordinates in central Bengaluru.
#[must_use]
pub fn coordinates() -> Coordinates {
    Coordinates::new(12.9716, 77.5946).unwrap()
}

/// Engine wired to in-memory and mock collaborators, with handles to each.
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use eventday_core::EventStatus;
/// use eventday_testing::TestHarness;
///
/// let harness = TestHarness::new();
/// let event = harness.event_at(EventStatus::Started).await;
/// assert_eq!(event.status, EventStatus::Started);
/// # });
/// ```
#[derive(Clone)]
pub struct TestHarness {
    /// Engine under test
    pub engine: LifecycleEngine,
    /// Records
    pub store: InMemoryRecordStore,
    /// Uploaded images
    pub images: MockImageStore,
    /// Delivered codes
    pub notifier: MockNotifier,
    /// Time
    pub clock: ManualClock,
    /// Codes
    pub codes: SequenceCodes,
    /// Default caller
    pub vendor: VendorId,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Harness with the default engine configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Harness with a custom engine configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let store = InMemoryRecordStore::new();
        let images = MockImageStore::new();
        let notifier = MockNotifier::new();
        let clock = ManualClock::default();
        let codes = SequenceCodes::starting_at(482_913);
        let engine = LifecycleEngine::new(
            EngineEnvironment::new(
                Arc::new(store.clone()),
                Arc::new(images.clone()),
                Arc::new(notifier.clone()),
                Arc::new(clock.clone()),
                Arc::new(codes.clone()),
            ),
            config,
        );
        Self {
            engine,
            store,
            images,
            notifier,
            clock,
            codes,
            vendor: VendorId::new(),
        }
    }

    /// Create a pending event for the default vendor.
    pub async fn create(&self) -> Event {
        self.engine.create_event(self.vendor, new_event()).await.unwrap()
    }

    /// Issue a code and verify it with whatever the notifier received.
    pub async fn issue_and_verify(&self, event: &Event, purpose: OtpPurpose) -> Event {
        self.engine
            .issue_otp(self.vendor, event.id, purpose)
            .await
            .unwrap();
        let code = self.notifier.last_code(purpose).unwrap();
        self.engine
            .verify_otp(self.vendor, event.id, purpose, code.as_str().to_string())
            .await
            .unwrap()
    }

    /// Create an event and drive it forward until it reaches `status`.
    ///
    /// `Cancelled` is unreachable and returns the pending event.
    pub async fn event_at(&self, status: EventStatus) -> Event {
        let mut event = self.create().await;
        if status == EventStatus::Pending || status == EventStatus::Cancelled {
            return event;
        }
        event = self
            .engine
            .check_in(self.vendor, event.id, photo(), coordinates())
            .await
            .unwrap();
        if status == EventStatus::CheckedIn {
            return event;
        }
        event = self.issue_and_verify(&event, OtpPurpose::Start).await;
        if status == EventStatus::Started {
            return event;
        }
        event = self
            .engine
            .upload_setup_photos(
                self.vendor,
                event.id,
                SetupPhotoKind::Post,
                vec![photo()],
                None,
            )
            .await
            .unwrap();
        if status == EventStatus::InProgress {
            return event;
        }
        self.issue_and_verify(&event, OtpPurpose::Closing).await
    }

    /// Current stored copy of `event`.
    pub async fn reload(&self, event: &Event) -> Event {
        use eventday_core::environment::RecordStore;
        self.store.get(event.id).await.unwrap().unwrap()
    }
}
