//! The lifecycle engine: read, check, call collaborators, reduce, save.
//!
//! Every mutating operation follows the same shape:
//!
//! 1. load the record and check ownership
//! 2. check transition preconditions, so nothing external happens for a
//!    request that would be rejected anyway
//! 3. perform the external side effect (upload, dispatch)
//! 4. apply the pure reducer and save the record in one write
//!
//! A failure at step 3 returns before step 4, so the record never reflects a
//! side effect that did not happen.

use crate::metrics::{LifecycleMetrics, outcome};
use chrono::{DateTime, Duration, Utc};
use eventday_core::environment::{
    Clock, CodeGenerator, ImageFolder, ImagePayload, ImageStore, Notifier, OtpDelivery,
    RecordStore, UploadConstraints,
};
use eventday_core::{
    Applied, Coordinates, DeletedFilter, Event, EventId, LifecycleAction, LifecycleError,
    LifecycleReducer, NewEvent, Operation, OtpCode, OtpPurpose, Result, SetupPhotoKind,
    StoredImage, VendorAnalytics, VendorId, check_preconditions, create_event,
    default_otp_ttl,
};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Default cap on photos per setup upload.
pub const DEFAULT_MAX_SETUP_PHOTOS: usize = 10;

/// Tunables for the engine.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// OTP validity window
    pub otp_ttl: Duration,
    /// Limits passed to the image store
    pub upload_constraints: UploadConstraints,
    /// Photos accepted per setup upload
    pub max_setup_photos: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            otp_ttl: default_otp_ttl(),
            upload_constraints: UploadConstraints::default(),
            max_setup_photos: DEFAULT_MAX_SETUP_PHOTOS,
        }
    }
}

/// Collaborators injected into the engine.
#[derive(Clone)]
pub struct EngineEnvironment {
    /// Durable records
    pub store: Arc<dyn RecordStore>,
    /// Photo storage
    pub images: Arc<dyn ImageStore>,
    /// Code delivery
    pub notifier: Arc<dyn Notifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Code source
    pub codes: Arc<dyn CodeGenerator>,
}

impl EngineEnvironment {
    /// Bundle collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        images: Arc<dyn ImageStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            store,
            images,
            notifier,
            clock,
            codes,
        }
    }
}

/// Result of issuing a code: the saved event and the code that was sent.
#[derive(Clone, Debug)]
pub struct IssuedOtp {
    /// Event after the challenge was recorded
    pub event: Event,
    /// The delivered code; only surfaced to callers in development mode
    pub code: OtpCode,
}

/// Orchestrates lifecycle operations over the injected collaborators.
#[derive(Clone)]
pub struct LifecycleEngine {
    env: EngineEnvironment,
    reducer: LifecycleReducer,
    config: EngineConfig,
}

impl LifecycleEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(env: EngineEnvironment, config: EngineConfig) -> Self {
        Self {
            env,
            reducer: LifecycleReducer::new(config.otp_ttl),
            config,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Injected collaborators.
    #[must_use]
    pub const fn environment(&self) -> &EngineEnvironment {
        &self.env
    }

    /// Check the notifier at startup.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Dependency`] if the notifier is unusable.
    pub async fn verify_collaborators(&self) -> Result<()> {
        self.env.notifier.verify().await?;
        info!(
            store = self.env.store.name(),
            images = self.env.images.name(),
            notifier = self.env.notifier.name(),
            "Collaborators ready"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Create / read
    // ------------------------------------------------------------------------

    /// Create a pending event owned by `vendor`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Validation`] for blank or malformed input.
    #[tracing::instrument(skip(self, input), fields(vendor_id = %vendor))]
    pub async fn create_event(&self, vendor: VendorId, input: NewEvent) -> Result<Event> {
        let event = create_event(EventId::new(), vendor, input, self.env.clock.now())?;
        self.env.store.save(event.clone()).await?;
        LifecycleMetrics::record_created();
        info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    /// A vendor's events, newest first.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Internal`] on storage failure.
    #[tracing::instrument(skip(self), fields(vendor_id = %vendor))]
    pub async fn list_events(&self, vendor: VendorId, filter: DeletedFilter) -> Result<Vec<Event>> {
        let events = self.env.store.find_by_vendor(vendor, filter).await?;
        // Ownership is re-checked on every record.
        Ok(events.into_iter().filter(|e| e.is_owned_by(vendor)).collect())
    }

    /// One event.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotFound`] / [`LifecycleError::Forbidden`]
    /// - [`LifecycleError::Gone`] if deleted and `include_deleted` is false
    #[tracing::instrument(skip(self), fields(vendor_id = %vendor, event_id = %id))]
    pub async fn get_event(
        &self,
        vendor: VendorId,
        id: EventId,
        include_deleted: bool,
    ) -> Result<Event> {
        let event = self.load_owned(vendor, id).await?;
        if event.is_deleted && !include_deleted {
            return Err(LifecycleError::Gone);
        }
        Ok(event)
    }

    /// Counts and milestone durations for `vendor`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Internal`] on storage failure.
    #[tracing::instrument(skip(self), fields(vendor_id = %vendor))]
    pub async fn analytics(&self, vendor: VendorId) -> Result<VendorAnalytics> {
        Ok(self.env.store.count_and_aggregate(vendor).await?)
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Record the vendor's arrival with a photo and coordinates.
    ///
    /// # Errors
    ///
    /// Ownership and precondition errors, [`LifecycleError::Validation`] for
    /// an empty or oversized photo, [`LifecycleError::Dependency`] if the
    /// upload fails.
    #[tracing::instrument(skip(self, photo), fields(vendor_id = %vendor, event_id = %id))]
    pub async fn check_in(
        &self,
        vendor: VendorId,
        id: EventId,
        photo: ImagePayload,
        coordinates: Coordinates,
    ) -> Result<Event> {
        let started = Instant::now();
        let result = async {
            let event = self.prepare(vendor, id, Operation::CheckIn).await?;
            self.check_payload(&photo, "Please upload arrival photo")?;
            let stored = self.upload(photo, ImageFolder::VendorCheckins).await?;
            LifecycleMetrics::record_uploads("vendor-checkins", 1);
            self.apply(
                event,
                LifecycleAction::CheckIn {
                    photo: stored,
                    coordinates,
                },
            )
            .await
        }
        .await;
        Self::finish(Operation::CheckIn, started, result)
    }

    /// Generate a fresh code, deliver it, then record it.
    ///
    /// The challenge is persisted only after the notifier accepted the code.
    ///
    /// # Errors
    ///
    /// Ownership and precondition errors, [`LifecycleError::Dependency`] if
    /// delivery fails (the record is left untouched).
    #[tracing::instrument(skip(self), fields(vendor_id = %vendor, event_id = %id, purpose = %purpose))]
    pub async fn issue_otp(
        &self,
        vendor: VendorId,
        id: EventId,
        purpose: OtpPurpose,
    ) -> Result<IssuedOtp> {
        let operation = Operation::IssueOtp(purpose);
        let started = Instant::now();
        let result = async {
            let event = self.prepare(vendor, id, operation).await?;
            let code = self.env.codes.generate();
            let now = self.env.clock.now();
            let delivery = OtpDelivery {
                event_id: event.id,
                event_name: event.event_name.clone(),
                customer_name: event.customer_name.clone(),
                customer_email: event.customer_email.clone(),
                customer_phone: event.customer_phone.clone(),
                purpose,
                code: code.clone(),
                expires_at: now + self.config.otp_ttl,
            };
            let receipt = self.env.notifier.send_otp(delivery).await?;
            debug!(channel = receipt.channel, reference = ?receipt.reference, "OTP delivered");
            LifecycleMetrics::record_otp_issued(purpose);
            let event = self
                .apply_at(
                    event,
                    LifecycleAction::IssueOtp {
                        purpose,
                        code: code.clone(),
                    },
                    now,
                )
                .await?;
            Ok(IssuedOtp { event, code })
        }
        .await;
        Self::finish(operation, started, result)
    }

    /// Check a code relayed by the vendor.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::PreconditionFailed`] if no code was issued or it was
    ///   already verified
    /// - [`LifecycleError::OtpExpired`] / [`LifecycleError::OtpMismatch`]
    #[tracing::instrument(skip(self, code), fields(vendor_id = %vendor, event_id = %id, purpose = %purpose))]
    pub async fn verify_otp(
        &self,
        vendor: VendorId,
        id: EventId,
        purpose: OtpPurpose,
        code: String,
    ) -> Result<Event> {
        let operation = Operation::VerifyOtp(purpose);
        let started = Instant::now();
        let result = async {
            let event = self.prepare(vendor, id, operation).await?;
            self.apply(event, LifecycleAction::VerifyOtp { purpose, code })
                .await
        }
        .await;
        LifecycleMetrics::record_otp_verification(purpose, outcome(&result));
        Self::finish(operation, started, result)
    }

    /// Store setup photos concurrently, then append them in one save.
    ///
    /// # Errors
    ///
    /// Ownership and precondition errors, [`LifecycleError::Validation`] for
    /// no photos or too many, [`LifecycleError::Dependency`] if any upload
    /// fails (none are recorded).
    #[tracing::instrument(skip(self, photos, notes), fields(vendor_id = %vendor, event_id = %id, kind = %kind, count = photos.len()))]
    pub async fn upload_setup_photos(
        &self,
        vendor: VendorId,
        id: EventId,
        kind: SetupPhotoKind,
        photos: Vec<ImagePayload>,
        notes: Option<String>,
    ) -> Result<Event> {
        let started = Instant::now();
        let result = async {
            let event = self.prepare(vendor, id, Operation::UploadSetupPhotos).await?;
            if photos.is_empty() {
                return Err(LifecycleError::Validation(
                    "Please upload at least one photo".to_string(),
                ));
            }
            if photos.len() > self.config.max_setup_photos {
                return Err(LifecycleError::Validation(format!(
                    "At most {} photos can be uploaded at once",
                    self.config.max_setup_photos
                )));
            }
            for photo in &photos {
                self.check_payload(photo, "Please upload at least one photo")?;
            }
            let count = photos.len();
            let folder = ImageFolder::EventSetup(kind);
            let stored = try_join_all(photos.into_iter().map(|p| self.upload(p, folder))).await?;
            LifecycleMetrics::record_uploads(
                match kind {
                    SetupPhotoKind::Pre => "event-setup/pre",
                    SetupPhotoKind::Post => "event-setup/post",
                },
                count,
            );
            self.apply(
                event,
                LifecycleAction::AddSetupPhotos {
                    kind,
                    photos: stored,
                    notes,
                },
            )
            .await
        }
        .await;
        Self::finish(Operation::UploadSetupPhotos, started, result)
    }

    /// Soft-delete. Deleting twice succeeds without touching `deleted_at`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] / [`LifecycleError::Forbidden`].
    #[tracing::instrument(skip(self), fields(vendor_id = %vendor, event_id = %id))]
    pub async fn delete_event(&self, vendor: VendorId, id: EventId) -> Result<Event> {
        let started = Instant::now();
        let result = async {
            let event = self.prepare(vendor, id, Operation::Delete).await?;
            self.apply(event, LifecycleAction::Delete).await
        }
        .await;
        Self::finish(Operation::Delete, started, result)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn load_owned(&self, vendor: VendorId, id: EventId) -> Result<Event> {
        let event = self
            .env
            .store
            .get(id)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        if !event.is_owned_by(vendor) {
            warn!(owner = %event.vendor_id, "Ownership mismatch");
            return Err(LifecycleError::Forbidden);
        }
        Ok(event)
    }

    async fn prepare(&self, vendor: VendorId, id: EventId, operation: Operation) -> Result<Event> {
        let event = self.load_owned(vendor, id).await?;
        check_preconditions(&event, operation)?;
        Ok(event)
    }

    fn check_payload(&self, payload: &ImagePayload, missing: &str) -> Result<()> {
        if payload.is_empty() {
            return Err(LifecycleError::Validation(missing.to_string()));
        }
        let max = self.config.upload_constraints.max_bytes;
        if payload.len() > max {
            return Err(LifecycleError::Validation(format!(
                "Image exceeds the {} MiB limit",
                max / (1024 * 1024)
            )));
        }
        Ok(())
    }

    async fn upload(&self, payload: ImagePayload, folder: ImageFolder) -> Result<StoredImage> {
        Ok(self
            .env
            .images
            .upload(payload, folder, self.config.upload_constraints)
            .await?)
    }

    async fn apply(&self, event: Event, action: LifecycleAction) -> Result<Event> {
        self.apply_at(event, action, self.env.clock.now()).await
    }

    async fn apply_at(
        &self,
        mut event: Event,
        action: LifecycleAction,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        match self.reducer.reduce(&mut event, action, now)? {
            Applied::Changed => self.env.store.save(event.clone()).await?,
            Applied::Unchanged => debug!("No change to persist"),
        }
        Ok(event)
    }

    fn finish<T>(operation: Operation, started: Instant, result: Result<T>) -> Result<T> {
        let elapsed = started.elapsed();
        LifecycleMetrics::record_transition(operation, outcome(&result), elapsed);
        match &result {
            Ok(_) => info!(
                operation = operation.as_str(),
                elapsed_secs = elapsed.as_secs_f64(),
                "Transition applied"
            ),
            Err(e @ LifecycleError::Dependency { .. }) => warn!(
                operation = operation.as_str(),
                error = %e,
                remediation = e.remediation(),
                "Collaborator failed; record left unchanged"
            ),
            Err(e) if e.is_unexpected() => error!(
                operation = operation.as_str(),
                error = %e,
                "Transition failed unexpectedly"
            ),
            Err(e) => debug!(
                operation = operation.as_str(),
                kind = e.kind().as_str(),
                "Transition rejected"
            ),
        }
        result
    }
}
