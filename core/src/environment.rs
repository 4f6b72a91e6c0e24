//! Collaborator traits injected into the lifecycle engine.
//!
//! Every external capability (time, code generation, image storage, OTP
//! delivery, persistence) sits behind a narrow trait so that production,
//! development and test implementations are interchangeable.
//!
//! Async traits return boxed futures so they stay object-safe and can be
//! held as `Arc<dyn Trait>` by the engine.

use crate::analytics::{self, VendorAnalytics};
use crate::otp::{OtpCode, OtpPurpose};
use crate::types::{DeletedFilter, Event, EventId, SetupPhotoKind, StoredImage, VendorId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Clock and code generation
// ============================================================================

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of fresh OTP codes.
pub trait CodeGenerator: Send + Sync {
    /// Draw a new code. Must never reuse the previous draw deliberately.
    fn generate(&self) -> OtpCode;
}

/// Uniform draw from `100000..=999999` using the thread-local CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> OtpCode {
        use rand::Rng;
        OtpCode::from_number(rand::thread_rng().gen_range(OtpCode::MIN..=OtpCode::MAX))
    }
}

// ============================================================================
// Image store
// ============================================================================

/// Raw image received from the vendor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    /// File bytes
    pub bytes: Vec<u8>,
    /// Declared MIME type
    pub content_type: Option<String>,
    /// Original file name
    pub file_name: Option<String>,
}

impl ImagePayload {
    /// Wrap raw bytes without metadata.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: None,
            file_name: None,
        }
    }

    /// Attach a MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach a file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Logical destination of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFolder {
    /// Arrival photos
    VendorCheckins,
    /// Setup photos, split by kind
    EventSetup(SetupPhotoKind),
}

impl ImageFolder {
    /// Folder path under `root`, e.g. `zappy/event-setup/post`.
    #[must_use]
    pub fn path(self, root: &str) -> String {
        match self {
            Self::VendorCheckins => format!("{root}/vendor-checkins"),
            Self::EventSetup(kind) => format!("{root}/event-setup/{kind}"),
        }
    }
}

/// Limits the image store applies to stored images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadConstraints {
    /// Images wider than this are scaled down
    pub max_width: u32,
    /// Images taller than this are scaled down
    pub max_height: u32,
    /// Payloads larger than this are refused before upload
    pub max_bytes: usize,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            max_width: 1080,
            max_height: 1080,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Image store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Missing or unusable configuration.
    #[error("{message}")]
    Misconfigured {
        /// What is wrong
        message: String,
        /// How an operator fixes it
        remediation: String,
    },

    /// The store refused the request.
    #[error("{message}")]
    Rejected {
        /// Store response
        message: String,
        /// How an operator fixes it, when known
        remediation: Option<String>,
    },

    /// Network failure, timeout or server error.
    #[error("{0}")]
    Transient(String),
}

/// Durable binary storage for photos.
pub trait ImageStore: Send + Sync {
    /// Store `payload` under `folder`, applying `constraints`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when the image could not be stored.
    fn upload(
        &self,
        payload: ImagePayload,
        folder: ImageFolder,
        constraints: UploadConstraints,
    ) -> BoxFuture<'_, Result<StoredImage, UploadError>>;

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Notifier
// ============================================================================

/// Everything a notifier needs to deliver a code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpDelivery {
    /// Event the code belongs to
    pub event_id: EventId,
    /// Event title, for the message body
    pub event_name: String,
    /// Customer name, for the greeting
    pub customer_name: String,
    /// Destination email
    pub customer_email: String,
    /// Destination phone
    pub customer_phone: String,
    /// Which gate the code opens
    pub purpose: OtpPurpose,
    /// The code
    pub code: OtpCode,
    /// Last instant the code is accepted
    pub expires_at: DateTime<Utc>,
}

/// Acknowledgement of a delivered code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Transport used (`console`, `smtp`, ...)
    pub channel: &'static str,
    /// Transport-specific message reference
    pub reference: Option<String>,
}

/// Notifier failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport is not configured or its credentials are refused.
    #[error("{message}")]
    Misconfigured {
        /// What is wrong
        message: String,
        /// How an operator fixes it
        remediation: String,
    },

    /// The send failed but may succeed on retry.
    #[error("{0}")]
    Transient(String),
}

/// Out-of-band delivery of OTP codes to the customer.
///
/// Instances are constructed at startup, verified once, and dropped at
/// shutdown.
pub trait Notifier: Send + Sync {
    /// Deliver a code.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the code was not handed to the transport.
    fn send_otp(&self, delivery: OtpDelivery) -> BoxFuture<'_, Result<DeliveryReceipt, DeliveryError>>;

    /// Check the transport is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Misconfigured`] when it is not.
    fn verify(&self) -> BoxFuture<'_, Result<(), DeliveryError>>;

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Record store
// ============================================================================

/// Persistence failures. Always unexpected from the engine's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database or driver error.
    #[error("Record store error: {0}")]
    Backend(String),

    /// A stored document could not be encoded or decoded.
    #[error("Record serialization error: {0}")]
    Serialization(String),
}

/// Durable storage of event records.
///
/// `save` replaces the whole record atomically; concurrent writers resolve
/// as last-writer-wins.
pub trait RecordStore: Send + Sync {
    /// Load one record, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<Event>, StoreError>>;

    /// A vendor's records passing `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn find_by_vendor(
        &self,
        vendor: VendorId,
        filter: DeletedFilter,
    ) -> BoxFuture<'_, Result<Vec<Event>, StoreError>>;

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn save(&self, event: Event) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Counts and duration averages for a vendor.
    ///
    /// The default loads every record of the vendor and aggregates in memory.
    /// Stores that can count natively should override it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn count_and_aggregate(
        &self,
        vendor: VendorId,
    ) -> BoxFuture<'_, Result<VendorAnalytics, StoreError>> {
        Box::pin(async move {
            let events = self.find_by_vendor(vendor, DeletedFilter::IncludeDeleted).await?;
            Ok(analytics::aggregate(&events))
        })
    }

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_stay_in_range() {
        let generator = RandomCodeGenerator;
        for _ in 0..1_000 {
            let code = generator.generate();
            let n: u32 = code.as_str().parse().unwrap_or_default();
            assert!((OtpCode::MIN..=OtpCode::MAX).contains(&n));
        }
    }

    #[test]
    fn folders_nest_under_root() {
        assert_eq!(ImageFolder::VendorCheckins.path("zappy"), "zappy/vendor-checkins");
        assert_eq!(
            ImageFolder::EventSetup(SetupPhotoKind::Pre).path("zappy"),
            "zappy/event-setup/pre"
        );
    }

    #[test]
    fn default_constraints_match_photo_policy() {
        let c = UploadConstraints::default();
        assert_eq!((c.max_width, c.max_height), (1080, 1080));
        assert_eq!(c.max_bytes, 10 * 1024 * 1024);
    }
}
