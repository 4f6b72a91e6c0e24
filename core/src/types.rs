//! Domain types for vendor-serviced events.
//!
//! The [`Event`] record is the only entity. Everything else here is a value
//! object hanging off it: identifiers, the check-in record, setup photos and
//! the listing filter used by record stores.

use crate::error::LifecycleError;
use crate::otp::{OtpChallenge, OtpPurpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the vendor that owns an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(Uuid);

impl VendorId {
    /// Creates a new random `VendorId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `VendorId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VendorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of an event.
///
/// Ordered: `Pending < CheckedIn < Started < InProgress < Completed`.
/// `Cancelled` is part of the vocabulary but no transition produces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    /// Scheduled, vendor not yet on site
    Pending,
    /// Vendor checked in with an arrival photo
    CheckedIn,
    /// Customer confirmed the start with the start OTP
    Started,
    /// Post-setup photos uploaded
    InProgress,
    /// Customer confirmed the close with the closing OTP
    Completed,
    /// Cancelled (no transition leads here)
    Cancelled,
}

impl EventStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::CheckedIn,
        Self::Started,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::CheckedIn => "checked-in",
            Self::Started => "started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` once the vendor has checked in.
    #[must_use]
    pub const fn is_checked_in(self) -> bool {
        matches!(
            self,
            Self::CheckedIn | Self::Started | Self::InProgress | Self::Completed
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LifecycleError::Validation(format!("Unknown event status '{s}'")))
    }
}

// ============================================================================
// Value objects
// ============================================================================

/// Structured event address as supplied by the vendor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLocation {
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State or region
    pub state: Option<String>,
}

/// Geographic position captured at check-in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees, `-90..=90`
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`
    pub longitude: f64,
}

impl Coordinates {
    /// Build validated coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] when either value is not finite
    /// or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LifecycleError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LifecycleError::Validation(
                "Latitude must be a number between -90 and 90".to_string(),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LifecycleError::Validation(
                "Longitude must be a number between -180 and 180".to_string(),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A durably stored image as returned by the image store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    /// Public URL of the image
    pub url: String,
    /// Store-specific identifier (used for later deletion or transformation)
    pub id: String,
}

/// Vendor arrival record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    /// URL of the arrival photo
    pub arrival_photo_url: String,
    /// Image store identifier of the arrival photo
    pub arrival_photo_id: String,
    /// Latitude at arrival
    pub latitude: f64,
    /// Longitude at arrival
    pub longitude: f64,
    /// When the vendor checked in
    pub timestamp: DateTime<Utc>,
    /// Always `true` once the record exists
    pub is_checked_in: bool,
}

/// Which setup photo list an upload targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupPhotoKind {
    /// Before the setup work
    Pre,
    /// After the setup work; marks setup as complete
    Post,
}

impl SetupPhotoKind {
    /// Wire name, also used as the image folder segment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for SetupPhotoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetupPhotoKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            other => Err(LifecycleError::Validation(format!(
                "Photo type must be 'pre' or 'post', got '{other}'"
            ))),
        }
    }
}

/// A setup photo attached to an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPhoto {
    /// Public URL
    pub url: String,
    /// Image store identifier
    pub id: String,
    /// Upload time
    pub uploaded_at: DateTime<Utc>,
}

/// Setup documentation for an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSetup {
    /// Photos taken before setup, in upload order
    pub pre_setup_photos: Vec<SetupPhoto>,
    /// Photos taken after setup, in upload order
    pub post_setup_photos: Vec<SetupPhoto>,
    /// Free-form vendor notes
    pub notes: Option<String>,
    /// Time of the latest post-setup upload
    pub setup_completed_at: Option<DateTime<Utc>>,
}

/// Input for creating an event.
///
/// The location has already been resolved to a single string by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Event title
    pub event_name: String,
    /// Customer full name
    pub customer_name: String,
    /// Customer email (OTP delivery)
    pub customer_email: String,
    /// Customer phone (OTP delivery)
    pub customer_phone: String,
    /// Scheduled date
    pub event_date: DateTime<Utc>,
    /// Resolved location string
    pub location: String,
    /// Optional structured address
    pub event_location: Option<EventLocation>,
}

/// Which soft-deleted events a listing returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletedFilter {
    /// Only live events (default)
    #[default]
    ExcludeDeleted,
    /// Live and deleted events
    IncludeDeleted,
    /// Only deleted events
    OnlyDeleted,
}

impl DeletedFilter {
    /// Build a filter from the two listing flags. `only` wins over `include`.
    #[must_use]
    pub const fn from_flags(include_deleted: bool, only_deleted: bool) -> Self {
        if only_deleted {
            Self::OnlyDeleted
        } else if include_deleted {
            Self::IncludeDeleted
        } else {
            Self::ExcludeDeleted
        }
    }

    /// Returns `true` if the event passes this filter.
    #[must_use]
    pub const fn matches(self, event: &Event) -> bool {
        match self {
            Self::ExcludeDeleted => !event.is_deleted,
            Self::IncludeDeleted => true,
            Self::OnlyDeleted => event.is_deleted,
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// A vendor-serviced event and its full lifecycle record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Owning vendor
    pub vendor_id: VendorId,
    /// Event title
    pub event_name: String,
    /// Customer full name
    pub customer_name: String,
    /// Customer email
    pub customer_email: String,
    /// Customer phone
    pub customer_phone: String,
    /// Scheduled date
    pub event_date: DateTime<Utc>,
    /// Resolved location string
    pub location: String,
    /// Optional structured address
    #[serde(default)]
    pub event_location: Option<EventLocation>,
    /// Arrival record
    #[serde(default)]
    pub check_in: Option<CheckIn>,
    /// Start confirmation challenge
    #[serde(default, rename = "startOTP")]
    pub start_otp: Option<OtpChallenge>,
    /// Setup documentation
    #[serde(default)]
    pub event_setup: EventSetup,
    /// Closing confirmation challenge
    #[serde(default, rename = "closingOTP")]
    pub closing_otp: Option<OtpChallenge>,
    /// Stored status, recomputed from the sub-records on every transition
    pub status: EventStatus,
    /// Soft-deletion marker
    #[serde(default)]
    pub is_deleted: bool,
    /// When the event was soft-deleted
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the closing OTP was verified
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Returns `true` if `vendor` owns this event.
    #[must_use]
    pub fn is_owned_by(&self, vendor: VendorId) -> bool {
        self.vendor_id == vendor
    }

    /// Returns `true` once a check-in record exists.
    #[must_use]
    pub fn is_checked_in(&self) -> bool {
        self.check_in.as_ref().is_some_and(|c| c.is_checked_in)
    }

    /// Returns `true` once the challenge for `purpose` was verified.
    #[must_use]
    pub fn is_otp_verified(&self, purpose: OtpPurpose) -> bool {
        self.otp(purpose).is_some_and(|otp| otp.is_verified)
    }

    /// Returns `true` once at least one post-setup photo exists.
    #[must_use]
    pub fn has_post_setup_photos(&self) -> bool {
        !self.event_setup.post_setup_photos.is_empty()
    }

    /// The challenge slot for `purpose`.
    #[must_use]
    pub const fn otp(&self, purpose: OtpPurpose) -> Option<&OtpChallenge> {
        match purpose {
            OtpPurpose::Start => self.start_otp.as_ref(),
            OtpPurpose::Closing => self.closing_otp.as_ref(),
        }
    }

    /// Mutable challenge slot for `purpose`.
    pub const fn otp_slot_mut(&mut self, purpose: OtpPurpose) -> &mut Option<OtpChallenge> {
        match purpose {
            OtpPurpose::Start => &mut self.start_otp,
            OtpPurpose::Closing => &mut self.closing_otp,
        }
    }

    /// Status implied by the sub-records.
    ///
    /// Pure function of the record; the stored `status` is overwritten with
    /// this value after every transition. A cancelled event stays cancelled.
    #[must_use]
    pub fn derived_status(&self) -> EventStatus {
        if self.status == EventStatus::Cancelled {
            EventStatus::Cancelled
        } else if self.is_otp_verified(OtpPurpose::Closing) {
            EventStatus::Completed
        } else if self.event_setup.setup_completed_at.is_some() && self.has_post_setup_photos() {
            EventStatus::InProgress
        } else if self.is_otp_verified(OtpPurpose::Start) {
            EventStatus::Started
        } else if self.is_checked_in() {
            EventStatus::CheckedIn
        } else {
            EventStatus::Pending
        }
    }
}
