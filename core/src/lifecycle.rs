//! The event lifecycle state machine.
//!
//! Transitions are applied by [`LifecycleReducer::reduce`], a pure function of
//! `(event, action, now)`. Side effects (uploading photos, dispatching codes)
//! happen before the reducer runs; the reducer only records their results.
//! [`check_preconditions`] lets the caller reject an out-of-order request
//! before paying for those side effects.

use crate::error::{LifecycleError, Result};
use crate::otp::{OtpChallenge, OtpCode, OtpPurpose, default_otp_ttl};
use crate::types::{
    CheckIn, Coordinates, Event, EventId, EventSetup, EventStatus, NewEvent, SetupPhoto,
    SetupPhotoKind, StoredImage, VendorId,
};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Lifecycle operations that mutate an existing event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Vendor arrival
    CheckIn,
    /// Send a code for a gate
    IssueOtp(OtpPurpose),
    /// Check a code for a gate
    VerifyOtp(OtpPurpose),
    /// Attach setup photos
    UploadSetupPhotos,
    /// Soft-delete
    Delete,
}

impl Operation {
    /// Metric and log label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::IssueOtp(OtpPurpose::Start) => "issue_start_otp",
            Self::IssueOtp(OtpPurpose::Closing) => "issue_closing_otp",
            Self::VerifyOtp(OtpPurpose::Start) => "verify_start_otp",
            Self::VerifyOtp(OtpPurpose::Closing) => "verify_closing_otp",
            Self::UploadSetupPhotos => "upload_setup_photos",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a side effect, ready to be recorded on the event.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleAction {
    /// Arrival photo stored, coordinates captured
    CheckIn {
        /// Stored arrival photo
        photo: StoredImage,
        /// Where the vendor checked in
        coordinates: Coordinates,
    },
    /// A code was delivered to the customer
    IssueOtp {
        /// Which gate
        purpose: OtpPurpose,
        /// The delivered code
        code: OtpCode,
    },
    /// The vendor relays the code the customer received
    VerifyOtp {
        /// Which gate
        purpose: OtpPurpose,
        /// Code as typed
        code: String,
    },
    /// Setup photos stored
    AddSetupPhotos {
        /// Target list
        kind: SetupPhotoKind,
        /// Stored photos, in request order
        photos: Vec<StoredImage>,
        /// Replaces existing notes when present
        notes: Option<String>,
    },
    /// Soft-delete the event
    Delete,
}

impl LifecycleAction {
    /// The operation this action completes.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::CheckIn { .. } => Operation::CheckIn,
            Self::IssueOtp { purpose, .. } => Operation::IssueOtp(*purpose),
            Self::VerifyOtp { purpose, .. } => Operation::VerifyOtp(*purpose),
            Self::AddSetupPhotos { .. } => Operation::UploadSetupPhotos,
            Self::Delete => Operation::Delete,
        }
    }
}

/// Whether a transition changed the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The record changed and must be saved
    Changed,
    /// Nothing to save (idempotent no-op)
    Unchanged,
}

fn precondition(message: &str) -> LifecycleError {
    LifecycleError::PreconditionFailed(message.to_string())
}

/// Reject `operation` if the event is not in a state that allows it.
///
/// Ownership is not checked here.
///
/// # Errors
///
/// - [`LifecycleError::Gone`] for any mutation of a deleted event other than
///   a repeated delete
/// - [`LifecycleError::PreconditionFailed`] when the operation is out of order
pub fn check_preconditions(event: &Event, operation: Operation) -> Result<()> {
    if operation == Operation::Delete {
        return Ok(());
    }
    if event.is_deleted {
        return Err(LifecycleError::Gone);
    }
    match operation {
        Operation::CheckIn => {
            if event.is_otp_verified(OtpPurpose::Start) {
                return Err(precondition("Event has already started"));
            }
        },
        Operation::IssueOtp(OtpPurpose::Start) => {
            if !event.is_checked_in() {
                return Err(precondition("Please check-in first"));
            }
            if event.is_otp_verified(OtpPurpose::Start) {
                return Err(precondition("Start OTP has already been verified"));
            }
        },
        Operation::IssueOtp(OtpPurpose::Closing) => {
            if !event.has_post_setup_photos() {
                return Err(precondition("Please upload post-setup photos first"));
            }
            if event.is_otp_verified(OtpPurpose::Closing) {
                return Err(precondition("Event is already completed"));
            }
        },
        Operation::VerifyOtp(purpose) => {
            if event.otp(purpose).is_none() {
                return Err(match purpose {
                    OtpPurpose::Start => precondition("Start OTP has not been requested"),
                    OtpPurpose::Closing => precondition("Closing OTP has not been requested"),
                });
            }
        },
        Operation::UploadSetupPhotos => {
            if !event.is_otp_verified(OtpPurpose::Start) {
                return Err(precondition("Please verify start OTP first"));
            }
            if event.status == EventStatus::Completed {
                return Err(precondition("Event is already completed"));
            }
        },
        Operation::Delete => {},
    }
    Ok(())
}

/// Applies lifecycle actions to events.
#[derive(Clone, Copy, Debug)]
pub struct LifecycleReducer {
    otp_ttl: Duration,
}

impl Default for LifecycleReducer {
    fn default() -> Self {
        Self::new(default_otp_ttl())
    }
}

impl LifecycleReducer {
    /// Reducer with a custom OTP validity window.
    #[must_use]
    pub const fn new(otp_ttl: Duration) -> Self {
        Self { otp_ttl }
    }

    /// The OTP validity window.
    #[must_use]
    pub const fn otp_ttl(&self) -> Duration {
        self.otp_ttl
    }

    /// Apply `action` to `event` at `now`.
    ///
    /// On [`Applied::Changed`] the status is recomputed and `updated_at` set.
    /// On error the event is left as it was.
    ///
    /// # Errors
    ///
    /// Any precondition failure, the OTP verification errors, and
    /// [`LifecycleError::Validation`] for empty inputs.
    pub fn reduce(
        &self,
        event: &mut Event,
        action: LifecycleAction,
        now: DateTime<Utc>,
    ) -> Result<Applied> {
        check_preconditions(event, action.operation())?;

        match action {
            LifecycleAction::CheckIn { photo, coordinates } => {
                event.check_in = Some(CheckIn {
                    arrival_photo_url: photo.url,
                    arrival_photo_id: photo.id,
                    latitude: coordinates.latitude,
                    longitude: coordinates.longitude,
                    timestamp: now,
                    is_checked_in: true,
                });
            },
            LifecycleAction::IssueOtp { purpose, code } => {
                *event.otp_slot_mut(purpose) = Some(OtpChallenge::issue(code, now));
            },
            LifecycleAction::VerifyOtp { purpose, code } => {
                if code.trim().is_empty() {
                    return Err(LifecycleError::Validation("Please provide the OTP".to_string()));
                }
                let ttl = self.otp_ttl;
                let Some(challenge) = event.otp_slot_mut(purpose).as_mut() else {
                    return Err(precondition("OTP has not been requested"));
                };
                challenge.verify(&code, now, ttl)?;
                if purpose == OtpPurpose::Closing {
                    event.completed_at = Some(now);
                }
            },
            LifecycleAction::AddSetupPhotos {
                kind,
                photos,
                notes,
            } => {
                if photos.is_empty() {
                    return Err(LifecycleError::Validation(
                        "Please upload at least one photo".to_string(),
                    ));
                }
                let setup = &mut event.event_setup;
                let target = match kind {
                    SetupPhotoKind::Pre => &mut setup.pre_setup_photos,
                    SetupPhotoKind::Post => &mut setup.post_setup_photos,
                };
                target.extend(photos.into_iter().map(|p| SetupPhoto {
                    url: p.url,
                    id: p.id,
                    uploaded_at: now,
                }));
                if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
                    setup.notes = Some(notes);
                }
                if kind == SetupPhotoKind::Post {
                    setup.setup_completed_at = Some(now);
                }
            },
            LifecycleAction::Delete => {
                if event.is_deleted {
                    return Ok(Applied::Unchanged);
                }
                event.is_deleted = true;
                event.deleted_at = Some(now);
            },
        }

        event.status = event.derived_status();
        event.updated_at = now;
        Ok(Applied::Changed)
    }
}

fn required(value: String, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LifecycleError::Validation(message.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !email.chars().any(char::is_whitespace)
}

/// Build a new pending event from validated input.
///
/// # Errors
///
/// Returns [`LifecycleError::Validation`] when a required field is blank or
/// the customer email is malformed.
pub fn create_event(
    id: EventId,
    vendor: VendorId,
    input: NewEvent,
    now: DateTime<Utc>,
) -> Result<Event> {
    let event_name = required(input.event_name, "Please provide event name")?;
    let customer_name = required(input.customer_name, "Please provide customer name")?;
    let customer_email = required(input.customer_email, "Please provide customer email")?;
    if !looks_like_email(&customer_email) {
        return Err(LifecycleError::Validation(
            "Please provide a valid customer email".to_string(),
        ));
    }
    let customer_phone = required(input.customer_phone, "Please provide customer phone")?;
    let location = required(input.location, "Please provide event location")?;

    let mut event = Event {
        id,
        vendor_id: vendor,
        event_name,
        customer_name,
        customer_email,
        customer_phone,
        event_date: input.event_date,
        location,
        event_location: input.event_location,
        check_in: None,
        start_otp: None,
        event_setup: EventSetup::default(),
        closing_otp: None,
        status: EventStatus::Pending,
        is_deleted: false,
        deleted_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    event.status = event.derived_status();
    Ok(event)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn new_event() -> NewEvent {
        NewEvent {
            event_name: " Birthday ".into(),
            customer_name: "Ravi".into(),
            customer_email: "ravi@example.com".into(),
            customer_phone: "+919800000000".into(),
            event_date: now(),
            location: "123 Main St".into(),
            event_location: None,
        }
    }

    fn pending() -> Event {
        create_event(EventId::new(), VendorId::new(), new_event(), now()).unwrap()
    }

    fn photo(id: &str) -> StoredImage {
        StoredImage {
            url: format!("https://img.example/{id}.jpg"),
            id: id.into(),
        }
    }

    fn check_in() -> LifecycleAction {
        LifecycleAction::CheckIn {
            photo: photo("arrival"),
            coordinates: Coordinates::new(12.9, 77.6).unwrap(),
        }
    }

    fn issue(purpose: OtpPurpose, code: u32) -> LifecycleAction {
        LifecycleAction::IssueOtp {
            purpose,
            code: OtpCode::from_number(code),
        }
    }

    fn verify(purpose: OtpPurpose, code: &str) -> LifecycleAction {
        LifecycleAction::VerifyOtp {
            purpose,
            code: code.into(),
        }
    }

    #[test]
    fn create_trims_and_starts_pending() {
        let event = pending();
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.event_name, "Birthday");
        assert_eq!(event.created_at, now());
    }

    #[test]
    fn create_rejects_blank_location_and_bad_email() {
        let mut input = new_event();
        input.location = "   ".into();
        assert_eq!(
            create_event(EventId::new(), VendorId::new(), input, now()),
            Err(LifecycleError::Validation("Please provide event location".into()))
        );

        let mut input = new_event();
        input.customer_email = "not-an-email".into();
        assert!(matches!(
            create_event(EventId::new(), VendorId::new(), input, now()),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn start_verification_before_check_in_is_a_precondition_failure() {
        let mut event = pending();
        let before = event.clone();
        let reducer = LifecycleReducer::default();
        assert!(matches!(
            reducer.reduce(&mut event, verify(OtpPurpose::Start, "123456"), now()),
            Err(LifecycleError::PreconditionFailed(_))
        ));
        assert!(matches!(
            reducer.reduce(&mut event, issue(OtpPurpose::Start, 123_456), now()),
            Err(LifecycleError::PreconditionFailed(_))
        ));
        assert_eq!(event, before);
    }

    #[test]
    fn reissue_invalidates_previous_code() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        reducer.reduce(&mut event, issue(OtpPurpose::Start, 111_111), now()).unwrap();
        reducer.reduce(&mut event, issue(OtpPurpose::Start, 222_222), now()).unwrap();
        assert_eq!(
            reducer.reduce(&mut event, verify(OtpPurpose::Start, "111111"), now()),
            Err(LifecycleError::OtpMismatch)
        );
        reducer.reduce(&mut event, verify(OtpPurpose::Start, "222222"), now()).unwrap();
        assert_eq!(event.status, EventStatus::Started);
    }

    #[test]
    fn empty_code_is_a_validation_error() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        reducer.reduce(&mut event, issue(OtpPurpose::Start, 111_111), now()).unwrap();
        assert!(matches!(
            reducer.reduce(&mut event, verify(OtpPurpose::Start, "  "), now()),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn full_lifecycle_reaches_completed() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();

        reducer.reduce(&mut event, check_in(), now()).unwrap();
        assert_eq!(event.status, EventStatus::CheckedIn);
        assert!(event.is_checked_in());

        reducer.reduce(&mut event, issue(OtpPurpose::Start, 482_913), now()).unwrap();
        reducer.reduce(&mut event, verify(OtpPurpose::Start, "482913"), now()).unwrap();
        assert_eq!(event.status, EventStatus::Started);

        reducer
            .reduce(
                &mut event,
                LifecycleAction::AddSetupPhotos {
                    kind: SetupPhotoKind::Pre,
                    photos: vec![photo("pre-1")],
                    notes: None,
                },
                now(),
            )
            .unwrap();
        assert_eq!(event.status, EventStatus::Started);

        reducer
            .reduce(
                &mut event,
                LifecycleAction::AddSetupPhotos {
                    kind: SetupPhotoKind::Post,
                    photos: vec![photo("post-1"), photo("post-2")],
                    notes: Some("Balloons up".into()),
                },
                now(),
            )
            .unwrap();
        assert_eq!(event.status, EventStatus::InProgress);
        assert_eq!(event.event_setup.setup_completed_at, Some(now()));
        assert_eq!(event.event_setup.post_setup_photos.len(), 2);
        assert_eq!(event.event_setup.notes.as_deref(), Some("Balloons up"));

        reducer.reduce(&mut event, issue(OtpPurpose::Closing, 700_001), now()).unwrap();
        assert_eq!(
            reducer.reduce(&mut event, verify(OtpPurpose::Closing, "700002"), now()),
            Err(LifecycleError::OtpMismatch)
        );
        assert_eq!(event.status, EventStatus::InProgress);
        assert_eq!(event.completed_at, None);

        let done = now() + Duration::minutes(3);
        reducer.reduce(&mut event, verify(OtpPurpose::Closing, "700001"), done).unwrap();
        assert_eq!(event.status, EventStatus::Completed);
        assert_eq!(event.completed_at, Some(done));
    }

    #[test]
    fn closing_otp_requires_post_setup_photos() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        reducer.reduce(&mut event, issue(OtpPurpose::Start, 482_913), now()).unwrap();
        reducer.reduce(&mut event, verify(OtpPurpose::Start, "482913"), now()).unwrap();
        assert_eq!(
            reducer.reduce(&mut event, issue(OtpPurpose::Closing, 700_001), now()),
            Err(LifecycleError::PreconditionFailed(
                "Please upload post-setup photos first".into()
            ))
        );
    }

    #[test]
    fn setup_photos_require_start_verification() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        let before = event.clone();
        assert!(matches!(
            reducer.reduce(
                &mut event,
                LifecycleAction::AddSetupPhotos {
                    kind: SetupPhotoKind::Post,
                    photos: vec![photo("p")],
                    notes: None,
                },
                now(),
            ),
            Err(LifecycleError::PreconditionFailed(_))
        ));
        assert_eq!(event, before);
    }

    #[test]
    fn deleted_events_reject_mutation_and_delete_is_idempotent() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();
        assert_eq!(
            reducer.reduce(&mut event, LifecycleAction::Delete, now()),
            Ok(Applied::Changed)
        );
        assert_eq!(event.deleted_at, Some(now()));

        let later = now() + Duration::hours(1);
        assert_eq!(
            reducer.reduce(&mut event, LifecycleAction::Delete, later),
            Ok(Applied::Unchanged)
        );
        assert_eq!(event.deleted_at, Some(now()));
        assert_eq!(reducer.reduce(&mut event, check_in(), later), Err(LifecycleError::Gone));
    }

    #[test]
    fn check_in_can_be_repeated_until_start_is_verified() {
        let reducer = LifecycleReducer::default();
        let mut event = pending();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        reducer.reduce(&mut event, issue(OtpPurpose::Start, 482_913), now()).unwrap();
        reducer.reduce(&mut event, verify(OtpPurpose::Start, "482913"), now()).unwrap();
        assert!(matches!(
            reducer.reduce(&mut event, check_in(), now()),
            Err(LifecycleError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn custom_ttl_is_honoured() {
        let reducer = LifecycleReducer::new(Duration::seconds(30));
        let mut event = pending();
        reducer.reduce(&mut event, check_in(), now()).unwrap();
        reducer.reduce(&mut event, issue(OtpPurpose::Start, 482_913), now()).unwrap();
        assert_eq!(
            reducer.reduce(
                &mut event,
                verify(OtpPurpose::Start, "482913"),
                now() + Duration::seconds(31)
            ),
            Err(LifecycleError::OtpExpired)
        );
    }
}
