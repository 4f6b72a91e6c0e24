//! Caller-facing view of an event with OTP codes sanitized.

use crate::otp::OtpChallenge;
use crate::types::{
    CheckIn, Event, EventId, EventLocation, EventSetup, EventStatus, VendorId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether raw OTP codes may leave the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CodeExposure {
    /// Production: codes are stripped
    #[default]
    Hidden,
    /// Development: codes are included
    Revealed,
}

/// OTP challenge as shown to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpView {
    /// Only present under [`CodeExposure::Revealed`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// When the code was sent
    pub sent_at: DateTime<Utc>,
    /// When it was verified
    pub verified_at: Option<DateTime<Utc>>,
    /// Whether it was verified
    pub is_verified: bool,
}

impl OtpView {
    fn new(challenge: &OtpChallenge, exposure: CodeExposure) -> Self {
        Self {
            code: match exposure {
                CodeExposure::Revealed => Some(challenge.code.as_str().to_string()),
                CodeExposure::Hidden => None,
            },
            sent_at: challenge.sent_at,
            verified_at: challenge.verified_at,
            is_verified: challenge.is_verified,
        }
    }
}

/// An [`Event`] as serialized in responses. Fields mirror [`Event`].
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: EventId,
    pub vendor_id: VendorId,
    pub event_name: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub event_date: DateTime<Utc>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_location: Option<EventLocation>,
    pub check_in: Option<CheckIn>,
    #[serde(rename = "startOTP")]
    pub start_otp: Option<OtpView>,
    pub event_setup: EventSetup,
    #[serde(rename = "closingOTP")]
    pub closing_otp: Option<OtpView>,
    pub status: EventStatus,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventView {
    /// Build the view, keeping or stripping codes per `exposure`.
    #[must_use]
    pub fn from_event(event: &Event, exposure: CodeExposure) -> Self {
        Self {
            id: event.id,
            vendor_id: event.vendor_id,
            event_name: event.event_name.clone(),
            customer_name: event.customer_name.clone(),
            customer_email: event.customer_email.clone(),
            customer_phone: event.customer_phone.clone(),
            event_date: event.event_date,
            location: event.location.clone(),
            event_location: event.event_location.clone(),
            check_in: event.check_in.clone(),
            start_otp: event.start_otp.as_ref().map(|o| OtpView::new(o, exposure)),
            event_setup: event.event_setup.clone(),
            closing_otp: event.closing_otp.as_ref().map(|o| OtpView::new(o, exposure)),
            status: event.status,
            is_deleted: event.is_deleted,
            deleted_at: event.deleted_at,
            completed_at: event.completed_at,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lifecycle::create_event;
    use crate::otp::OtpCode;
    use crate::types::NewEvent;

    fn event_with_start_otp() -> Event {
        let now = Utc::now();
        let mut event = create_event(
            EventId::new(),
            VendorId::new(),
            NewEvent {
                event_name: "Wedding".into(),
                customer_name: "Mei".into(),
                customer_email: "mei@example.com".into(),
                customer_phone: "+15550101".into(),
                event_date: now,
                location: "Hall 4".into(),
                event_location: None,
            },
            now,
        )
        .unwrap();
        event.start_otp = Some(OtpChallenge::issue(OtpCode::from_number(314_159), now));
        event
    }

    #[test]
    fn hidden_exposure_strips_code_but_keeps_timing() {
        let event = event_with_start_otp();
        let json = serde_json::to_value(EventView::from_event(&event, CodeExposure::Hidden)).unwrap();
        let otp = &json["startOTP"];
        assert!(otp.get("code").is_none());
        assert!(otp.get("sentAt").is_some());
        assert_eq!(otp["isVerified"], false);
        assert!(!json.to_string().contains("314159"));
    }

    #[test]
    fn revealed_exposure_keeps_code() {
        let event = event_with_start_otp();
        let json =
            serde_json::to_value(EventView::from_event(&event, CodeExposure::Revealed)).unwrap();
        assert_eq!(json["startOTP"]["code"], "314159");
        assert!(json["closingOTP"].is_null());
    }
}
