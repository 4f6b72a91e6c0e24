//! Request and response bodies.

use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use eventday_core::{EventLocation, EventView, NewEvent, VendorAnalytics};
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

/// A location given either as plain text or as a structured address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LocationField {
    /// `"123 Main St"`
    Text(String),
    /// `{"address": "123 Main St", "city": ...}`
    Structured(EventLocation),
}

impl LocationField {
    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Structured(_) => None,
        }
    }

    fn address(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Structured(loc) => loc.address.as_deref(),
        }
    }
}

/// Pick the location string: `location` text, then `eventLocation` text,
/// then `eventLocation.address`. Blank candidates are skipped.
///
/// # Errors
///
/// Returns a validation error when no candidate is usable.
pub fn resolve_location(
    location: Option<&LocationField>,
    event_location: Option<&LocationField>,
) -> Result<String, AppError> {
    [
        location.and_then(LocationField::text),
        event_location.and_then(LocationField::text),
        event_location.and_then(LocationField::address),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(ToString::to_string)
    .ok_or_else(|| AppError::validation("Please provide event location"))
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn parse_event_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::validation("Please provide event date"));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::validation("Please provide a valid event date"))
}

/// `POST /api/events` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateEventRequest {
    /// Event title
    pub event_name: String,
    /// Customer name
    pub customer_name: String,
    /// Customer email
    pub customer_email: String,
    /// Customer phone
    pub customer_phone: String,
    /// RFC 3339 or `YYYY-MM-DD`
    pub event_date: String,
    /// Location text or object
    pub location: Option<LocationField>,
    /// Location text or object
    pub event_location: Option<LocationField>,
}

impl CreateEventRequest {
    /// Resolve the location union and date into engine input.
    ///
    /// # Errors
    ///
    /// Validation errors for a missing location or an unparseable date.
    pub fn into_new_event(self) -> Result<NewEvent, AppError> {
        let location = resolve_location(self.location.as_ref(), self.event_location.as_ref())?;
        let event_date = parse_event_date(&self.event_date)?;
        let event_location = match self.event_location {
            Some(LocationField::Structured(loc)) => Some(loc),
            _ => None,
        };
        Ok(NewEvent {
            event_name: self.event_name,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            event_date,
            location,
            event_location,
        })
    }
}

/// `GET /api/events` query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    /// Include soft-deleted events
    pub include_deleted: bool,
    /// Only soft-deleted events (wins over `include_deleted`)
    pub only_deleted: bool,
}

/// `GET /api/events/:id` query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetQuery {
    /// Return the event even if soft-deleted
    pub include_deleted: bool,
}

/// OTP verification body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyOtpRequest {
    /// The 6-digit code relayed by the customer
    pub otp: String,
}

// ============================================================================
// Responses
// ============================================================================

/// `{success, event}`
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// Always `true`
    pub success: bool,
    /// The event
    pub event: EventView,
}

/// `{success, message, event}`
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    /// Always `true`
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// The updated event
    pub event: EventView,
}

/// `{success, message, event, otp?}`
#[derive(Debug, Serialize)]
pub struct OtpIssuedResponse {
    /// Always `true`
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// The updated event
    pub event: EventView,
    /// The raw code, development only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// `{success, count, events}`
#[derive(Debug, Serialize)]
pub struct EventListResponse {
    /// Always `true`
    pub success: bool,
    /// Number of events returned
    pub count: usize,
    /// Newest first
    pub events: Vec<EventView>,
}

/// `{success, analytics}`
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    /// Always `true`
    pub success: bool,
    /// Aggregates
    pub analytics: VendorAnalytics,
}

/// `{success, message, version}`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `true`
    pub success: bool,
    /// Liveness message
    pub message: &'static str,
    /// Crate version
    pub version: &'static str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(value: serde_json::Value) -> LocationField {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn location_prefers_plain_location() {
        let resolved = resolve_location(
            Some(&field(json!("Hall A"))),
            Some(&field(json!({"address": "Hall B"}))),
        )
        .unwrap();
        assert_eq!(resolved, "Hall A");
    }

    #[test]
    fn location_falls_back_to_event_location_text_then_address() {
        assert_eq!(
            resolve_location(Some(&field(json!("  "))), Some(&field(json!("Hall C")))).unwrap(),
            "Hall C"
        );
        assert_eq!(
            resolve_location(None, Some(&field(json!({"address": " Hall D ", "city": "Pune"}))))
                .unwrap(),
            "Hall D"
        );
    }

    #[test]
    fn missing_location_is_validation_error() {
        let err = resolve_location(None, Some(&field(json!({"city": "Pune"})))).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn event_date_accepts_both_formats() {
        assert_eq!(
            parse_event_date("2025-03-01").unwrap().to_rfc3339(),
            "2025-03-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_event_date("2025-03-01T10:30:00+05:30").unwrap().to_rfc3339(),
            "2025-03-01T05:00:00+00:00"
        );
        assert!(parse_event_date("next friday").is_err());
    }

    #[test]
    fn structured_event_location_is_kept() {
        let request: CreateEventRequest = serde_json::from_value(json!({
            "eventName": "Launch",
            "customerName": "Ana",
            "customerEmail": "ana@example.com",
            "customerPhone": "123",
            "eventDate": "2025-03-01",
            "eventLocation": {"address": "1 Road", "city": "Goa"}
        }))
        .unwrap();
        let new_event = request.into_new_event().unwrap();
        assert_eq!(new_event.location, "1 Road");
        assert_eq!(
            new_event.event_location.unwrap().city.as_deref(),
            Some("Goa")
        );
    }
}
