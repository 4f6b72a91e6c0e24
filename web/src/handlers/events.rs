//! Event lifecycle endpoints.
//!
//! - `POST /api/events` - create
//! - `GET /api/events` - list (newest first)
//! - `GET /api/events/:id` - fetch one
//! - `DELETE /api/events/:id` - soft delete
//! - `POST /api/events/:id/checkin` - arrival photo and coordinates (multipart)
//! - `POST /api/events/:id/start-otp`, `/closing-otp` - send a code to the customer
//! - `POST /api/events/:id/verify-start-otp`, `/verify-closing-otp` - check a code
//! - `POST /api/events/:id/setup-photos` - pre/post setup photos (multipart)

use crate::dto::{
    CreateEventRequest, EventListResponse, EventResponse, GetQuery, ListQuery, OtpIssuedResponse,
    TransitionResponse, VerifyOtpRequest,
};
use crate::error::AppError;
use crate::extractors::{ApiJson, ApiQuery, AuthenticatedVendor};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use eventday_core::environment::ImagePayload;
use eventday_core::{
    CodeExposure, Coordinates, DeletedFilter, Event, EventId, EventView, OtpPurpose,
    SetupPhotoKind,
};
use uuid::Uuid;

fn event_id(raw: &str) -> Result<EventId, AppError> {
    // A malformed id cannot name an existing event.
    Uuid::parse_str(raw)
        .map(EventId::from_uuid)
        .map_err(|_| AppError::not_found("Event not found"))
}

fn view(state: &AppState, event: &Event) -> EventView {
    EventView::from_event(event, state.exposure)
}

fn transition(state: &AppState, message: impl Into<String>, event: &Event) -> Json<TransitionResponse> {
    Json(TransitionResponse {
        success: true,
        message: message.into(),
        event: view(state, event),
    })
}

// ============================================================================
// Multipart
// ============================================================================

/// Fields collected from a multipart body.
#[derive(Debug, Default)]
struct Form {
    files: Vec<(String, ImagePayload)>,
    texts: Vec<(String, String)>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                let file_name = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await?;
                let mut payload = ImagePayload::new(bytes.to_vec());
                if let Some(ct) = content_type {
                    payload = payload.with_content_type(ct);
                }
                if let Some(fname) = file_name {
                    payload = payload.with_file_name(fname);
                }
                form.files.push((name, payload));
            } else {
                let text = field.text().await?;
                form.texts.push((name, text));
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn take_files(&mut self, name: &str) -> Vec<ImagePayload> {
        let (matching, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(n, _)| n == name);
        self.files = rest;
        matching.into_iter().map(|(_, p)| p).collect::<Vec<_>>()
    }
}

fn parse_coordinate(form: &Form, name: &str) -> Result<f64, AppError> {
    form.text(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .ok_or_else(|| AppError::validation("Please provide valid latitude and longitude"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a pending event.
///
/// ```bash
/// curl -X POST http://localhost:5000/api/events \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"eventName": "Launch", "customerName": "Ana", "customerEmail": "ana@example.com",
///        "customerPhone": "+15550100", "eventDate": "2025-03-01", "location": "Hall A"}'
/// ```
///
/// # Errors
///
/// 400 for missing or malformed fields.
#[tracing::instrument(skip_all)]
pub async fn create_event(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let event = state
        .engine
        .create_event(vendor, request.into_new_event()?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            success: true,
            event: view(&state, &event),
        }),
    ))
}

/// List the caller's events.
///
/// # Errors
///
/// 500 on storage failure.
#[tracing::instrument(skip_all)]
pub async fn list_events(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<EventListResponse>, AppError> {
    let filter = DeletedFilter::from_flags(query.include_deleted, query.only_deleted);
    let events = state.engine.list_events(vendor, filter).await?;
    Ok(Json(EventListResponse {
        success: true,
        count: events.len(),
        events: events.iter().map(|e| view(&state, e)).collect(),
    }))
}

/// Fetch one event.
///
/// # Errors
///
/// 404 if missing or not owned, 410 if deleted and not requested.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn get_event(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<GetQuery>,
) -> Result<Json<EventResponse>, AppError> {
    let event = state
        .engine
        .get_event(vendor, event_id(&id)?, query.include_deleted)
        .await?;
    Ok(Json(EventResponse {
        success: true,
        event: view(&state, &event),
    }))
}

/// Soft-delete an event. Repeating the call succeeds.
///
/// # Errors
///
/// 404 if missing or not owned.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn delete_event(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    let event = state.engine.delete_event(vendor, event_id(&id)?).await?;
    Ok(transition(&state, "Event deleted", &event))
}

/// Record the vendor's arrival.
///
/// Multipart fields: `arrivalPhoto` (file), `latitude`, `longitude`.
///
/// # Errors
///
/// 400 for a missing photo or bad coordinates, 409 once started, 502/503 if
/// the image store fails.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn check_in(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<TransitionResponse>, AppError> {
    let id = event_id(&id)?;
    let mut form = Form::read(multipart).await?;
    let coordinates = Coordinates::new(
        parse_coordinate(&form, "latitude")?,
        parse_coordinate(&form, "longitude")?,
    )?;
    // A missing photo reaches the engine as an empty payload, so ownership
    // and ordering are checked first.
    let photo = form
        .take_files("arrivalPhoto")
        .into_iter()
        .next()
        .unwrap_or_else(|| ImagePayload::new(Vec::new()));

    let event = state.engine.check_in(vendor, id, photo, coordinates).await?;
    Ok(transition(&state, "Check-in successful", &event))
}

async fn issue(
    state: &AppState,
    vendor: eventday_core::VendorId,
    id: &str,
    purpose: OtpPurpose,
) -> Result<Json<OtpIssuedResponse>, AppError> {
    let issued = state.engine.issue_otp(vendor, event_id(id)?, purpose).await?;
    let message = match purpose {
        OtpPurpose::Start => "OTP sent to customer successfully",
        OtpPurpose::Closing => "Closing OTP sent to customer successfully",
    };
    Ok(Json(OtpIssuedResponse {
        success: true,
        message: message.to_string(),
        event: view(state, &issued.event),
        otp: (state.exposure == CodeExposure::Revealed).then(|| issued.code.as_str().to_string()),
    }))
}

async fn verify(
    state: &AppState,
    vendor: eventday_core::VendorId,
    id: &str,
    purpose: OtpPurpose,
    otp: String,
) -> Result<Json<TransitionResponse>, AppError> {
    let event = state
        .engine
        .verify_otp(vendor, event_id(id)?, purpose, otp)
        .await?;
    let message = match purpose {
        OtpPurpose::Start => "Event started successfully",
        OtpPurpose::Closing => "Event completed successfully",
    };
    Ok(transition(state, message, &event))
}

/// Send the start code to the customer.
///
/// # Errors
///
/// 409 before check-in or once verified, 502/503 if delivery fails.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn start_otp(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
) -> Result<Json<OtpIssuedResponse>, AppError> {
    issue(&state, vendor, &id, OtpPurpose::Start).await
}

/// Send the closing code to the customer.
///
/// # Errors
///
/// 409 before post-setup photos or once completed, 502/503 if delivery fails.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn closing_otp(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
) -> Result<Json<OtpIssuedResponse>, AppError> {
    issue(&state, vendor, &id, OtpPurpose::Closing).await
}

/// Verify the start code.
///
/// # Errors
///
/// 400 for a wrong or expired code, 409 if none was requested.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn verify_start_otp(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    verify(&state, vendor, &id, OtpPurpose::Start, request.otp).await
}

/// Verify the closing code; completes the event.
///
/// # Errors
///
/// 400 for a wrong or expired code, 409 if none was requested.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn verify_closing_otp(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    verify(&state, vendor, &id, OtpPurpose::Closing, request.otp).await
}

/// Upload setup photos.
///
/// Multipart fields: `photos` (1 to 10 files), `type` (`pre` or `post`),
/// optional `notes`.
///
/// # Errors
///
/// 400 for no photos, too many, or a bad type; 409 before start or after
/// completion; 502/503 if the image store fails.
#[tracing::instrument(skip_all, fields(event_id = %id))]
pub async fn upload_setup_photos(
    State(state): State<AppState>,
    AuthenticatedVendor(vendor): AuthenticatedVendor,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<TransitionResponse>, AppError> {
    let id = event_id(&id)?;
    let mut form = Form::read(multipart).await?;
    let kind: SetupPhotoKind = form.text("type").unwrap_or_default().parse()?;
    let notes = form.text("notes").map(ToString::to_string);
    let photos = form.take_files("photos");

    let event = state
        .engine
        .upload_setup_photos(vendor, id, kind, photos, notes)
        .await?;
    Ok(transition(
        &state,
        format!("{kind}-setup photos uploaded successfully"),
        &event,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_not_found() {
        let err = event_id("not-a-uuid").err();
        assert_eq!(err.map(|e| e.code()), Some("NOT_FOUND"));
    }

    #[test]
    fn form_take_files_keeps_others() {
        let mut form = Form::default();
        form.files.push(("photos".into(), ImagePayload::new(vec![1])));
        form.files.push(("other".into(), ImagePayload::new(vec![2])));
        form.files.push(("photos".into(), ImagePayload::new(vec![3])));

        assert_eq!(form.take_files("photos").len(), 2);
        assert_eq!(form.files.len(), 1);
    }
}
