use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use std::sync::Arc;

use crate::{
    booking::{self, Reservation},
    error::{BookingError, BookingResult},
    models::*,
    notify, specialists, AppState,
};

type ApiResult<T> = BookingResult<Json<ApiResponse<T>>>;

/// Response body for a written appointment, with the WhatsApp deep link
/// when the clinic number is configured.
pub(crate) fn confirmation(state: &AppState, reservation: Reservation) -> BookingConfirmation {
    let whatsapp_url = state
        .config
        .whatsapp_number
        .as_deref()
        .and_then(|number| notify::whatsapp_link(number, &reservation.message));
    BookingConfirmation {
        appointment: reservation.appointment,
        message: reservation.message,
        whatsapp_url,
    }
}

/// GET /api/specialists: every specialist, ordered by id.
pub async fn list_specialists(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Specialist>> {
    let list = specialists::list(&state.db).await?;
    Ok(Json(ApiResponse::success(list)))
}

/// GET /api/specialists/{id}/slots?date=YYYY-MM-DD
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    specialist_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<SlotsQuery>, QueryRejection>,
) -> ApiResult<SlotsResponse> {
    let Path(specialist_id) = specialist_id?;
    let Query(query) = query?;
    let date = booking::present(&query.date)
        .ok_or_else(|| BookingError::validation("Query parameter 'date' is required"))?;
    let slots = booking::get_slots(&state.db, specialist_id, &date).await?;
    Ok(Json(ApiResponse::success(slots)))
}

/// POST /api/appointments: book a slot. A taken slot answers 409.
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AppointmentRequest>, JsonRejection>,
) -> ApiResult<BookingConfirmation> {
    let Json(req) = body?;
    let reservation = booking::reserve(&state.db, &req).await?;
    Ok(Json(ApiResponse::success(confirmation(&state, reservation))))
}
