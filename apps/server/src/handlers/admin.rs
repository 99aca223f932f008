use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    auth, booking,
    error::BookingResult,
    handlers::client::confirmation,
    models::*,
    specialists, AppState,
};

type ApiResult<T> = BookingResult<Json<ApiResponse<T>>>;

/// POST /api/login: check the staff password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    let password = body.map(|Json(req)| req.password).unwrap_or_default();
    if auth::verify_password(&password, &state.config.admin_password) {
        Ok(Json(ApiResponse::success(LoginResponse { success: true })))
    } else {
        tracing::warn!("Rejected admin login");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid password")),
        ))
    }
}

// ── Specialists ──

/// POST /api/admin/specialists
pub async fn create_specialist(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SpecialistRequest>, JsonRejection>,
) -> ApiResult<Specialist> {
    let Json(req) = body?;
    let specialist = specialists::create(&state.db, &req).await?;
    Ok(Json(ApiResponse::success(specialist)))
}

/// PUT /api/admin/specialists/{id}: full replace.
pub async fn update_specialist(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<SpecialistRequest>, JsonRejection>,
) -> ApiResult<Specialist> {
    let Path(id) = id?;
    let Json(req) = body?;
    let specialist = specialists::update(&state.db, id, &req).await?;
    Ok(Json(ApiResponse::success(specialist)))
}

/// DELETE /api/admin/specialists/{id}: appointments are left in place.
pub async fn delete_specialist(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Deleted> {
    let Path(id) = id?;
    let deleted = specialists::delete(&state.db, id).await?;
    Ok(Json(ApiResponse::success(deleted)))
}

// ── Appointments ──

/// GET /api/admin/appointments?date=&specialist_id=
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<AppointmentsQuery>, QueryRejection>,
) -> ApiResult<Vec<AppointmentDetail>> {
    let Query(filter) = filter?;
    let rows = booking::list_appointments(&state.db, &filter).await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// PUT /api/admin/appointments/{id}: move or edit an appointment.
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<AppointmentRequest>, JsonRejection>,
) -> ApiResult<BookingConfirmation> {
    let Path(id) = id?;
    let Json(req) = body?;
    let reservation = booking::update(&state.db, id, &req).await?;
    Ok(Json(ApiResponse::success(confirmation(&state, reservation))))
}

/// DELETE /api/admin/appointments/{id}
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Deleted> {
    let Path(id) = id?;
    let deleted = booking::release(&state.db, id).await?;
    Ok(Json(ApiResponse::success(deleted)))
}
