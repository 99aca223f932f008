use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ApiResponse;

/// Every failure the booking core can report to a caller.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Specialist {0} not found")]
    SpecialistNotFound(i64),

    #[error("Appointment {0} not found")]
    NotFound(i64),

    #[error("Slot {time} on {date} is already taken")]
    SlotConflict { date: String, time: String },

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidSchedule(_) => StatusCode::BAD_REQUEST,
            Self::SpecialistNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SlotConflict { .. } => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a write failure to `SlotConflict` when the unique slot index rejected it.
    pub fn from_write(err: sqlx::Error, date: &str, time: &str) -> Self {
        let is_unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if is_unique {
            Self::SlotConflict {
                date: date.to_string(),
                time: time.to_string(),
            }
        } else {
            Self::Storage(err)
        }
    }
}

/// Malformed JSON bodies answer with the same envelope as other bad input.
impl From<JsonRejection> for BookingError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for BookingError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for BookingError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Storage(e) => {
                tracing::error!("storage failure: {}", e);
                "Database error".to_string()
            }
            Self::SlotConflict { .. } => {
                tracing::warn!("{}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
