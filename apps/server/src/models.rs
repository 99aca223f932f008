use serde::{Deserialize, Serialize};

// ── Database models ──

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Specialist {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub start_hour: String,
    pub end_hour: String,
    pub slot_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: i64,
    pub specialist_id: i64,
    pub date: String,
    pub time: String,
    pub patient_name: String,
    pub patient_contact: String,
    pub reason: String,
    pub insurance: String,
    pub created_at: String,
}

/// Appointment joined with its specialist. The join is loose: both specialist
/// columns are `None` once the specialist has been deleted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppointmentDetail {
    pub id: i64,
    pub specialist_id: i64,
    pub date: String,
    pub time: String,
    pub patient_name: String,
    pub patient_contact: String,
    pub reason: String,
    pub insurance: String,
    pub created_at: String,
    pub specialist_name: Option<String>,
    pub specialty: Option<String>,
}

/// Validated specialist fields, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpecialist {
    pub name: String,
    pub specialty: String,
    pub start_hour: String,
    pub end_hour: String,
    pub slot_minutes: i64,
}

/// Validated bookable fields of an appointment, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub specialist_id: i64,
    pub date: String,
    pub time: String,
    pub patient_name: String,
    pub patient_contact: String,
    pub reason: String,
    pub insurance: String,
}

impl NewAppointment {
    pub fn into_appointment(self, id: i64, created_at: String) -> Appointment {
        Appointment {
            id,
            specialist_id: self.specialist_id,
            date: self.date,
            time: self.time,
            patient_name: self.patient_name,
            patient_contact: self.patient_contact,
            reason: self.reason,
            insurance: self.insurance,
            created_at,
        }
    }
}

// ── API request/response types ──

/// Body for create and update (full replace) of a specialist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecialistRequest {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub start_hour: Option<String>,
    pub end_hour: Option<String>,
    pub slot_minutes: Option<i64>,
}

/// Body for booking and for appointment edits. Every field is optional at the
/// wire level so a missing field surfaces as a validation error, not a 422.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentRequest {
    pub specialist_id: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub patient_name: Option<String>,
    pub patient_contact: Option<String>,
    pub reason: Option<String>,
    pub insurance: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
    pub specialist_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub date: String,
    pub slots: Vec<SlotAvailability>,
}

#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
