//! Availability and conflict resolution.
//!
//! At most one appointment exists per (specialist, date, time). The guarantee
//! comes from the `ux_appointments_slot` unique index: writes never read the
//! slot first and then insert, they insert and translate the constraint
//! violation into [`BookingError::SlotConflict`].
//!
//! Write transactions open with `BEGIN IMMEDIATE` so they hold the write lock
//! before their first read. A deferred one fails with `SQLITE_BUSY` on upgrade.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::error::{BookingError, BookingResult};
use crate::models::{
    Appointment, AppointmentDetail, AppointmentRequest, AppointmentsQuery, Deleted,
    NewAppointment, SlotAvailability, SlotsResponse, Specialist,
};
use crate::notify;
use crate::schedule::{self, parse_time};
use crate::store;

const WRITE_TX: &str = "BEGIN IMMEDIATE";

/// A written appointment together with the confirmation text for the patient.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub appointment: Appointment,
    pub message: String,
}

/// Validate a strict `YYYY-MM-DD` calendar date.
pub fn validate_date(date: &str) -> BookingResult<()> {
    let well_formed =
        date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok();
    if well_formed {
        Ok(())
    } else {
        Err(BookingError::validation(format!(
            "Invalid date '{}', expected YYYY-MM-DD",
            date
        )))
    }
}

/// Trimmed, non-empty value of an optional text field.
pub fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Turn a raw request into bookable fields, rejecting absent or malformed input.
pub fn parse_request(req: &AppointmentRequest) -> BookingResult<NewAppointment> {
    let date = present(&req.date);
    let time = present(&req.time);
    let patient_name = present(&req.patient_name);

    let missing: Vec<&str> = [
        ("specialist_id", req.specialist_id.is_none()),
        ("date", date.is_none()),
        ("time", time.is_none()),
        ("patient_name", patient_name.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();

    let (Some(specialist_id), Some(date), Some(time), Some(patient_name)) =
        (req.specialist_id, date, time, patient_name)
    else {
        return Err(BookingError::validation(format!(
            "Missing fields: {}",
            missing.join(", ")
        )));
    };

    validate_date(&date)?;
    if parse_time(&time).is_none() {
        return Err(BookingError::validation(format!(
            "Invalid time '{}', expected HH:MM",
            time
        )));
    }

    Ok(NewAppointment {
        specialist_id,
        date,
        time,
        patient_name,
        patient_contact: present(&req.patient_contact).unwrap_or_default(),
        reason: present(&req.reason).unwrap_or_default(),
        insurance: present(&req.insurance).unwrap_or_default(),
    })
}

/// Mark each enumerated slot of `specialist` as available unless it is booked.
///
/// Output order is the enumeration order, i.e. chronological.
pub fn compute_availability(
    specialist: &Specialist,
    booked_times: &HashSet<String>,
) -> BookingResult<Vec<SlotAvailability>> {
    let slots = schedule::enumerate_slots(
        &specialist.start_hour,
        &specialist.end_hour,
        specialist.slot_minutes,
    )?;

    Ok(slots
        .into_iter()
        .map(|time| SlotAvailability {
            available: !booked_times.contains(&time),
            time,
        })
        .collect())
}

/// Reject times that are not one of the specialist's slot starts.
fn ensure_on_grid(specialist: &Specialist, time: &str) -> BookingResult<()> {
    let slots = schedule::enumerate_slots(
        &specialist.start_hour,
        &specialist.end_hour,
        specialist.slot_minutes,
    )?;
    if slots.iter().any(|slot| slot == time) {
        Ok(())
    } else {
        Err(BookingError::validation(format!(
            "{} is not a bookable slot for {} ({} to {}, every {} min)",
            time,
            specialist.name,
            specialist.start_hour,
            specialist.end_hour,
            specialist.slot_minutes
        )))
    }
}

/// Slot availability for one specialist on one date.
pub async fn get_slots(
    pool: &SqlitePool,
    specialist_id: i64,
    date: &str,
) -> BookingResult<SlotsResponse> {
    validate_date(date)?;

    let specialist = store::get_specialist(pool, specialist_id)
        .await?
        .ok_or(BookingError::SpecialistNotFound(specialist_id))?;
    let booked = store::booked_times(pool, specialist_id, date).await?;

    Ok(SlotsResponse {
        date: date.to_string(),
        slots: compute_availability(&specialist, &booked)?,
    })
}

/// Book a slot. A taken slot fails with `SlotConflict`.
pub async fn reserve(pool: &SqlitePool, req: &AppointmentRequest) -> BookingResult<Reservation> {
    let input = parse_request(req)?;

    let mut tx = pool.begin_with(WRITE_TX).await?;
    let specialist = store::get_specialist(&mut *tx, input.specialist_id)
        .await?
        .ok_or(BookingError::SpecialistNotFound(input.specialist_id))?;
    ensure_on_grid(&specialist, &input.time)?;

    let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let id = store::insert_appointment(&mut *tx, &input, &created_at)
        .await
        .map_err(|e| BookingError::from_write(e, &input.date, &input.time))?;
    tx.commit().await?;

    let appointment = input.into_appointment(id, created_at);
    tracing::info!(
        appointment_id = appointment.id,
        specialist_id = appointment.specialist_id,
        "Booked {} {}",
        appointment.date,
        appointment.time
    );

    Ok(Reservation {
        message: notify::confirmation_message(&specialist.name, &appointment),
        appointment,
    })
}

/// Replace the bookable fields of an existing appointment.
///
/// Moving an appointment onto the slot it already occupies is not a conflict.
pub async fn update(
    pool: &SqlitePool,
    appointment_id: i64,
    req: &AppointmentRequest,
) -> BookingResult<Reservation> {
    let input = parse_request(req)?;

    let mut tx = pool.begin_with(WRITE_TX).await?;
    let existing = store::get_appointment(&mut *tx, appointment_id)
        .await?
        .ok_or(BookingError::NotFound(appointment_id))?;
    let specialist = store::get_specialist(&mut *tx, input.specialist_id)
        .await?
        .ok_or(BookingError::SpecialistNotFound(input.specialist_id))?;
    ensure_on_grid(&specialist, &input.time)?;

    let updated = store::update_appointment(&mut *tx, appointment_id, &input)
        .await
        .map_err(|e| BookingError::from_write(e, &input.date, &input.time))?;
    if !updated {
        return Err(BookingError::NotFound(appointment_id));
    }
    tx.commit().await?;

    let appointment = input.into_appointment(appointment_id, existing.created_at);
    tracing::info!(
        appointment_id,
        specialist_id = appointment.specialist_id,
        "Rescheduled to {} {}",
        appointment.date,
        appointment.time
    );

    Ok(Reservation {
        message: notify::confirmation_message(&specialist.name, &appointment),
        appointment,
    })
}

/// Delete an appointment. Missing ids are acknowledged the same way.
pub async fn release(pool: &SqlitePool, appointment_id: i64) -> BookingResult<Deleted> {
    let removed = store::delete_appointment(pool, appointment_id).await?;
    if removed == 0 {
        tracing::debug!(appointment_id, "release of unknown appointment");
    }
    Ok(Deleted {
        deleted: appointment_id,
    })
}

/// Appointments matching every given filter, with specialist details joined in.
pub async fn list_appointments(
    pool: &SqlitePool,
    filter: &AppointmentsQuery,
) -> BookingResult<Vec<AppointmentDetail>> {
    if let Some(date) = &filter.date {
        validate_date(date)?;
    }
    Ok(store::list_appointments(pool, filter).await?)
}

// ── Tests ──
