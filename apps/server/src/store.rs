//! SQL access for specialists and appointments.
//!
//! Functions that take part in a booking transaction are generic over the
//! executor so they run on either the pool or an open transaction.

use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use crate::models::{
    Appointment, AppointmentDetail, AppointmentsQuery, NewAppointment, NewSpecialist, Specialist,
};

const SPECIALIST_COLUMNS: &str = "id, name, specialty, start_hour, end_hour, slot_minutes";

const APPOINTMENT_COLUMNS: &str = "id, specialist_id, date, time, patient_name, patient_contact, \
                                   reason, insurance, created_at";

const APPOINTMENT_DETAIL_SELECT: &str =
    "SELECT a.id, a.specialist_id, a.date, a.time, a.patient_name, a.patient_contact,
            a.reason, a.insurance, a.created_at,
            s.name AS specialist_name, s.specialty
     FROM appointments a
     LEFT JOIN specialists s ON s.id = a.specialist_id";

// ── Specialists ──

pub async fn list_specialists(pool: &SqlitePool) -> Result<Vec<Specialist>, sqlx::Error> {
    sqlx::query_as::<_, Specialist>(&format!(
        "SELECT {} FROM specialists ORDER BY id ASC",
        SPECIALIST_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_specialist<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<Specialist>, sqlx::Error> {
    sqlx::query_as::<_, Specialist>(&format!(
        "SELECT {} FROM specialists WHERE id = ?",
        SPECIALIST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn insert_specialist(
    pool: &SqlitePool,
    specialist: &NewSpecialist,
) -> Result<i64, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO specialists (name, specialty, start_hour, end_hour, slot_minutes)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&specialist.name)
    .bind(&specialist.specialty)
    .bind(&specialist.start_hour)
    .bind(&specialist.end_hour)
    .bind(specialist.slot_minutes)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Returns whether a row was updated.
pub async fn update_specialist(
    pool: &SqlitePool,
    id: i64,
    specialist: &NewSpecialist,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE specialists
         SET name = ?, specialty = ?, start_hour = ?, end_hour = ?, slot_minutes = ?
         WHERE id = ?",
    )
    .bind(&specialist.name)
    .bind(&specialist.specialty)
    .bind(&specialist.start_hour)
    .bind(&specialist.end_hour)
    .bind(specialist.slot_minutes)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes the specialist row only; appointments keep their `specialist_id`.
pub async fn delete_specialist(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM specialists WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ── Appointments ──

/// Times already booked for a specialist on a date.
pub async fn booked_times(
    pool: &SqlitePool,
    specialist_id: i64,
    date: &str,
) -> Result<HashSet<String>, sqlx::Error> {
    let times: Vec<String> =
        sqlx::query_scalar("SELECT time FROM appointments WHERE specialist_id = ? AND date = ?")
            .bind(specialist_id)
            .bind(date)
            .fetch_all(pool)
            .await?;
    Ok(times.into_iter().collect())
}

pub async fn get_appointment<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {} FROM appointments WHERE id = ?",
        APPOINTMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Inserts an appointment. A taken slot fails with a unique violation from
/// `ux_appointments_slot`, atomically with the write.
pub async fn insert_appointment<'e, E: SqliteExecutor<'e>>(
    executor: E,
    appointment: &NewAppointment,
    created_at: &str,
) -> Result<i64, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO appointments
         (specialist_id, date, time, patient_name, patient_contact, reason, insurance, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(appointment.specialist_id)
    .bind(&appointment.date)
    .bind(&appointment.time)
    .bind(&appointment.patient_name)
    .bind(&appointment.patient_contact)
    .bind(&appointment.reason)
    .bind(&appointment.insurance)
    .bind(created_at)
    .execute(executor)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Replaces the bookable fields of an appointment; `created_at` is untouched.
pub async fn update_appointment<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    appointment: &NewAppointment,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE appointments
         SET specialist_id = ?, date = ?, time = ?, patient_name = ?,
             patient_contact = ?, reason = ?, insurance = ?
         WHERE id = ?",
    )
    .bind(appointment.specialist_id)
    .bind(&appointment.date)
    .bind(&appointment.time)
    .bind(&appointment.patient_name)
    .bind(&appointment.patient_contact)
    .bind(&appointment.reason)
    .bind(&appointment.insurance)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_appointment(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Appointments joined with specialist name/specialty, ordered by (date, time).
pub async fn list_appointments(
    pool: &SqlitePool,
    filter: &AppointmentsQuery,
) -> Result<Vec<AppointmentDetail>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_DETAIL_SELECT);
    let mut separator = " WHERE ";

    if let Some(date) = &filter.date {
        query.push(separator).push("a.date = ").push_bind(date.clone());
        separator = " AND ";
    }
    if let Some(specialist_id) = filter.specialist_id {
        query
            .push(separator)
            .push("a.specialist_id = ")
            .push_bind(specialist_id);
    }
    query.push(" ORDER BY a.date ASC, a.time ASC, a.id ASC");

    query
        .build_query_as::<AppointmentDetail>()
        .fetch_all(pool)
        .await
}
