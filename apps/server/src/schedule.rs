//! Specialist schedule model: working window + granularity → slot start times.
//!
//! Times are minutes since midnight internally and zero-padded `HH:MM` strings
//! at the edges, matching how they are stored.

use chrono::{NaiveTime, Timelike};

use crate::error::{BookingError, BookingResult};

/// Slot granularity applied when a specialist is created without one.
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// Parse a strict zero-padded 24-hour `HH:MM` value into minutes since midnight.
pub fn parse_time(value: &str) -> Option<i64> {
    if value.len() != 5 || value.as_bytes()[2] != b':' {
        return None;
    }
    let time = NaiveTime::parse_from_str(value, "%H:%M").ok()?;
    Some(i64::from(time.hour()) * 60 + i64::from(time.minute()))
}

/// Format minutes since midnight as `HH:MM`.
pub fn format_time(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Check the schedule invariant and return the window bounds in minutes.
pub fn validate_schedule(
    start_hour: &str,
    end_hour: &str,
    slot_minutes: i64,
) -> BookingResult<(i64, i64)> {
    let start = parse_time(start_hour).ok_or_else(|| {
        BookingError::InvalidSchedule(format!("start_hour '{}' is not HH:MM", start_hour))
    })?;
    let end = parse_time(end_hour).ok_or_else(|| {
        BookingError::InvalidSchedule(format!("end_hour '{}' is not HH:MM", end_hour))
    })?;

    if end <= start {
        return Err(BookingError::InvalidSchedule(format!(
            "end_hour {} must be after start_hour {}",
            end_hour, start_hour
        )));
    }
    if slot_minutes <= 0 {
        return Err(BookingError::InvalidSchedule(format!(
            "slot_minutes must be positive, got {}",
            slot_minutes
        )));
    }

    Ok((start, end))
}

/// Enumerate every slot start that fits entirely inside `[start_hour, end_hour]`.
///
/// A trailing partial slot is never emitted, so a window shorter than one slot
/// yields an empty list.
pub fn enumerate_slots(
    start_hour: &str,
    end_hour: &str,
    slot_minutes: i64,
) -> BookingResult<Vec<String>> {
    let (start, end) = validate_schedule(start_hour, end_hour, slot_minutes)?;

    let mut slots = Vec::new();
    let mut current = start;
    while current + slot_minutes <= end {
        slots.push(format_time(current));
        current += slot_minutes;
    }
    Ok(slots)
}

// ── Tests ──
