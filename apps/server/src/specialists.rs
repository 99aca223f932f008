//! Specialist administration: validated create/update and non-cascading delete.

use sqlx::SqlitePool;

use crate::booking::present;
use crate::error::{BookingError, BookingResult};
use crate::models::{Deleted, NewSpecialist, Specialist, SpecialistRequest};
use crate::schedule::{self, DEFAULT_SLOT_MINUTES};
use crate::store;

/// Check required fields and the schedule invariant.
pub fn parse_request(req: &SpecialistRequest) -> BookingResult<NewSpecialist> {
    let (Some(name), Some(specialty), Some(start_hour), Some(end_hour)) = (
        present(&req.name),
        present(&req.specialty),
        present(&req.start_hour),
        present(&req.end_hour),
    ) else {
        return Err(BookingError::validation(
            "Missing fields (name, specialty, start_hour, end_hour)",
        ));
    };

    let slot_minutes = req.slot_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
    schedule::validate_schedule(&start_hour, &end_hour, slot_minutes)?;

    Ok(NewSpecialist {
        name,
        specialty,
        start_hour,
        end_hour,
        slot_minutes,
    })
}

pub async fn list(pool: &SqlitePool) -> BookingResult<Vec<Specialist>> {
    Ok(store::list_specialists(pool).await?)
}

pub async fn create(pool: &SqlitePool, req: &SpecialistRequest) -> BookingResult<Specialist> {
    let specialist = parse_request(req)?;
    let id = store::insert_specialist(pool, &specialist).await?;
    tracing::info!(specialist_id = id, "Created specialist {}", specialist.name);

    Ok(Specialist {
        id,
        name: specialist.name,
        specialty: specialist.specialty,
        start_hour: specialist.start_hour,
        end_hour: specialist.end_hour,
        slot_minutes: specialist.slot_minutes,
    })
}

/// Full replace. Existing appointments keep their times even if they fall off
/// the new grid.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    req: &SpecialistRequest,
) -> BookingResult<Specialist> {
    let specialist = parse_request(req)?;
    if !store::update_specialist(pool, id, &specialist).await? {
        return Err(BookingError::SpecialistNotFound(id));
    }

    Ok(Specialist {
        id,
        name: specialist.name,
        specialty: specialist.specialty,
        start_hour: specialist.start_hour,
        end_hour: specialist.end_hour,
        slot_minutes: specialist.slot_minutes,
    })
}

/// Remove a specialist. Appointments are left in place as orphans.
pub async fn delete(pool: &SqlitePool, id: i64) -> BookingResult<Deleted> {
    let removed = store::delete_specialist(pool, id).await?;
    if removed > 0 {
        tracing::info!(specialist_id = id, "Deleted specialist");
    }
    Ok(Deleted { deleted: id })
}
