use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub db_ok: bool,
    pub migrations: i64,
}

/// GET /api/health: liveness plus a database round trip.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let migrations = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&state.db)
        .await;
    let db_ok = migrations.is_ok();

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        db_ok,
        migrations: migrations.unwrap_or(0),
    })
}
