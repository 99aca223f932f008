use sqlx::SqlitePool;

/// Specialists inserted on first start when the table is empty.
const DEFAULT_SPECIALISTS: &[(&str, &str, &str, &str, i64)] = &[
    ("Dr. Elena Ruiz", "Cardiology", "08:00", "20:00", 30),
    ("Dr. Tomas Vidal", "Pediatrics", "08:00", "20:00", 30),
    ("Dr. Irene Soto", "General Medicine", "08:00", "20:00", 20),
];

async fn is_applied(pool: &SqlitePool, name: &str) -> anyhow::Result<bool> {
    let applied: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(applied)
}

async fn mark_applied(pool: &SqlitePool, name: &str) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    tracing::info!("Applied migration: {}", name);
    Ok(())
}

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // Enable WAL mode for better concurrent access
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    // 001: schema. The unique slot index must exist, so failures abort startup.
    if !is_applied(pool, "001_init").await? {
        let migration_sql = include_str!("../migrations/001_init.sql");
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(pool).await?;
            }
        }
        mark_applied(pool, "001_init").await?;
    }

    // 002: default specialists for a fresh database
    if !is_applied(pool, "002_seed_specialists").await? {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM specialists")
            .fetch_one(pool)
            .await?;

        if count == 0 {
            for (name, specialty, start_hour, end_hour, slot_minutes) in DEFAULT_SPECIALISTS {
                sqlx::query(
                    "INSERT INTO specialists (name, specialty, start_hour, end_hour, slot_minutes)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(name)
                .bind(specialty)
                .bind(start_hour)
                .bind(end_hour)
                .bind(slot_minutes)
                .execute(pool)
                .await?;
            }
            tracing::info!("Seeded {} specialists", DEFAULT_SPECIALISTS.len());
        }
        mark_applied(pool, "002_seed_specialists").await?;
    }

    tracing::info!("Database migrations up to date");
    Ok(())
}

/// Single-connection in-memory database with migrations applied.
///
/// Every connection to `sqlite::memory:` is a separate database, so the pool
/// is capped at one.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}
