mod alert_layer;
mod auth;
mod booking;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod notify;
mod rate_limit;
mod schedule;
mod specialists;
mod store;

use anyhow::Context;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::Config;
use rate_limit::{rate_limit, RateLimiter, Tier};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub started_at: Instant,
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Config (read before tracing so the alert layer can use it) ──
    let config = Config::from_env()?;

    // ── Tracing: console + optional webhook alerts ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let fmt_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    match &config.alert_webhook_url {
        Some(url) => registry
            .with(alert_layer::AlertLayer::new(url.clone()))
            .init(),
        None => registry.init(),
    }
    config.warn_on_defaults();

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    db::run_migrations(&pool).await?;

    let cors = cors_layer(config.cors_origin.as_deref())?;
    let addr = config.addr();
    let state = Arc::new(AppState {
        db: pool,
        config,
        started_at: Instant::now(),
    });

    // ── Background task: cleanup stale rate limit entries ──
    let rate_limiter = RateLimiter::default();
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let app = app(state, rate_limiter).layer(cors);

    tracing::info!("Clinic booking server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Whitelist `origin` when configured, otherwise allow any.
fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(
            origin
                .parse()
                .with_context(|| format!("CORS_ORIGIN is not a valid origin: {}", origin))?,
        ),
        None => AllowOrigin::from(Any),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Router with one rate-limit tier per route group.
fn app(state: Arc<AppState>, limiter: RateLimiter) -> Router {
    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Auth: staff password check
    let auth_routes = Router::new()
        .route("/api/login", post(handlers::admin::login))
        .layer(from_fn_with_state((limiter.clone(), Tier::Auth), rate_limit));

    // 3. Public: read-only lookups
    let public_routes = Router::new()
        .route(
            "/api/specialists",
            get(handlers::client::list_specialists),
        )
        .route(
            "/api/specialists/{id}/slots",
            get(handlers::client::get_slots),
        )
        .layer(from_fn_with_state((limiter.clone(), Tier::Public), rate_limit));

    // 4. Booking creation: strictest limit
    let booking_routes = Router::new()
        .route(
            "/api/appointments",
            post(handlers::client::create_appointment),
        )
        .layer(from_fn_with_state((limiter.clone(), Tier::Booking), rate_limit));

    // 5. Admin: specialist and appointment management
    let admin_routes = Router::new()
        .route(
            "/api/admin/specialists",
            get(handlers::client::list_specialists).post(handlers::admin::create_specialist),
        )
        .route(
            "/api/admin/specialists/{id}",
            put(handlers::admin::update_specialist).delete(handlers::admin::delete_specialist),
        )
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments).post(handlers::client::create_appointment),
        )
        .route(
            "/api/admin/appointments/{id}",
            put(handlers::admin::update_appointment).delete(handlers::admin::delete_appointment),
        )
        .layer(from_fn_with_state((limiter.clone(), Tier::Admin), rate_limit));

    Router::new()
        .merge(no_limit_routes)
        .merge(auth_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app(vars: &[(&'static str, &'static str)]) -> Router {
        let vars = vars.to_vec();
        let config = Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();
        let state = Arc::new(AppState {
            db: db::test_pool().await,
            config,
            started_at: Instant::now(),
        });
        app(state, RateLimiter::default())
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn booking(specialist_id: i64, date: &str, time: &str, patient: &str) -> Value {
        json!({
            "specialist_id": specialist_id,
            "date": date,
            "time": time,
            "patient_name": patient,
            "patient_contact": "+56 9 1234 5678",
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(&[]).await;
        let (status, body) = call(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db_ok"], true);
        assert_eq!(body["migrations"], 2);
    }

    #[tokio::test]
    async fn test_list_specialists() {
        let app = test_app(&[]).await;
        let (status, body) = call(&app, Method::GET, "/api/specialists", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"][2]["slot_minutes"], 20);
    }

    #[tokio::test]
    async fn test_slots_mark_booked_time() {
        let app = test_app(&[]).await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(1, "2024-06-01", "10:00", "Ana")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/specialists/1/slots?date=2024-06-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let slots = body["data"]["slots"].as_array().unwrap();
        assert_eq!(slots.len(), 24);
        let taken: Vec<&str> = slots
            .iter()
            .filter(|s| s["available"] == false)
            .map(|s| s["time"].as_str().unwrap())
            .collect();
        assert_eq!(taken, ["10:00"]);
    }

    #[tokio::test]
    async fn test_slots_require_date() {
        let app = test_app(&[]).await;
        let (status, body) = call(&app, Method::GET, "/api/specialists/1/slots", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_slots_unknown_specialist() {
        let app = test_app(&[]).await;
        let (status, _) = call(
            &app,
            Method::GET,
            "/api/specialists/99/slots?date=2024-06-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_double_booking_conflicts() {
        let app = test_app(&[]).await;
        let (first, _) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(1, "2024-06-01", "10:00", "Ana")),
        )
        .await;
        assert_eq!(first, StatusCode::OK);

        let (second, body) = call(
            &app,
            Method::POST,
            "/api/admin/appointments",
            Some(booking(1, "2024-06-01", "10:00", "Luis")),
        )
        .await;
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["ok"], false);

        let (_, list) = call(&app, Method::GET, "/api/admin/appointments", None).await;
        assert_eq!(list["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let app = test_app(&[]).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(json!({ "specialist_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("patient_name"));
    }

    #[tokio::test]
    async fn test_malformed_json_uses_envelope() {
        let app = test_app(&[]).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/appointments")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_bad_query_and_path_use_envelope() {
        let app = test_app(&[]).await;
        let cases = [
            (Method::GET, "/api/admin/appointments?specialist_id=abc"),
            (Method::GET, "/api/specialists/abc/slots?date=2024-06-01"),
            (Method::DELETE, "/api/admin/appointments/abc"),
            (Method::DELETE, "/api/admin/specialists/abc"),
        ];
        for (method, uri) in cases {
            let (status, body) = call(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["ok"], false, "{}", uri);
            assert!(body["error"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_confirmation_carries_whatsapp_link() {
        let app = test_app(&[("CLINIC_WHATSAPP", "+56 9 1111 2222")]).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(2, "2024-06-01", "09:00", "Ana")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["data"]["whatsapp_url"].as_str().unwrap();
        assert!(url.starts_with("https://wa.me/56911112222?text="));
        assert!(body["data"]["message"]
            .as_str()
            .unwrap()
            .contains("Dr. Tomas Vidal"));
    }

    #[tokio::test]
    async fn test_confirmation_without_number_has_no_link() {
        let app = test_app(&[]).await;
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(2, "2024-06-01", "09:00", "Ana")),
        )
        .await;
        assert!(body["data"].get("whatsapp_url").is_none());
    }

    #[tokio::test]
    async fn test_login() {
        let app = test_app(&[("ADMIN_PASSWORD", "s3cret")]).await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/login",
            Some(json!({ "password": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/login",
            Some(json!({ "password": "s3cret" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);
    }

    #[tokio::test]
    async fn test_reschedule_and_delete() {
        let app = test_app(&[]).await;
        let (_, created) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(1, "2024-06-01", "10:00", "Ana")),
        )
        .await;
        let id = created["data"]["appointment"]["id"].as_i64().unwrap();

        let (status, moved) = call(
            &app,
            Method::PUT,
            &format!("/api/admin/appointments/{}", id),
            Some(booking(1, "2024-06-01", "11:30", "Ana")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["data"]["appointment"]["time"], "11:30");

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/admin/appointments/999",
            Some(booking(1, "2024-06-01", "12:00", "Ana")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        for _ in 0..2 {
            let (status, body) = call(
                &app,
                Method::DELETE,
                &format!("/api/admin/appointments/{}", id),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["deleted"], id);
        }
    }

    #[tokio::test]
    async fn test_specialist_admin_and_orphans() {
        let app = test_app(&[]).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/admin/specialists",
            Some(json!({
                "name": "Dr. Nuevo",
                "specialty": "Dermatology",
                "start_hour": "09:00",
                "end_hour": "12:00",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["slot_minutes"], 30);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/admin/specialists",
            Some(json!({
                "name": "Dr. Inverso",
                "specialty": "Dermatology",
                "start_hour": "12:00",
                "end_hour": "09:00",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(id, "2024-06-01", "09:30", "Ana")),
        )
        .await;

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/api/admin/specialists/{}", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, list) = call(
            &app,
            Method::GET,
            &format!("/api/admin/appointments?specialist_id={}", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = list["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["patient_name"], "Ana");
        assert!(rows[0]["specialist_name"].is_null());

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/admin/specialists/{}", id),
            Some(json!({
                "name": "Dr. Nuevo",
                "specialty": "Dermatology",
                "start_hour": "09:00",
                "end_hour": "12:00",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_booking_tier_is_limited() {
        let app = test_app(&[]).await;
        let times = ["08:00", "08:30", "09:00", "09:30", "10:00"];
        for time in times {
            let (status, _) = call(
                &app,
                Method::POST,
                "/api/appointments",
                Some(booking(1, "2024-06-01", time, "Ana")),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(booking(1, "2024-06-01", "10:30", "Ana")),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["ok"], false);

        // Admin entry is limited separately.
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/admin/appointments",
            Some(booking(1, "2024-06-01", "10:30", "Ana")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_cors_rejects_invalid_origin() {
        assert!(cors_layer(Some("https://clinic.example")).is_ok());
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
