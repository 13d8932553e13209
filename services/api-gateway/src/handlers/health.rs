use axum::{extract::State, http::header, response::IntoResponse, response::Json};
use mrf_database::postgres_health_check;
use mrf_utils::MrfError;
use serde_json::{json, Value};

use crate::AppState;

const SERVICE_NAME: &str = "mrf-api-gateway";

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn detailed_health_check(State(state): State<AppState>) -> Json<Value> {
    let postgres = match postgres_health_check(&state.pool).await {
        Ok(_) => json!({"status": "healthy", "message": "Connected"}),
        Err(e) => json!({"status": "unhealthy", "message": format!("{:#}", e)}),
    };
    let healthy = postgres["status"] == "healthy";

    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "postgres": postgres,
            "email": {
                "status": if state.notifier.is_enabled() { "configured" } else { "disabled" }
            }
        }
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, MrfError> {
    let body = state.metrics.encode()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
