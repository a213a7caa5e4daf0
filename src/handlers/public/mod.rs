// handlers/public/mod.rs - Endpoints served without authentication

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;

/// GET / - service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "HR/Payroll API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": crate::config::config().environment,
            "endpoints": {
                "health": "/health (public)",
                "auth": "/api/auth/whoami (protected)",
                "hris": "/api/hris/:resource[/:id] (protected)",
                "payroll": "/api/payroll/:resource[/:id] (protected)",
                "find": "/api/find/:product/:resource (protected)",
                "root": "/api/root/organizations (root role)"
            }
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": true,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}
