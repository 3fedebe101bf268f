//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

/// 存活检查
///
/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "ureport-api" }))
}

/// 就绪检查：数据库与（启用时的）Redis 均可用
///
/// GET /ready
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut checks = serde_json::Map::new();
    let mut ready = true;

    if let Some(database) = &state.readiness.database {
        let ok = match database.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Database readiness check failed");
                false
            }
        };
        ready &= ok;
        checks.insert("database".into(), json!(if ok { "up" } else { "down" }));
    }

    if let Some(cache) = &state.readiness.cache {
        let ok = match cache.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Redis readiness check failed");
                false
            }
        };
        ready &= ok;
        checks.insert("redis".into(), json!(if ok { "up" } else { "down" }));
    }

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "checks": checks,
    });

    (status, Json(body))
}
