use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let gate = state.controller.gate();
    let status = if gate.is_closed() { "shutting_down" } else { "ok" };

    Json(json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "egress-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "in_flight": gate.in_flight()
    }))
}
