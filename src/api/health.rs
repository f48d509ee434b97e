use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and a config summary without credentials.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "chatrelay is running",
        "config": {
            "backend": config.backend.kind_name(),
            "base_url": config.backend.base_url(),
            "models_count": state.models().canonical_ids().len(),
            "fallback_model": config.models.fallback,
            "features": {
                "log_level": config.features.log_level,
                "log_format": config.features.log_format.to_string(),
            }
        }
    }))
}
