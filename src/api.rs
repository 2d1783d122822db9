// src/api.rs
//! Process surface: liveness, effective configuration, manual trigger.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::ConfigSummary;
use crate::poller::Poller;

#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
    pub summary: Arc<ConfigSummary>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/trigger", post(trigger))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "config": &*state.summary,
        "strategies": state.poller.strategies(),
        "channels": state.poller.channels(),
    }))
}

/// Runs one cycle synchronously; waits behind a scheduled cycle if one is running.
async fn trigger(State(state): State<AppState>) -> Response {
    match state.poller.run_once().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::warn!(target: "poller", error = ?e, "manual cycle failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "notified": false, "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}
