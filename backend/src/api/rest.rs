// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// `/` serves the dashboard page; everything the page needs lives under
// `/api/v1/`. The dashboard is read-only market data, so there is no
// authentication. CORS is permissive so the page can also be served from a
// dev server on another port.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::runtime_config::ParamsUpdate;

const DASHBOARD_HTML: &str = include_str!("../../static/dashboard.html");

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(dashboard))
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/params", get(get_params).post(set_params))
        .route("/api/v1/control/pause", post(control_pause))
        .route("/api/v1/control/resume", post(control_resume))
        .route("/api/v1/control/refresh", post(control_refresh))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Dashboard page
// =============================================================================

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    used_weight_1m: u32,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        used_weight_1m: state.rate_limit.snapshot().used_weight_1m,
    })
}

// =============================================================================
// Snapshot & chart
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn chart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let frame = state.latest_frame.read().clone();
    match frame {
        Some(frame) => Json(frame).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// =============================================================================
// Parameters
// =============================================================================

async fn get_params(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().clone();
    Json(config)
}

async fn set_params(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ParamsUpdate>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let changes = state.update_params(&update).map_err(|e| {
        warn!(error = %e, "rejected parameter update");
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e })),
        )
    })?;

    let config = state.config.read().clone();
    Ok(Json(serde_json::json!({
        "params": config,
        "changes": changes,
    })))
}

// =============================================================================
// Control endpoints
// =============================================================================

#[derive(Serialize)]
struct ControlResponse {
    paused: bool,
    message: &'static str,
}

async fn control_pause(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.set_paused(true);
    info!("auto-refresh PAUSED via API");
    Json(ControlResponse {
        paused: true,
        message: "Auto-refresh paused",
    })
}

async fn control_resume(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.set_paused(false);
    info!("auto-refresh RESUMED via API");
    Json(ControlResponse {
        paused: false,
        message: "Auto-refresh resumed",
    })
}

async fn control_refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.request_refresh();
    info!("manual refresh requested via API");
    (
        StatusCode::ACCEPTED,
        Json(ControlResponse {
            paused: state.is_paused(),
            message: "Refresh scheduled",
        }),
    )
}
