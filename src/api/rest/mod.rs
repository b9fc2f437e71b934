pub mod assignments;
pub mod deadlines;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::models::assignment::AssignmentStatus;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(assignments::router())
        .merge(deadlines::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    assignments: usize,
    pending: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pending = state
        .assignments
        .iter()
        .filter(|entry| entry.value().status == AssignmentStatus::Pending)
        .count();

    Json(HealthResponse {
        status: "ok",
        assignments: state.assignments.len(),
        pending,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
