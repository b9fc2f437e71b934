use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::deadline::{ResponseTier, calculate_deadline, response_tier};
use crate::engine::formatter::DeadlineView;
use crate::error::AppError;
use crate::state::AppState;
use crate::timestamp::{parse_optional_timestamp, parse_timestamp};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/deadlines/preview", post(preview_deadline))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub assigned_at: String,
    pub scheduled_date: Option<String>,
    pub now: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub tier: ResponseTier,
    pub response_window_hours: i64,
    pub deadline: DateTime<Utc>,
    pub view: DeadlineView,
}

/// Runs the calculator and formatter without storing anything.
async fn preview_deadline(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let assigned_at = parse_timestamp(&payload.assigned_at)?;
    let scheduled_date = parse_optional_timestamp(payload.scheduled_date.as_deref())?;
    let now = match parse_optional_timestamp(payload.now.as_deref())? {
        Some(now) => now,
        None => state.clock.now(),
    };

    let tier = response_tier(assigned_at, scheduled_date);
    let deadline = calculate_deadline(assigned_at, scheduled_date);

    Ok(Json(PreviewResponse {
        tier,
        response_window_hours: tier.window_hours(),
        deadline,
        view: DeadlineView::at(deadline, now, state.locale),
    }))
}
