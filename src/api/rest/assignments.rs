use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::ws;
use crate::engine::countdown::CountdownSnapshot;
use crate::engine::deadline::ResponseTier;
use crate::engine::formatter::{Locale, UrgencyLevel};
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentRecord, AssignmentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", post(create_assignment).get(list_assignments))
        .route("/assignments/:id", get(get_assignment))
        .route("/assignments/:id/status", patch(update_assignment_status))
        .route("/assignments/:id/countdown", get(ws::countdown_ws))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub order_id: Option<Uuid>,
    pub photographer_id: Option<Uuid>,
    pub assigned_at: Option<String>,
    pub scheduled_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ListAssignmentsQuery {
    pub urgency: Option<UrgencyLevel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub tier: ResponseTier,
    pub response_window_hours: i64,
    pub deadline: DateTime<Utc>,
    pub countdown: CountdownSnapshot,
}

impl AssignmentResponse {
    fn build(assignment: Assignment, now: DateTime<Utc>, locale: Locale) -> Self {
        let tier = assignment.response_tier();
        let countdown = CountdownSnapshot::capture(&assignment, now, locale);

        Self {
            tier,
            response_window_hours: tier.window_hours(),
            deadline: assignment.deadline(),
            countdown,
            assignment,
        }
    }
}

fn respond(state: &AppState, assignment: Assignment, now: DateTime<Utc>) -> AssignmentResponse {
    let response = AssignmentResponse::build(assignment, now, state.locale);
    if let Some(view) = &response.countdown.view {
        state
            .metrics
            .deadline_views_total
            .with_label_values(&[view.urgency_level.as_str()])
            .inc();
    }
    response
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let now = state.clock.now();

    let record = AssignmentRecord {
        assigned_at: payload.assigned_at.unwrap_or_else(|| now.to_rfc3339()),
        scheduled_date: payload.scheduled_date,
        status: payload
            .status
            .unwrap_or_else(|| AssignmentStatus::Pending.to_string()),
    };

    let assignment = record.into_assignment(
        Uuid::new_v4(),
        payload.order_id.unwrap_or_else(Uuid::new_v4),
        payload.photographer_id.unwrap_or_else(Uuid::new_v4),
    )?;

    let tier = assignment.response_tier();
    state
        .metrics
        .assignments_created_total
        .with_label_values(&[tier.as_str()])
        .inc();

    state.assignments.insert(assignment.id, assignment.clone());

    info!(
        assignment_id = %assignment.id,
        photographer_id = %assignment.photographer_id,
        tier = tier.as_str(),
        deadline = %assignment.deadline(),
        "assignment created"
    );

    Ok(Json(respond(&state, assignment, now)))
}

/// Lists assignments ordered by deadline, soonest first.
async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAssignmentsQuery>,
) -> Json<Vec<AssignmentResponse>> {
    let now = state.clock.now();

    let mut assignments: Vec<Assignment> = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    assignments.sort_by_key(|assignment| (assignment.deadline(), assignment.id));

    let responses = assignments
        .into_iter()
        .map(|assignment| AssignmentResponse::build(assignment, now, state.locale))
        .filter(|response| match query.urgency {
            Some(level) => response
                .countdown
                .view
                .as_ref()
                .is_some_and(|view| view.urgency_level == level),
            None => true,
        })
        .collect::<Vec<_>>();

    for view in responses.iter().filter_map(|response| response.countdown.view.as_ref()) {
        state
            .metrics
            .deadline_views_total
            .with_label_values(&[view.urgency_level.as_str()])
            .inc();
    }

    Json(responses)
}

async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let assignment = state
        .assignment(&id)
        .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", id)))?;

    Ok(Json(respond(&state, assignment, state.clock.now())))
}

async fn update_assignment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let status = payload.status.parse::<AssignmentStatus>()?;

    let updated = {
        let mut assignment = state
            .assignments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", id)))?;
        assignment.status = status;
        assignment.clone()
    };

    let _ = state.assignment_events_tx.send(updated.clone());

    info!(assignment_id = %id, status = %status, "assignment status updated");

    Ok(Json(respond(&state, updated, state.clock.now())))
}
