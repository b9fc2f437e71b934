use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::state::AppState;

pub async fn countdown_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let assignment = state
        .assignment(&id)
        .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", id)))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, assignment)))
}

/// Streams countdown snapshots for one assignment until the client leaves.
///
/// Status changes for the same assignment rebind the presenter, which
/// cancels the running timer before a new one is started.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, assignment: Assignment) {
    let (mut sender, mut receiver) = socket.split();
    let assignment_id = assignment.id;

    let mut presenter = state.presenter();
    let mut snapshots = WatchStream::new(presenter.subscribe());
    let mut events = state.assignment_events_tx.subscribe();
    presenter.bind(latest_snapshot(&state, assignment));

    state.metrics.countdown_streams_active.inc();
    info!(assignment_id = %assignment_id, "countdown stream opened");

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.next() => {
                let Some(snapshot) = snapshot else { continue };

                let json = match serde_json::to_string(&snapshot) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize countdown snapshot for ws");
                        continue;
                    }
                };

                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }

                state
                    .metrics
                    .countdown_updates_pushed_total
                    .with_label_values(&[snapshot.state.as_str()])
                    .inc();
            }
            event = events.recv() => match event {
                Ok(updated) if updated.id == assignment_id => {
                    presenter.bind(updated);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(assignment_id = %assignment_id, skipped, "countdown stream lagged behind assignment events");
                    if let Some(current) = state.assignment(&assignment_id) {
                        presenter.bind(current);
                    }
                }
                Err(RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    presenter.unbind();
    state.metrics.countdown_streams_active.dec();
    info!(assignment_id = %assignment_id, "countdown stream closed");
}

/// The stored record wins over the one captured before the upgrade, since a
/// status change may have landed before the event subscription existed.
fn latest_snapshot(state: &AppState, captured: Assignment) -> Assignment {
    state.assignment(&captured.id).unwrap_or(captured)
}
