use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Duration;
use uuid::Uuid;

use crate::engine::clock::Clock;
use crate::engine::countdown::CountdownPresenter;
use crate::engine::formatter::Locale;
use crate::models::assignment::Assignment;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub assignments: DashMap<Uuid, Assignment>,
    pub assignment_events_tx: broadcast::Sender<Assignment>,
    pub clock: Arc<dyn Clock>,
    pub refresh_interval: Duration,
    pub locale: Locale,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        clock: Arc<dyn Clock>,
        event_buffer_size: usize,
        refresh_interval: Duration,
        locale: Locale,
    ) -> Self {
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            assignments: DashMap::new(),
            assignment_events_tx,
            clock,
            refresh_interval,
            locale,
            metrics: Metrics::new(),
        }
    }

    pub fn presenter(&self) -> CountdownPresenter {
        CountdownPresenter::new(self.clock.clone(), self.refresh_interval, self.locale)
    }

    pub fn assignment(&self, id: &Uuid) -> Option<Assignment> {
        self.assignments.get(id).map(|entry| entry.value().clone())
    }
}
