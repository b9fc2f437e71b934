//! Live countdown for a single assignment.
//!
//! A [`CountdownPresenter`] is bound to one assignment snapshot at a time and
//! publishes a [`CountdownSnapshot`] through a `watch` channel: once right
//! away, then on every refresh tick until the deadline passes. Binding a new
//! snapshot, calling [`CountdownPresenter::unbind`] or dropping the presenter
//! cancels the running timer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::engine::clock::Clock;
use crate::engine::formatter::{DeadlineView, Locale, is_passed, is_urgent};
use crate::models::assignment::Assignment;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountdownState {
    NotApplicable,
    Counting,
    Urgent,
    Expired,
}

impl CountdownState {
    /// Only pending assignments count down; everything else renders nothing.
    pub fn derive(assignment: &Assignment, now: DateTime<Utc>) -> Self {
        if !assignment.is_pending() {
            return CountdownState::NotApplicable;
        }

        let deadline = assignment.deadline();
        if is_passed(deadline, now) {
            CountdownState::Expired
        } else if is_urgent(deadline, now) {
            CountdownState::Urgent
        } else {
            CountdownState::Counting
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, CountdownState::Counting | CountdownState::Urgent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CountdownState::NotApplicable => "not-applicable",
            CountdownState::Counting => "counting",
            CountdownState::Urgent => "urgent",
            CountdownState::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSnapshot {
    pub assignment_id: Uuid,
    pub state: CountdownState,
    pub view: Option<DeadlineView>,
}

impl CountdownSnapshot {
    pub fn capture(assignment: &Assignment, now: DateTime<Utc>, locale: Locale) -> Self {
        let state = CountdownState::derive(assignment, now);
        let view = match state {
            CountdownState::NotApplicable => None,
            _ => Some(DeadlineView::at(assignment.deadline(), now, locale)),
        };

        Self {
            assignment_id: assignment.id,
            state,
            view,
        }
    }
}

type SnapshotSender = Arc<watch::Sender<Option<CountdownSnapshot>>>;

struct Binding {
    assignment: Assignment,
    cancel: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

pub struct CountdownPresenter {
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    locale: Locale,
    snapshot_tx: SnapshotSender,
    binding: Option<Binding>,
}

impl CountdownPresenter {
    pub fn new(clock: Arc<dyn Clock>, refresh_interval: Duration, locale: Locale) -> Self {
        let refresh_interval = if refresh_interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            refresh_interval
        };
        let (snapshot_tx, _unused_rx) = watch::channel(None);

        Self {
            clock,
            refresh_interval,
            locale,
            snapshot_tx: Arc::new(snapshot_tx),
            binding: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CountdownSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn current(&self) -> Option<CountdownSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Binds a fresh assignment snapshot and publishes its state immediately.
    ///
    /// Must be called from within a Tokio runtime when the assignment is
    /// pending, since the refresh timer is spawned onto it.
    pub fn bind(&mut self, assignment: Assignment) -> CountdownState {
        self.unbind();

        let snapshot = CountdownSnapshot::capture(&assignment, self.clock.now(), self.locale);
        let state = snapshot.state;
        self.snapshot_tx.send_replace(Some(snapshot));

        let cancel = CancellationToken::new();
        let timer = state.is_live().then(|| {
            tokio::spawn(run_refresh_timer(
                self.clock.clone(),
                assignment.clone(),
                self.locale,
                self.snapshot_tx.clone(),
                self.refresh_interval,
                cancel.clone(),
            ))
        });

        debug!(
            assignment_id = %assignment.id,
            state = state.as_str(),
            ticking = timer.is_some(),
            "countdown bound"
        );

        self.binding = Some(Binding {
            assignment,
            cancel,
            timer,
        });

        state
    }

    /// Recomputes the bound assignment's snapshot outside the regular cadence.
    pub fn refresh(&self) -> Option<CountdownState> {
        let binding = self.binding.as_ref()?;
        let snapshot = CountdownSnapshot::capture(&binding.assignment, self.clock.now(), self.locale);
        Some(publish(&self.snapshot_tx, snapshot, &binding.cancel))
    }

    pub fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.cancel.cancel();
            debug!(assignment_id = %binding.assignment.id, "countdown unbound");
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.binding
            .as_ref()
            .and_then(|binding| binding.timer.as_ref())
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn bound_assignment(&self) -> Option<&Assignment> {
        self.binding.as_ref().map(|binding| &binding.assignment)
    }
}

impl Drop for CountdownPresenter {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// Publishes a refreshed snapshot, keeping an expired countdown expired.
///
/// The cancellation check runs under the channel lock. `bind` cancels the old
/// token before it replaces the value, so a tick that raced past its
/// `select!` can never overwrite the new binding's snapshot.
fn publish(
    tx: &watch::Sender<Option<CountdownSnapshot>>,
    next: CountdownSnapshot,
    cancel: &CancellationToken,
) -> CountdownState {
    let mut state = next.state;

    tx.send_if_modified(|current| {
        if cancel.is_cancelled() {
            return false;
        }
        if let Some(previous) = current.as_ref() {
            if previous.assignment_id == next.assignment_id
                && previous.state == CountdownState::Expired
            {
                state = CountdownState::Expired;
                return false;
            }
            if *previous == next {
                return false;
            }
        }

        *current = Some(next);
        true
    });

    state
}

async fn run_refresh_timer(
    clock: Arc<dyn Clock>,
    assignment: Assignment,
    locale: Locale,
    snapshot_tx: SnapshotSender,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(assignment_id = %assignment.id, "countdown timer cancelled");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = CountdownSnapshot::capture(&assignment, clock.now(), locale);
                if publish(&snapshot_tx, snapshot, &cancel) == CountdownState::Expired {
                    debug!(assignment_id = %assignment.id, "deadline passed, countdown timer stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use tokio::time::Duration;
    use uuid::Uuid;

    use super::{CountdownPresenter, CountdownSnapshot, CountdownState};
    use crate::engine::clock::{Clock, ManualClock};
    use crate::engine::formatter::{Locale, UrgencyLevel};
    use crate::models::assignment::{Assignment, AssignmentStatus};

    const MINUTE: Duration = Duration::from_secs(60);

    fn assigned_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    // Unscheduled, so the deadline is 12:00.
    fn assignment(id: u128, status: AssignmentStatus) -> Assignment {
        Assignment {
            id: Uuid::from_u128(id),
            order_id: Uuid::from_u128(100 + id),
            photographer_id: Uuid::from_u128(200 + id),
            assigned_at: assigned_at(),
            scheduled_date: None,
            status,
        }
    }

    fn presenter(clock: &Arc<ManualClock>) -> CountdownPresenter {
        CountdownPresenter::new(clock.clone(), MINUTE, Locale::De)
    }

    #[test]
    fn non_pending_assignment_is_not_applicable_regardless_of_deadline() {
        let a = assignment(1, AssignmentStatus::Accepted);
        for now in [assigned_at(), assigned_at() + TimeDelta::hours(11), assigned_at() + TimeDelta::days(3)] {
            let snapshot = CountdownSnapshot::capture(&a, now, Locale::De);
            assert_eq!(snapshot.state, CountdownState::NotApplicable);
            assert!(snapshot.view.is_none());
        }
    }

    #[test]
    fn pending_states_follow_remaining_time() {
        let a = assignment(1, AssignmentStatus::Pending);
        let deadline = a.deadline();

        assert_eq!(
            CountdownState::derive(&a, deadline - TimeDelta::hours(3)),
            CountdownState::Counting
        );
        assert_eq!(
            CountdownState::derive(&a, deadline - TimeDelta::minutes(119)),
            CountdownState::Urgent
        );
        assert_eq!(
            CountdownState::derive(&a, deadline + TimeDelta::minutes(5)),
            CountdownState::Expired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_assignment_never_starts_a_timer() {
        let clock = Arc::new(ManualClock::new(assigned_at()));
        let mut presenter = presenter(&clock);

        let state = presenter.bind(assignment(1, AssignmentStatus::Accepted));

        assert_eq!(state, CountdownState::NotApplicable);
        assert!(!presenter.is_ticking());
        assert!(presenter.current().unwrap().view.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_every_tick_and_escalates_to_urgent() {
        let clock = Arc::new(ManualClock::new(assigned_at() + TimeDelta::hours(9)));
        let mut presenter = presenter(&clock);
        let mut rx = presenter.subscribe();

        assert_eq!(presenter.bind(assignment(1, AssignmentStatus::Pending)), CountdownState::Counting);
        assert!(presenter.is_ticking());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().view.as_ref().unwrap().text, "3h");

        clock.set(assignment(1, AssignmentStatus::Pending).deadline() - TimeDelta::minutes(90));
        rx.changed().await.unwrap();

        let snapshot = rx.borrow_and_update().clone().unwrap();
        let view = snapshot.view.unwrap();
        assert_eq!(snapshot.state, CountdownState::Urgent);
        assert_eq!(view.text, "1h 30min");
        assert_eq!(view.urgency_level, UrgencyLevel::Approaching);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_published_and_stops_the_timer() {
        let a = assignment(1, AssignmentStatus::Pending);
        let clock = Arc::new(ManualClock::new(a.deadline() - TimeDelta::minutes(2)));
        let mut presenter = presenter(&clock);
        let mut rx = presenter.subscribe();

        assert_eq!(presenter.bind(a.clone()), CountdownState::Urgent);
        rx.borrow_and_update();

        clock.set(a.deadline() + TimeDelta::minutes(5));
        rx.changed().await.unwrap();

        let snapshot = rx.borrow_and_update().clone().unwrap();
        let view = snapshot.view.unwrap();
        assert_eq!(snapshot.state, CountdownState::Expired);
        assert!(view.is_passed);
        assert_eq!(view.text, "Abgelaufen");

        tokio::time::sleep(MINUTE).await;
        assert!(!presenter.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_stays_expired_when_the_clock_moves_back() {
        let a = assignment(1, AssignmentStatus::Pending);
        let clock = Arc::new(ManualClock::new(a.deadline() + TimeDelta::minutes(1)));
        let mut presenter = presenter(&clock);

        assert_eq!(presenter.bind(a.clone()), CountdownState::Expired);
        assert!(!presenter.is_ticking());

        clock.set(a.deadline() - TimeDelta::hours(5));
        assert_eq!(presenter.refresh(), Some(CountdownState::Expired));
        assert_eq!(presenter.current().unwrap().view.unwrap().text, "Abgelaufen");
    }

    #[tokio::test(start_paused = true)]
    async fn rebinding_cancels_the_previous_timer() {
        let clock = Arc::new(ManualClock::new(assigned_at() + TimeDelta::hours(1)));
        let mut presenter = presenter(&clock);
        let mut rx = presenter.subscribe();

        presenter.bind(assignment(1, AssignmentStatus::Pending));
        presenter.bind(assignment(2, AssignmentStatus::Pending));
        rx.borrow_and_update();

        for _ in 0..5 {
            clock.advance(TimeDelta::minutes(1));
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone().unwrap();
            assert_eq!(snapshot.assignment_id, Uuid::from_u128(2));
        }
        assert_eq!(presenter.bound_assignment().unwrap().id, Uuid::from_u128(2));
    }

    #[tokio::test(start_paused = true)]
    async fn rebinding_with_a_new_status_leaves_the_state_machine() {
        let clock = Arc::new(ManualClock::new(assigned_at() + TimeDelta::hours(1)));
        let mut presenter = presenter(&clock);

        assert_eq!(presenter.bind(assignment(1, AssignmentStatus::Pending)), CountdownState::Counting);
        assert_eq!(
            presenter.bind(assignment(1, AssignmentStatus::Declined)),
            CountdownState::NotApplicable
        );
        assert!(!presenter.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_presenter_releases_the_timer() {
        let clock = Arc::new(ManualClock::new(assigned_at()));
        let mut presenter = presenter(&clock);
        let mut rx = presenter.subscribe();

        presenter.bind(assignment(1, AssignmentStatus::Pending));
        rx.borrow_and_update();
        drop(presenter);

        let closed = tokio::time::timeout(MINUTE * 5, rx.changed()).await;
        assert!(matches!(closed, Ok(Err(_))), "sender should be gone once the timer is cancelled");
    }

    /// Holds the next `now()` call until the test lets it go.
    struct GatedClock {
        inner: ManualClock,
        armed: AtomicBool,
        entered: Barrier,
        release: Barrier,
    }

    impl Clock for GatedClock {
        fn now(&self) -> DateTime<Utc> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.wait();
                self.release.wait();
            }
            self.inner.now()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tick_in_flight_during_rebind_does_not_overwrite_the_new_snapshot() {
        let clock = Arc::new(GatedClock {
            inner: ManualClock::new(assigned_at() + TimeDelta::hours(1)),
            armed: AtomicBool::new(false),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });
        let mut presenter =
            CountdownPresenter::new(clock.clone(), Duration::from_millis(20), Locale::De);

        assert_eq!(presenter.bind(assignment(1, AssignmentStatus::Pending)), CountdownState::Counting);

        clock.armed.store(true, Ordering::SeqCst);
        let gate = clock.clone();
        tokio::task::spawn_blocking(move || gate.entered.wait())
            .await
            .unwrap();

        // The timer is now parked inside `now()`, past its cancellation check.
        assert_eq!(
            presenter.bind(assignment(1, AssignmentStatus::Accepted)),
            CountdownState::NotApplicable
        );

        let gate = clock.clone();
        tokio::task::spawn_blocking(move || gate.release.wait())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = presenter.current().unwrap();
        assert_eq!(snapshot.state, CountdownState::NotApplicable);
        assert!(snapshot.view.is_none());
        assert!(!presenter.is_ticking());
    }
}
