use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_created_total: IntCounterVec,
    pub deadline_views_total: IntCounterVec,
    pub countdown_streams_active: IntGauge,
    pub countdown_updates_pushed_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_created_total = IntCounterVec::new(
            Opts::new(
                "assignments_created_total",
                "Assignments created, by response tier",
            ),
            &["tier"],
        )
        .expect("valid assignments_created_total metric");

        let deadline_views_total = IntCounterVec::new(
            Opts::new(
                "deadline_views_total",
                "Deadline views served, by urgency level",
            ),
            &["urgency"],
        )
        .expect("valid deadline_views_total metric");

        let countdown_streams_active = IntGauge::new(
            "countdown_streams_active",
            "Countdown websocket streams currently open",
        )
        .expect("valid countdown_streams_active metric");

        let countdown_updates_pushed_total = IntCounterVec::new(
            Opts::new(
                "countdown_updates_pushed_total",
                "Countdown snapshots pushed to clients, by countdown state",
            ),
            &["state"],
        )
        .expect("valid countdown_updates_pushed_total metric");

        registry
            .register(Box::new(assignments_created_total.clone()))
            .expect("register assignments_created_total");
        registry
            .register(Box::new(deadline_views_total.clone()))
            .expect("register deadline_views_total");
        registry
            .register(Box::new(countdown_streams_active.clone()))
            .expect("register countdown_streams_active");
        registry
            .register(Box::new(countdown_updates_pushed_total.clone()))
            .expect("register countdown_updates_pushed_total");

        Self {
            registry,
            assignments_created_total,
            deadline_views_total,
            countdown_streams_active,
            countdown_updates_pushed_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
