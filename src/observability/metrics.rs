use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub notifications_in_queue: IntGauge,
    pub notifications_delivered_total: IntCounterVec,
    pub notifications_dropped_total: IntCounterVec,
    pub partner_utilization: GaugeVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Accepted status transitions by target"),
            &["to_status"],
        )
        .expect("valid transitions_total metric");

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Rejected assign/transition requests by code"),
            &["code"],
        )
        .expect("valid rejections_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of assignment processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let notifications_in_queue = IntGauge::new(
            "notifications_in_queue",
            "Notifications waiting in the outbox",
        )
        .expect("valid notifications_in_queue metric");

        let notifications_delivered_total = IntCounterVec::new(
            Opts::new(
                "notifications_delivered_total",
                "Notifications pushed to a live topic by audience class",
            ),
            &["audience"],
        )
        .expect("valid notifications_delivered_total metric");

        let notifications_dropped_total = IntCounterVec::new(
            Opts::new("notifications_dropped_total", "Notifications dropped by reason"),
            &["reason"],
        )
        .expect("valid notifications_dropped_total metric");

        let partner_utilization = GaugeVec::new(
            Opts::new("partner_utilization", "Partner utilization ratio [0..1]"),
            &["partner_id"],
        )
        .expect("valid partner_utilization metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(rejections_total.clone()))
            .expect("register rejections_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(notifications_in_queue.clone()))
            .expect("register notifications_in_queue");
        registry
            .register(Box::new(notifications_delivered_total.clone()))
            .expect("register notifications_delivered_total");
        registry
            .register(Box::new(notifications_dropped_total.clone()))
            .expect("register notifications_dropped_total");
        registry
            .register(Box::new(partner_utilization.clone()))
            .expect("register partner_utilization");

        Self {
            registry,
            transitions_total,
            rejections_total,
            assignments_total,
            assignment_latency_seconds,
            notifications_in_queue,
            notifications_delivered_total,
            notifications_dropped_total,
            partner_utilization,
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
