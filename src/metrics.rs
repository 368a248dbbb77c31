//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub submission_outcomes: IntCounterVec,
    pub submit_attempts: IntCounter,
    pub submit_retries: IntCounter,
    pub resends: IntCounter,
    pub status_polls: IntCounter,
    pub poll_errors: IntCounter,
    pub rpc_errors: IntCounterVec,

    // Gauges
    pub active_submissions: IntGauge,

    // Histograms
    pub rpc_latency: HistogramVec,
    pub confirmation_latency: Histogram,
    pub build_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Total number of transactions handed to the submission controller",
        ))?;

        let submission_outcomes = IntCounterVec::new(
            Opts::new(
                "submission_outcomes_total",
                "Terminal submission outcomes by kind",
            ),
            &["outcome"],
        )?;

        let submit_attempts = IntCounter::with_opts(Opts::new(
            "submit_attempts_total",
            "Number of sendTransaction calls made by controllers",
        ))?;

        let submit_retries = IntCounter::with_opts(Opts::new(
            "submit_retries_total",
            "Number of sendTransaction retries after a failed attempt",
        ))?;

        let resends = IntCounter::with_opts(Opts::new(
            "resends_total",
            "Number of rebroadcasts of already submitted bytes",
        ))?;

        let status_polls = IntCounter::with_opts(Opts::new(
            "status_polls_total",
            "Number of signature status polls",
        ))?;

        let poll_errors = IntCounter::with_opts(Opts::new(
            "poll_errors_total",
            "Number of polls that returned no answer because of an RPC error",
        ))?;

        let rpc_errors = IntCounterVec::new(
            Opts::new("rpc_errors_total", "RPC call failures by method and category"),
            &["method", "category"],
        )?;

        let active_submissions = IntGauge::with_opts(Opts::new(
            "active_submissions",
            "Number of submissions currently awaiting a terminal state",
        ))?;

        let rpc_latency = HistogramVec::new(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method"],
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from first submit to a Confirmed outcome",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Transaction build and sign latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.02, 0.05, 0.1]),
        )?;

        // Register all metrics
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submission_outcomes.clone()))?;
        registry.register(Box::new(submit_attempts.clone()))?;
        registry.register(Box::new(submit_retries.clone()))?;
        registry.register(Box::new(resends.clone()))?;
        registry.register(Box::new(status_polls.clone()))?;
        registry.register(Box::new(poll_errors.clone()))?;
        registry.register(Box::new(rpc_errors.clone()))?;
        registry.register(Box::new(active_submissions.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            submission_outcomes,
            submit_attempts,
            submit_retries,
            resends,
            status_polls,
            poll_errors,
            rpc_errors,
            active_submissions,
            rpc_latency,
            confirmation_latency,
            build_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Record a terminal outcome
    pub fn record_outcome(&self, outcome: &str) {
        self.submission_outcomes.with_label_values(&[outcome]).inc();
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
