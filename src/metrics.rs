//! Lightweight request metrics for the upload and generate flows

use crate::config::MetricsFormat;
use crate::models::EncodeKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

/// Aggregated success/failure counters per request flow.
///
/// Totals accumulate for the process lifetime and back `/metrics`; a separate
/// window is reset each time the periodic reporter logs a summary.
#[derive(Debug)]
pub struct Metrics {
    state: Mutex<MetricsState>,
    started: Instant,
}

#[derive(Debug)]
struct MetricsState {
    totals: BTreeMap<&'static str, Counters>,
    window: BTreeMap<&'static str, Counters>,
    window_started: Instant,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    successes: u64,
    failures: u64,
    success_duration: Duration,
}

impl Counters {
    fn record(&mut self, duration: Duration, success: bool) {
        if success {
            self.successes += 1;
            self.success_duration += duration;
        } else {
            self.failures += 1;
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.success_duration.as_secs_f64() * 1_000.0 / self.successes as f64
        }
    }
}

impl Metrics {
    /// Create an empty metrics registry
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(MetricsState {
                totals: BTreeMap::new(),
                window: BTreeMap::new(),
                window_started: now,
            }),
            started: now,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        // Counters stay consistent even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the outcome of one request.
    pub fn record(&self, kind: EncodeKind, duration: Duration, success: bool) {
        let mut state = self.lock();
        state
            .totals
            .entry(kind.as_str())
            .or_default()
            .record(duration, success);
        state
            .window
            .entry(kind.as_str())
            .or_default()
            .record(duration, success);
    }

    /// Spawn a task that logs and resets the window every `interval_secs` (min 5).
    pub fn spawn_reporter(self: &Arc<Self>, interval_secs: u64) -> JoinHandle<()> {
        let metrics = Arc::clone(self);
        let period = Duration::from_secs(interval_secs.max(5));
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; report after a full interval.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                metrics.log_window();
            }
        })
    }

    fn log_window(&self) {
        let (elapsed, window) = {
            let mut state = self.lock();
            let elapsed = state.window_started.elapsed();
            state.window_started = Instant::now();
            (elapsed, std::mem::take(&mut state.window))
        };

        let (successes, failures) = window
            .values()
            .fold((0, 0), |(ok, err), c| (ok + c.successes, err + c.failures));

        info!(
            target: "qrshare::metrics",
            interval_secs = elapsed.as_secs(),
            requests = successes + failures,
            success_count = successes,
            failure_count = failures,
            breakdown = %format_breakdown(&window),
            "Request metrics window"
        );
    }

    /// Snapshot of the lifetime totals.
    pub fn report(&self) -> MetricsReport {
        let state = self.lock();
        let flows: Vec<FlowReport> = state
            .totals
            .iter()
            .map(|(kind, c)| FlowReport {
                kind: (*kind).to_string(),
                successes: c.successes,
                failures: c.failures,
                avg_latency_ms: c.avg_latency_ms(),
            })
            .collect();

        MetricsReport {
            uptime_secs: self.started.elapsed().as_secs(),
            requests: flows.iter().map(|f| f.successes + f.failures).sum(),
            flows,
        }
    }

    /// Render the lifetime totals in the requested format, with its content type.
    pub fn render(&self, format: MetricsFormat) -> (&'static str, String) {
        let report = self.report();
        match format {
            MetricsFormat::Json => (
                "application/json",
                serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string()),
            ),
            MetricsFormat::Prometheus => {
                ("text/plain; version=0.0.4", render_prometheus(&report))
            }
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Seconds since the registry was created
    pub uptime_secs: u64,
    /// Requests recorded across all flows
    pub requests: u64,
    /// Per-flow counters
    pub flows: Vec<FlowReport>,
}

/// Counters for a single flow (`image` or `text`)
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    /// Flow label
    pub kind: String,
    /// Successful requests
    pub successes: u64,
    /// Failed requests
    pub failures: u64,
    /// Mean latency of successful requests in milliseconds
    pub avg_latency_ms: f64,
}

fn format_breakdown(window: &BTreeMap<&'static str, Counters>) -> String {
    if window.is_empty() {
        return "idle".to_string();
    }
    window
        .iter()
        .map(|(kind, c)| {
            if c.failures > 0 {
                format!(
                    "{kind}: {} ok / {} err (avg {:.1} ms)",
                    c.successes,
                    c.failures,
                    c.avg_latency_ms()
                )
            } else {
                format!("{kind}: {} ok (avg {:.1} ms)", c.successes, c.avg_latency_ms())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_prometheus(report: &MetricsReport) -> String {
    let mut output = String::new();

    let _ = writeln!(
        &mut output,
        "# HELP qrshare_uptime_seconds Seconds since the service started"
    );
    let _ = writeln!(&mut output, "# TYPE qrshare_uptime_seconds gauge");
    let _ = writeln!(&mut output, "qrshare_uptime_seconds {}", report.uptime_secs);

    let _ = writeln!(
        &mut output,
        "# HELP qrshare_requests_total Code generation requests by flow and result"
    );
    let _ = writeln!(&mut output, "# TYPE qrshare_requests_total counter");
    for flow in &report.flows {
        let _ = writeln!(
            &mut output,
            "qrshare_requests_total{{flow=\"{}\",result=\"success\"}} {}",
            flow.kind, flow.successes
        );
        let _ = writeln!(
            &mut output,
            "qrshare_requests_total{{flow=\"{}\",result=\"failure\"}} {}",
            flow.kind, flow.failures
        );
    }

    let _ = writeln!(
        &mut output,
        "# HELP qrshare_latency_avg_seconds Average latency of successful requests"
    );
    let _ = writeln!(&mut output, "# TYPE qrshare_latency_avg_seconds gauge");
    for flow in &report.flows {
        let _ = writeln!(
            &mut output,
            "qrshare_latency_avg_seconds{{flow=\"{}\"}} {:.6}",
            flow.kind,
            flow.avg_latency_ms / 1_000.0
        );
    }

    output
}
