use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for render loop events.
///
/// Decouples the loop from specific output mechanisms (log crate, tests) so
/// callers can observe tick behavior without changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Report session progress after a tick.
    fn progress(&mut self, ticks: u64, rendered: u64);

    /// Record what a tick did (e.g. "dispatched", "in_flight").
    fn outcome(&mut self, outcome: &str);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. face count).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _ticks: u64, _rendered: u64) {}
    fn outcome(&mut self, _outcome: &str) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger that tracks per-stage timing, metrics and tick
/// outcomes, and reports a summary when the session ends.
///
/// Progress output is throttled to every `throttle_ticks` ticks.
pub struct LogPipelineLogger {
    throttle_ticks: u64,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    outcomes: HashMap<String, u64>,
    start_time: Instant,
    ticks: u64,
    rendered: u64,
    messages: Vec<String>,
}

impl LogPipelineLogger {
    pub fn new(throttle_ticks: u64) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            outcomes: HashMap::new(),
            start_time: Instant::now(),
            ticks: 0,
            rendered: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing ran.
    pub fn summary_string(&self) -> Option<String> {
        if self.ticks == 0 && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Session summary ({} ticks, {} frames rendered, {:.1}s total):",
            self.ticks,
            self.rendered,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        let mut outcomes: Vec<_> = self.outcomes.iter().collect();
        outcomes.sort();
        for (outcome, count) in outcomes {
            lines.push(format!("  ticks {outcome}: {count}"));
        }

        if self.rendered > 0 && elapsed_ms > 0.0 {
            let fps = self.rendered as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Render rate: {fps:.2} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.outcomes.get(outcome).copied().unwrap_or(0)
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(20)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, ticks: u64, rendered: u64) {
        self.ticks = ticks;
        self.rendered = rendered;
        if ticks % self.throttle_ticks == 0 {
            log::info!("Ticks: {ticks}, frames rendered: {rendered}");
        }
    }

    fn outcome(&mut self, outcome: &str) {
        *self.outcomes.entry(outcome.to_string()).or_default() += 1;
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
