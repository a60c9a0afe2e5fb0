use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline events.
///
/// Keeps the frame pipeline free of any particular output mechanism; the CLI
/// collects stats, tests discard everything.
pub trait PipelineLogger: Send {
    /// Report that frame `index` finished. `total` is 0 for open-ended streams.
    fn progress(&mut self, index: usize, total: usize);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-frame metric (face count, detector failures, ...).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _index: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Series {
    count: usize,
    sum: f64,
    max: f64,
}

impl Series {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = if self.count == 1 {
            value
        } else {
            self.max.max(value)
        };
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Accumulates per-stage timings and metrics and reports a summary at the
/// end of a run.
///
/// Progress lines are throttled to every `throttle_frames` frames.
pub struct StatsPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Series>,
    metrics: BTreeMap<String, Series>,
    start_time: Instant,
    frames: usize,
}

impl StatsPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Average duration of `stage`, if it was ever recorded.
    pub fn average_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Series::avg)
    }

    /// Sum of all values recorded for metric `name`.
    pub fn metric_total(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|s| s.sum)
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Pipeline summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        for (stage, series) in &self.timings {
            lines.push(format!(
                "  {stage:16}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms",
                series.avg(),
                series.max,
                series.sum
            ));
        }

        for (name, series) in &self.metrics {
            lines.push(format!(
                "  {name}: avg {:.1}  total {:.0}",
                series.avg(),
                series.sum
            ));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn progress(&mut self, index: usize, total: usize) {
        self.frames += 1;
        let done = self.frames;
        if done % self.throttle_frames != 0 && done != total {
            return;
        }
        if total > 0 {
            let pct = done as f64 / total as f64 * 100.0;
            log::info!("Processed {done}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processed {done} frames (latest #{index})");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
