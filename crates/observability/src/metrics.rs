//! Analysis loop metrics
//!
//! Records iteration, projection, command and dispatch metrics through the
//! `metrics` facade, and aggregates them in memory for the end-of-run summary.

use std::collections::HashMap;

use contracts::IterationMeta;
use metrics::{counter, gauge, histogram};

/// Record one published iteration
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_iteration;
///
/// if let IterationOutcome::Published(meta) = analysis.run_iteration() {
///     record_iteration(&meta);
/// }
/// ```
pub fn record_iteration(meta: &IterationMeta) {
    counter!("geotrack_iterations_total").increment(1);
    gauge!("geotrack_last_snapshot_sequence").set(meta.sequence as f64);
    gauge!("geotrack_tracks_published").set(meta.published as f64);
    histogram!("geotrack_iteration_latency_ms").record(meta.latency_ms);

    if meta.unresolved > 0 {
        counter!("geotrack_projection_unresolved_total").increment(meta.unresolved as u64);
    }

    if meta.reused_frame {
        // detections and failures were counted when the frame was first analysed
        counter!("geotrack_frames_reused_total").increment(1);
        return;
    }
    histogram!("geotrack_detections_per_frame").record(meta.detections as f64);

    if let Some(failure) = &meta.stage_failure {
        counter!("geotrack_stage_failures_total", "stage" => failure.stage()).increment(1);
    }
}

/// Record an iteration that published nothing
pub fn record_iteration_skipped(reason: &str) {
    counter!(
        "geotrack_iterations_skipped_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a finished command task
pub fn record_command(kind: &str, success: bool) {
    let status = if success { "done" } else { "failed" };
    counter!(
        "geotrack_commands_total",
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record snapshot delivery to a sink
pub fn record_snapshot_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "geotrack_snapshots_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Iteration metrics aggregator
///
/// Aggregates in memory for the summary printed at shutdown.
#[derive(Debug, Clone, Default)]
pub struct IterationMetricsAggregator {
    /// Published iterations
    pub total_iterations: u64,

    /// Tracks published over all iterations
    pub total_tracks: u64,

    /// Tracks dropped by projection
    pub total_unresolved: u64,

    /// Iterations with a failed stage, per stage
    pub stage_failures: HashMap<String, u64>,

    /// Skipped iterations per reason
    pub skipped: HashMap<String, u64>,

    /// Iteration latency (ms)
    pub latency_stats: RunningStats,

    /// Published tracks per iteration
    pub tracks_stats: RunningStats,
}

impl IterationMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a published iteration
    pub fn update(&mut self, meta: &IterationMeta) {
        self.total_iterations += 1;
        self.total_tracks += meta.published as u64;
        self.total_unresolved += meta.unresolved as u64;
        self.latency_stats.push(meta.latency_ms);
        self.tracks_stats.push(meta.published as f64);

        if let Some(failure) = meta.stage_failure.as_ref().filter(|_| !meta.reused_frame) {
            *self
                .stage_failures
                .entry(failure.stage().to_string())
                .or_insert(0) += 1;
        }
    }

    /// Fold in a skipped iteration
    pub fn record_skip(&mut self, reason: &str) {
        *self.skipped.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Generate summary report
    pub fn summary(&self) -> MetricsSummary {
        let attempted = self.total_tracks + self.total_unresolved;
        MetricsSummary {
            total_iterations: self.total_iterations,
            total_tracks: self.total_tracks,
            total_unresolved: self.total_unresolved,
            unresolved_rate: if attempted > 0 {
                self.total_unresolved as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            stage_failures: self.stage_failures.clone(),
            skipped: self.skipped.clone(),
            latency_ms: StatsSummary::from(&self.latency_stats),
            tracks_per_iteration: StatsSummary::from(&self.tracks_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_iterations: u64,
    pub total_tracks: u64,
    pub total_unresolved: u64,
    pub unresolved_rate: f64,
    pub stage_failures: HashMap<String, u64>,
    pub skipped: HashMap<String, u64>,
    pub latency_ms: StatsSummary,
    pub tracks_per_iteration: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Analysis Metrics Summary ===")?;
        writeln!(f, "Published iterations: {}", self.total_iterations)?;
        writeln!(f, "Tracks published: {}", self.total_tracks)?;
        writeln!(
            f,
            "Unresolved projections: {} ({:.2}%)",
            self.total_unresolved, self.unresolved_rate
        )?;
        writeln!(f, "Iteration latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Tracks per iteration: {}", self.tracks_per_iteration)?;

        if !self.stage_failures.is_empty() {
            writeln!(f, "Stage failures:")?;
            for (stage, count) in &self.stage_failures {
                writeln!(f, "  {}: {}", stage, count)?;
            }
        }

        if !self.skipped.is_empty() {
            writeln!(f, "Skipped iterations:")?;
            for (reason, count) in &self.skipped {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a RunningStats
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
