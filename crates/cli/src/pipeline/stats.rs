//! Pipeline statistics and run summary.

use std::fmt;
use std::time::Duration;

use analysis_engine::LoopStats;
use observability::MetricsSummary;

use super::script::CommandReport;

/// Why the run ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// Requested number of snapshots published
    MaxIterations,
    /// Run timeout elapsed
    Timeout,
    /// Ctrl-C / SIGTERM
    #[default]
    Signal,
    /// The analysis thread exited on its own
    LoopExited,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MaxIterations => "max iterations reached",
            Self::Timeout => "timeout",
            Self::Signal => "shutdown signal",
            Self::LoopExited => "analysis loop exited",
        })
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub stop_reason: StopReason,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Samples and frames accepted by ingestion
    pub ingestion: ingestion::MetricsSnapshot,

    /// Analysis loop counters at shutdown
    pub analysis: LoopStats,

    /// Per-iteration statistics collected by the analysis thread
    pub summary: MetricsSummary,

    /// Final metrics of every sink
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,

    /// Scripted operator commands
    pub commands: CommandReport,
}

impl PipelineStats {
    /// Published snapshots per second
    pub fn iterations_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.analysis.published as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    geotrack Run Summary                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Stopped by: {}", self.stop_reason);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Snapshots published: {}", self.analysis.published);
        println!("   ├─ Iterations skipped: {}", self.analysis.skipped);
        println!("   └─ Snapshots/s: {:.2}", self.iterations_per_sec());

        println!("\n📡 Ingestion");
        println!(
            "   ├─ Telemetry samples: {}",
            self.ingestion.telemetry_samples()
        );
        println!("   ├─ Frames received: {}", self.ingestion.frames_received);
        println!("   └─ Frames rejected: {}", self.ingestion.frames_rejected);

        println!("\n{}", self.summary);

        if !self.sinks.is_empty() {
            println!("📤 Sinks");
            for (i, (name, m)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: written {}, failed {}, dropped {}",
                    prefix, name, m.write_count, m.failure_count, m.dropped_count
                );
            }
        }

        if self.commands.total() > 0 {
            println!("\n🎮 Commands");
            println!("   ├─ Done: {}", self.commands.done);
            println!("   ├─ Failed: {}", self.commands.failed);
            println!("   └─ Unfinished: {}", self.commands.unfinished);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterations_per_sec() {
        let stats = PipelineStats {
            duration: Duration::from_secs(4),
            analysis: LoopStats {
                published: 20,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!((stats.iterations_per_sec() - 5.0).abs() < 1e-12);
        assert_eq!(PipelineStats::default().iterations_per_sec(), 0.0);
    }
}
