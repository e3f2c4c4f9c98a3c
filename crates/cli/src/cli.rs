//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// geotrack - detect, track and geolocate ground objects from a UAV camera
#[derive(Parser, Debug)]
#[command(
    name = "geotrack",
    author,
    version,
    about = "UAV perception-to-geolocation pipeline",
    long_about = "Reads vehicle telemetry and a camera stream, detects and tracks objects,\n\
                  projects every track onto the terrain and publishes geo-referenced\n\
                  snapshots to the configured sinks. Operator commands can be replayed\n\
                  from a script against the vehicle link."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GEOTRACK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "GEOTRACK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the analysis pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "geotrack.toml",
        env = "GEOTRACK_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the vehicle link address from configuration
    #[arg(long, env = "GEOTRACK_LINK")]
    pub link: Option<String>,

    /// Override the video stream port from configuration
    #[arg(long, env = "GEOTRACK_STREAM_PORT")]
    pub stream_port: Option<u16>,

    /// Stop after this many published snapshots (0 = unlimited)
    #[arg(long, default_value = "0", env = "GEOTRACK_MAX_ITERATIONS")]
    pub max_iterations: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "GEOTRACK_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Number of synthetic targets produced by the scripted detector
    #[arg(long, default_value = "3")]
    pub targets: usize,

    /// JSON file of operator commands to replay during the run
    #[arg(long, env = "GEOTRACK_COMMANDS")]
    pub commands: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "GEOTRACK_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "geotrack.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "geotrack.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["geotrack", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("geotrack.toml"));
        assert_eq!(args.max_iterations, 0);
        assert_eq!(args.targets, 3);
        assert!(args.commands.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "geotrack",
            "validate",
            "-c",
            "mission.json",
            "--json",
            "-vv",
            "--log-format",
            "compact",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Compact));
        assert!(matches!(cli.command, Commands::Validate(ref a) if a.json));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["geotrack", "-q", "-v", "info"]).is_err());
    }
}
