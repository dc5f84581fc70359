use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use super::parsers::parse_duration_arg;
use super::types::HttpMethod;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Autoscaling-demo load fleet: resizable worker pools per instance, a store-coordinated concurrency ramp controller, and live fleet stats."
)]
pub struct FleetArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the shared SQLite config store
    #[arg(
        long = "store",
        env = "LOADFLEET_STORE",
        default_value = "loadfleet.db",
        global = true
    )]
    pub store: String,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run one loader instance
    Instance(InstanceArgs),
    /// Ramp total fleet concurrency to a target
    Ramp(RampArgs),
    /// Signal every instance to drain to zero and exit
    Reset(ResetArgs),
    /// Stream live fleet summaries
    Watch(WatchArgs),
    /// Print a one-shot fleet summary
    Status,
}

#[derive(Debug, Args, Clone)]
pub struct InstanceArgs {
    /// Target URL this instance replays (overrides the config file)
    #[arg(long, short = 't')]
    pub target: Option<String>,

    /// HTTP method for the request template
    #[arg(long, short = 'X', ignore_case = true)]
    pub method: Option<HttpMethod>,

    /// Request body for the request template
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Optional TOML file with instance defaults
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Base interval between config polls (jitter is added on top)
    #[arg(long = "poll-interval", value_parser = parse_duration_arg, default_value = "500ms")]
    pub poll_interval: Duration,

    /// Per-request timeout
    #[arg(long = "request-timeout", value_parser = parse_duration_arg, default_value = "2s")]
    pub request_timeout: Duration,

    /// Connection timeout
    #[arg(long = "connect-timeout", value_parser = parse_duration_arg, default_value = "5s")]
    pub connect_timeout: Duration,
}

#[derive(Debug, Args, Clone)]
pub struct RampArgs {
    /// Desired total concurrency across the whole fleet
    #[arg(long, short = 'n')]
    pub total: u64,
}

#[derive(Debug, Args, Clone)]
pub struct ResetArgs {
    /// Also delete all persisted per-instance statistics
    #[arg(long = "clear-stats")]
    pub clear_stats: bool,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Interval between summary reads
    #[arg(long, value_parser = parse_duration_arg, default_value = "300ms")]
    pub interval: Duration,
}
