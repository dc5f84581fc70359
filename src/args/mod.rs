mod cli;
mod parsers;
mod types;


pub use cli::{Command, FleetArgs, InstanceArgs, RampArgs, ResetArgs, WatchArgs};
pub use parsers::parse_duration_arg;
pub use types::HttpMethod;
