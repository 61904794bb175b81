//! CLI interface for oscrelay.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// oscrelay - OSC-over-UDP monitor, relay and proxy
#[derive(Parser, Debug)]
#[command(
    name = "oscrelay",
    author,
    version,
    about = "Observe and reroute OSC traffic carried over UDP",
    long_about = r"
oscrelay watches and reroutes OSC (Open Sound Control) traffic:

  - Listen on a port and display incoming packets
  - Relay outbound packets to a destination
  - Fan a received stream out to up to three proxy targets
  - Reflect a secondary 'proxy-in' port back out the main output
  - Emit a periodic heartbeat message

Up to eight independently configured connections run concurrently.

QUICK START:
  oscrelay config > settings.toml   # edit to taste
  oscrelay -c settings.toml run
"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open all active connections and display traffic
    Run(RunArgs),

    /// Send a one-shot OSC message through a slot's connection
    Send(SendArgs),

    /// List local IPv4 addresses usable as bind addresses
    Networks,

    /// Show an example settings file
    Config,
}

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Also print the 1 Hz liveness samples for each connection
    #[arg(long)]
    pub frequency: bool,

    /// Suppress per-message display (errors are still shown)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Send command arguments
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Slot number (1-8)
    pub slot: u8,

    /// OSC address pattern, e.g. /fader/1
    pub address: String,

    /// Message arguments; integers, floats and booleans are detected,
    /// anything else is sent as a string
    pub args: Vec<String>,
}
