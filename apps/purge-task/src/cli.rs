//! Command-line surface for the Purge Task.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "purge_task")]
pub struct Cli {
    /// Storage/management API port.
    #[arg(long)]
    pub port: u16,

    /// Storage/management API host.
    #[arg(long, default_value = "localhost")]
    pub address: String,

    /// Verbosity: 0 (default) through 3.
    #[arg(long, default_value_t = 0)]
    pub debug_level: u8,
}
