//! Command-line surface for the standalone HTTP South listener binary.
//! `host`/`port`/`uri` for the listener itself live in the `HTTP_SOUTH`
//! configuration category (`spec.md` §6), not on the command line.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "http_south")]
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
