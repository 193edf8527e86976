//! Command-line surface, per `spec.md` §6.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "sending_process")]
pub struct Cli {
    /// Microservice name, used only for logging and audit context.
    #[arg(long)]
    pub name: Option<String>,

    /// Storage/management API port.
    #[arg(long)]
    pub port: u16,

    /// Storage/management API host.
    #[arg(long, default_value = "localhost")]
    pub address: String,

    /// Stream to send.
    #[arg(long)]
    pub stream_id: i32,

    /// Record per-checkpoint timing in the STRMN audit entry.
    #[arg(long, default_value_t = false)]
    pub performance_log: bool,

    /// Verbosity: 0 (default) through 3.
    #[arg(long, default_value_t = 0)]
    pub debug_level: u8,
}
