//! Tracing setup shared by every binary, adapted from the teacher's
//! `LoggingBuilder` — trimmed to the knobs the Sending Process, Purge
//! Task, and HTTP South listener actually expose on their command lines
//! (`--debug_level`).

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// A builder for the process's tracing subscriber.
#[derive(Default)]
pub struct LoggingBuilder {
    level: Option<Level>,
    with_target: bool,
    with_file: bool,
    with_line_number: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global minimum level, overridden by `RUST_LOG` if set.
    ///
    /// Grounded on `AlloyRuntime::init_logging_with_level`: `--debug_level`
    /// is FogLAMP's analogous per-process verbosity flag (`SPEC_FULL.md`
    /// §5's ambient additions).
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = match self.level.unwrap_or(Level::INFO) {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base))
    }

    /// Initializes the global subscriber.
    ///
    /// # Panics
    /// Panics if a subscriber has already been installed for this process.
    pub fn init(self) {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(self.with_target)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number),
            )
            .with(filter)
            .init();
    }
}

/// Maps `--debug_level` (an integer, per the CLI convention in `spec.md`
/// §6) onto a `tracing::Level`: 0 is the default (`INFO`), each increment
/// steps one level more verbose, capping at `TRACE`.
pub fn level_from_debug_flag(debug_level: u8) -> Level {
    match debug_level {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_level_maps_to_increasing_verbosity() {
        assert_eq!(level_from_debug_flag(0), Level::INFO);
        assert_eq!(level_from_debug_flag(1), Level::DEBUG);
        assert_eq!(level_from_debug_flag(5), Level::TRACE);
    }
}
