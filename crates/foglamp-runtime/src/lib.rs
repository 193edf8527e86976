//! Ambient runtime stack shared by every FogLAMP binary: tracing setup and
//! graceful shutdown. Each binary defines its own umbrella error type over
//! the lower crates it actually uses.

pub mod logging;
pub mod shutdown;

pub use logging::{level_from_debug_flag, LoggingBuilder};
pub use shutdown::wait_for_shutdown_signal;
