//! Logging utilities.
//!
//! The engine reports through the `log` facade (frame stats at trace,
//! degraded paths at warn, lost devices and failed programs at error).
//! [`init_logging`] installs `env_logger` for binaries that want it.

mod init;

pub use init::{init_logging, LoggingConfig};