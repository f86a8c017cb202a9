//! Logging utilities.
//!
//! The engine only speaks the `log` facade; `init_logging` installs
//! `env_logger` for hosts that do not bring their own logger.

mod init;

pub use init::{init_logging, LoggingConfig};
