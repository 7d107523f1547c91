//! Logger initialization.
//!
//! The engine itself only logs through the `log` facade; binaries call
//! [`init_logging`] to install `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
