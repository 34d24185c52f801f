//! Observability for the command-line client
//!
//! Structured logging to stderr; message output of `subscribe` goes through
//! the same log stream.

pub mod logging;

pub use logging::{init_cli_logging, init_logging, level_for_verbosity, LogFormat};
