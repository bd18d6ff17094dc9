//! Brigada Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Brigada crates:
//! - Application configuration (store location, auth cost, chat simulation)
//! - Global error type with the validation/not-found/conflict/storage taxonomy
//! - Structured logging with tracing
//! - Platform directory resolution
//! - Common constants

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{BrError, BrResult, ErrorKind};
pub use logging::init_logging;
pub use platform::Platform;
