//! Shared utilities

pub mod logging;

#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, report_fatal};
