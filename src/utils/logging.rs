//! Logging setup and fatal error reporting
//!
//! Diagnostics go through `tracing`. Fatal configuration errors are also
//! sent to the system log, since the loader usually runs from a jail
//! manager without a watched terminal.
//!
//! ```rust,no_run
//! use sandblast_config::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use std::ffi::CString;
use std::fmt::Display;

use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Syslog identity
const SYSLOG_IDENT: &std::ffi::CStr = c"sandblast";

/// Pick the log filter: RUST_LOG wins, then the configured filter, then "info".
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging to stderr
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output (for log aggregation)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_current_span(true),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Report a fatal error through `tracing` and syslog(3) at `LOG_ERR`.
pub fn report_fatal<E: Display>(err: &E) {
    let message = err.to_string();
    error!("{}", message);
    syslog_error(&message);
}

fn syslog_error(message: &str) {
    let Ok(text) = CString::new(message.replace('\0', " ")) else {
        return;
    };
    // SAFETY: the ident is 'static as openlog requires, and the message is
    // passed through a constant "%s" format.
    unsafe {
        libc::openlog(SYSLOG_IDENT.as_ptr(), libc::LOG_PID, libc::LOG_USER);
        libc::syslog(libc::LOG_ERR, c"%s".as_ptr(), text.as_ptr());
        libc::closelog();
    }
}
