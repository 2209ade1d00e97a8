//! Telemetry initialization.
//!
//! Controlled by two environment variables:
//! - `TANDEM_LOG`: an `EnvFilter` directive (default `warn`)
//! - `TANDEM_LOG_FORMAT=json`: JSON spans/events instead of human-readable
//!   lines
//!
//! Output always goes to stderr so it never mixes with command output.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter environment variable.
pub const LOG_ENV: &str = "TANDEM_LOG";

/// Format environment variable.
pub const FORMAT_ENV: &str = "TANDEM_LOG_FORMAT";

/// Install the global subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var(FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .init();
    }
}
