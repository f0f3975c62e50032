//! Logging and tracing infrastructure.
//!
//! Structured logging via the tracing crate with env-filter support.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// This should be called once at program startup.
/// Subsequent calls are ignored.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();

        info!("Ancalagon tracing initialized");
    });
}

/// Initialize tracing with JSON output for structured logging.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();

        info!("Ancalagon tracing initialized (JSON mode)");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, warn};

    #[test]
    fn test_init_tracing_once() {
        // Should be callable multiple times without panic
        init_tracing();
        init_tracing();
    }

    #[test]
    fn test_log_levels() {
        init_tracing();
        debug!("debug message");
        info!("info message");
        warn!("warn message");
    }

    #[test]
    fn test_structured_fields() {
        init_tracing();
        let path = "sample.exe";
        info!(binary = %path, size_bytes = 1024, "analyzing binary");
    }
}
