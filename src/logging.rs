//! Tracing setup for the tracker plus the structured event helpers used by
//! the request and tree-building code. Console output by default, JSON lines
//! when `logging.json` is set.

use crate::config::{ConfigManager, LoggingConfig};
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();

/// Install a subscriber with default settings for the detected environment
pub fn init_structured_logging() {
    init_structured_logging_with(
        &LoggingConfig::default(),
        &ConfigManager::detect_environment(),
    );
}

/// Install a subscriber from the `logging` section. `RUST_LOG` wins over the
/// configured level. Later calls are ignored.
pub fn init_structured_logging_with(config: &LoggingConfig, environment: &str) {
    SUBSCRIBER_INSTALLED.get_or_init(|| {
        let level = config
            .level
            .clone()
            .unwrap_or_else(|| default_level(environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let base = fmt::layer().with_target(true).with_thread_ids(true);
        let layer = if config.json {
            base.with_ansi(false).json().with_filter(filter).boxed()
        } else {
            base.with_filter(filter).boxed()
        };

        // The host process may own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("tracing subscriber already installed, keeping it");
        }

        tracing::info!(
            environment = %environment,
            level = %level,
            json = config.json,
            "request tracker logging ready"
        );
    });
}

fn default_level(environment: &str) -> &'static str {
    if environment == "production" {
        "info"
    } else {
        "debug"
    }
}

/// Log structured data for request tracking operations
pub fn log_tracking_operation(
    operation: &str,
    request_id: &str,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        request_id = %request_id,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "TRACKING_OPERATION"
    );
}

/// Log structured data for record store operations
pub fn log_record_operation(
    operation: &str,
    record_id: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        record_id = %record_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RECORD_OPERATION"
    );
}

/// Log a failed operation with the component that raised it
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
