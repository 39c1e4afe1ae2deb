//! Subscriber installation.
//!
//! JSON output carries target, thread id, file and line so log shippers can
//! index the `[oc-01]`/`[oc-02]` events without parsing messages.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Build the filter for `config`.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log filter {:?}: {e}", config.log_level)))
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber is already installed, so repeated
/// calls (tests, embedding applications) are harmless.
pub fn init_logging(config: &TelemetryConfig) -> Result<bool, TelemetryError> {
    let filter = env_filter(config)?;

    let installed = if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(
                service = %config.service_name,
                log_level = %config.log_level,
                json_logs = config.json_logs,
                "Logging initialized"
            );
            Ok(true)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Subscriber already installed");
            Ok(false)
        }
    }
}
