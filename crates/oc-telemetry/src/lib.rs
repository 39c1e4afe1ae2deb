//! # OC Telemetry
//!
//! Structured logging for the canister agent and blob upload subsystems.
//!
//! Subsystems only emit `tracing` events; binaries call [`init_logging`]
//! once at startup to choose the output format.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oc_telemetry::{init_logging, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OC_SERVICE_NAME` | `openchat-bot` | Service name on the startup event |
//! | `OC_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `OC_JSON_LOGS` | `false` | JSON output |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::{TelemetryConfig, DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_NAME};
pub use logging::{env_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The configuration cannot be applied.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
