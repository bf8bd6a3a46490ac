//! Tracing initialisation for KitCell processes.
//!
//! Call [`init_tracing`] once at process startup.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `KITCELL_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global `tracing` subscriber.
///
/// Respects `RUST_LOG` for filtering and `KITCELL_LOG_FORMAT=json` for
/// machine-readable output; defaults to a compact human-oriented formatter.
pub fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_format_enabled() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

fn json_format_enabled() -> bool {
    std::env::var("KITCELL_LOG_FORMAT").as_deref() == Ok("json")
}
