//! Logging setup for a single run: a console layer that is always on, and
//! an optional non-rotating file layer when a log directory is given.
//!
//! Simplified from a long-running service's logger — a backup runs once
//! and exits, so there is no reload handle and no rotation strategy to
//! manage.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Must be kept alive for the lifetime of the process, or buffered log
/// lines are silently dropped on exit.
pub struct LogGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

/// Initialise the global `tracing` subscriber. `level` is used only when
/// `RUST_LOG` is unset. Returns a guard that must be held until the process
/// exits.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;

            let file_appender = tracing_appender::rolling::never(dir, "increbak.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false);

            registry
                .with(file_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("logger already initialized: {e}"))?;

            Ok(LogGuard(Some(guard)))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| anyhow::anyhow!("logger already initialized: {e}"))?;
            Ok(LogGuard(None))
        }
    }
}
