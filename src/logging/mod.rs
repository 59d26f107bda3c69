/*!
 * Logging Module
 * Subscriber setup: console plus daily rolling files
 */
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter directives when `RUST_LOG` is not set.
pub fn default_directives(log_level: &str) -> String {
    format!("portfolio_cms={},tower_http=debug,axum=debug", log_level)
}

/// Initialize the logging system.
///
/// The returned guards flush the non-blocking writers on drop; hold them until shutdown.
pub fn init(is_production: bool) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    if let Err(e) = std::fs::create_dir_all("logs") {
        eprintln!("Could not create logs directory: {}", e);
    }

    let (file_writer, file_guard) = non_blocking(rolling::daily("logs", "app.log"));
    guards.push(file_guard);

    let (console_writer, console_guard) = non_blocking(io::stdout());
    guards.push(console_guard);

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if is_production {
            "info".to_string()
        } else {
            "debug".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&log_level)));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if is_production {
        let (error_writer, error_guard) = non_blocking(rolling::daily("logs", "error.log"));
        guards.push(error_guard);

        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber.with(file_layer).with(console_layer).init();
    }

    tracing::info!(
        production = is_production,
        level = %log_level,
        "logging initialized"
    );

    guards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_crate_level() {
        let directives = default_directives("warn");
        assert!(directives.starts_with("portfolio_cms=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
